use monolink_core::graph::DependencyGraph;
use monolink_core::package::{Manifest, Package, Workspace};
use serde_json::json;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn edges(list: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
    list.iter()
        .map(|(name, deps)| (name.to_string(), names(deps)))
        .collect()
}

fn package(name: &str, manifest: serde_json::Value) -> Package {
    Package::new(
        name,
        format!("packages/{}", name),
        Manifest::from_value(manifest).unwrap(),
    )
}

#[test]
fn test_traversal_order_without_cycles() {
    let graph = DependencyGraph::from_edges(
        &names(&["a", "b", "c", "d"]),
        &edges(&[("a", &["b", "c"]), ("b", &[]), ("c", &["d"]), ("d", &[])]),
    );
    assert_eq!(graph.traversal_order(), &["b", "d", "c", "a"]);
}

#[test]
fn test_traversal_order_keeps_insertion_order_for_disconnected_packages() {
    let graph = DependencyGraph::from_edges(&names(&["a", "b", "c"]), &[]);
    assert_eq!(graph.traversal_order(), &["a", "b", "c"]);
}

#[test]
fn test_traversal_order_with_cycle() {
    let graph = DependencyGraph::from_edges(
        &names(&["a", "b", "c", "d", "e"]),
        &edges(&[
            ("a", &["b", "c"]),
            ("c", &["d", "e"]),
            ("e", &["a"]),
        ]),
    );
    assert_eq!(graph.traversal_order(), &["b", "d", "e", "c", "a"]);
    assert_eq!(graph.cycles(), vec![names(&["a", "c", "e"])]);
}

#[test]
fn test_graph_from_workspace_uses_all_dependency_maps() {
    let workspace = Workspace::new(
        "/repo",
        vec![
            package("a", json!({ "name": "a", "dependencies": { "b": "*", "c": "*" } })),
            package("b", json!({ "name": "b", "dependencies": { "ext": "*" } })),
            package(
                "c",
                json!({
                    "name": "c",
                    "dependencies": { "ext": "*" },
                    "devDependencies": { "d": "*" }
                }),
            ),
            package("d", json!({ "name": "d" })),
        ],
        None,
    )
    .unwrap();

    let graph = DependencyGraph::new(&workspace);
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.traversal_order(), &["b", "d", "c", "a"]);
    assert!(graph.cycles().is_empty());
}

#[test]
fn test_link_pattern_matches_are_not_graph_edges() {
    let workspace = Workspace::new(
        "/repo",
        vec![
            package("a", json!({ "name": "a", "dependencies": { "ext-lib": "*", "b": "^1.0.0" } })),
            package("b", json!({ "name": "b" })),
        ],
        Some("ext-.*"),
    )
    .unwrap();

    let graph = DependencyGraph::new(&workspace);
    assert_eq!(graph.dependencies("a").unwrap(), vec!["b"]);
    assert_eq!(graph.traversal_order(), &["b", "a"]);
}

#[test]
fn test_dependencies_and_dependents() {
    let graph = DependencyGraph::from_edges(
        &names(&["a", "b", "c"]),
        &edges(&[("b", &["a"]), ("c", &["a", "b"])]),
    );

    assert_eq!(graph.dependencies("c").unwrap(), vec!["a", "b"]);
    assert!(graph.dependencies("a").unwrap().is_empty());

    let mut dependents = graph.dependents("a").unwrap();
    dependents.sort();
    assert_eq!(dependents, vec!["b", "c"]);

    assert!(graph.depends_on("c", "b"));
    assert!(!graph.depends_on("b", "c"));
    assert!(!graph.depends_on("a", "missing"));
}

#[test]
fn test_unknown_package_is_an_error() {
    let graph = DependencyGraph::from_edges(&names(&["a"]), &[]);
    assert!(graph.dependencies("nope").is_err());
    assert!(graph.dependents("nope").is_err());
}

#[test]
fn test_empty_graph() {
    let graph = DependencyGraph::from_edges(&[], &[]);
    assert!(graph.is_empty());
    assert!(graph.traversal_order().is_empty());
}
