//! Dependency graph management using petgraph.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{Error, Result};
use crate::package::Workspace;

const VIRTUAL_ROOT: &str = "__VIRTUAL_ROOT__";

/// Directed graph of internal package dependencies.
///
/// Edges point from consumer to producer. Cycles are allowed: the traversal
/// order is computed with a depth-first walk from a virtual root that shares
/// one visited set, so every package is emitted exactly once and the walk
/// always terminates. For packages on a cycle, whichever member the walk
/// reaches first is emitted after the others; no stronger guarantee is made.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    virtual_root: NodeIndex,
    traversal_order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph for every package of the workspace.
    ///
    /// Only dependencies naming a known package become edges; link-pattern
    /// matches are external directories and take no part in ordering.
    pub fn new(workspace: &Workspace) -> Self {
        let names = workspace.names();
        let deps = workspace
            .packages()
            .map(|p| {
                let internal = p.internal_deps(|dep| workspace.get(dep).is_some() && dep != p.name);
                (p.name.clone(), internal)
            })
            .collect::<Vec<_>>();
        Self::from_edges(&names, &deps)
    }

    /// Builds the graph from `(package, direct internal deps)` pairs.
    ///
    /// `names` fixes node insertion order, which is the starting order for
    /// disconnected components.
    pub fn from_edges(names: &[String], deps: &[(String, Vec<String>)]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::with_capacity(names.len());

        for name in names {
            let node = graph.add_node(name.clone());
            node_map.insert(name.clone(), node);
        }

        for (name, targets) in deps {
            let Some(&from) = node_map.get(name) else {
                continue;
            };
            for target in targets {
                if let Some(&to) = node_map.get(target) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let virtual_root = graph.add_node(VIRTUAL_ROOT.to_string());
        for name in names {
            graph.add_edge(virtual_root, node_map[name], ());
        }

        let traversal_order = Self::compute_traversal_order(&graph, virtual_root);

        Self {
            graph,
            node_map,
            virtual_root,
            traversal_order,
        }
    }

    fn compute_traversal_order(graph: &DiGraph<String, ()>, virtual_root: NodeIndex) -> Vec<String> {
        let mut out = Vec::with_capacity(graph.node_count());
        let mut visited = HashSet::with_capacity(graph.node_count());

        fn visit(
            graph: &DiGraph<String, ()>,
            node: NodeIndex,
            visited: &mut HashSet<NodeIndex>,
            out: &mut Vec<NodeIndex>,
        ) {
            visited.insert(node);
            for dep in ordered_neighbors(graph, node) {
                if visited.contains(&dep) {
                    continue;
                }
                visit(graph, dep, visited, out);
            }
            out.push(node);
        }

        visit(graph, virtual_root, &mut visited, &mut out);

        out.into_iter()
            .filter(|idx| *idx != virtual_root)
            .map(|idx| graph[idx].clone())
            .collect()
    }

    /// Returns packages dependencies-first, each exactly once.
    #[inline]
    pub fn traversal_order(&self) -> &[String] {
        &self.traversal_order
    }

    /// Returns direct dependencies of a package, in declaration order.
    pub fn dependencies(&self, package_name: &str) -> Result<Vec<String>> {
        let node = self.node(package_name)?;
        Ok(ordered_neighbors(&self.graph, node)
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect())
    }

    /// Returns direct dependents of a package (packages that depend on it).
    pub fn dependents(&self, package_name: &str) -> Result<Vec<String>> {
        let node = self.node(package_name)?;
        let mut dependents: Vec<String> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .filter(|idx| *idx != self.virtual_root)
            .map(|idx| self.graph[idx].clone())
            .collect();
        dependents.reverse();
        Ok(dependents)
    }

    /// Whether `consumer` directly depends on `producer`.
    ///
    /// Unknown names never depend on anything.
    #[inline]
    pub fn depends_on(&self, consumer: &str, producer: &str) -> bool {
        match (self.node_map.get(consumer), self.node_map.get(producer)) {
            (Some(&from), Some(&to)) => self.graph.contains_edge(from, to),
            _ => false,
        }
    }

    /// Groups of packages that depend on each other in a cycle.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.first().is_some_and(|n| self.graph.contains_edge(*n, *n))
            })
            .map(|scc| {
                let mut names: Vec<String> =
                    scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                names.sort();
                names
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    fn node(&self, package_name: &str) -> Result<NodeIndex> {
        self.node_map
            .get(package_name)
            .copied()
            .ok_or_else(|| Error::PackageNotFound {
                name: package_name.to_string(),
                available: self.traversal_order.join(", "),
            })
    }
}

/// Outgoing neighbors in edge insertion order.
///
/// petgraph walks adjacency lists newest edge first.
fn ordered_neighbors(graph: &DiGraph<String, ()>, node: NodeIndex) -> Vec<NodeIndex> {
    let mut neighbors: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Outgoing).collect();
    neighbors.reverse();
    neighbors
}
