mod common;

use std::path::{Path, PathBuf};

use common::{read_raw, write_manifest};
use monolink_core::config::{BumpDependents, WorkspaceConfig, WorkspaceOptions, CONFIG_FILE};
use monolink_core::error::Error;
use monolink_core::package::{parse_dep, ROOT_PACKAGE};
use monolink_core::store::ManifestStore;
use serde_json::json;
use tempfile::TempDir;

fn sample_repo() -> TempDir {
    let dir = TempDir::new().expect("Should create temp directory");
    write_manifest(dir.path(), ".", json!({ "name": "repo", "version": "1.0.0", "private": true }));
    write_manifest(dir.path(), "packages/b", json!({ "name": "b", "version": "1.0.0" }));
    write_manifest(dir.path(), "packages/a", json!({ "name": "a", "version": "1.0.0" }));
    write_manifest(dir.path(), "packages/scoped", json!({ "name": "@acme/scoped", "version": "1.0.0" }));
    write_manifest(dir.path(), "tools/cli", json!({ "name": "cli", "version": "0.1.0" }));
    std::fs::create_dir_all(dir.path().join("packages/no-manifest")).unwrap();
    std::fs::write(dir.path().join("packages/README.md"), "# packages").unwrap();
    dir
}

#[test]
fn test_list_returns_sorted_package_directories() {
    let dir = sample_repo();
    let store = ManifestStore::new(dir.path());

    let paths = store.list(&["packages/*".to_string()], None).unwrap();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("packages/a"),
            PathBuf::from("packages/b"),
            PathBuf::from("packages/scoped"),
        ]
    );
}

#[test]
fn test_list_merges_patterns_and_applies_ignore() {
    let dir = sample_repo();
    let store = ManifestStore::new(dir.path());

    let paths = store
        .list(
            &["tools/*".to_string(), "packages/*/".to_string(), "packages/a".to_string()],
            Some("packages/b"),
        )
        .unwrap();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("packages/a"),
            PathBuf::from("packages/scoped"),
            PathBuf::from("tools/cli"),
        ]
    );
}

#[test]
fn test_read_root_package_uses_reserved_name() {
    let dir = sample_repo();
    let store = ManifestStore::new(dir.path());

    let root = store.read(Path::new(".")).unwrap();
    assert_eq!(root.name, ROOT_PACKAGE);
    assert!(root.is_root());
    assert_eq!(root.display_name(), "ROOT");
    assert!(root.is_private());
}

#[test]
fn test_read_rejects_name_mismatch() {
    let dir = sample_repo();
    write_manifest(dir.path(), "packages/c", json!({ "name": "not-c", "version": "1.0.0" }));
    let store = ManifestStore::new(dir.path());

    let err = store.read(Path::new("packages/c")).unwrap_err();
    assert!(matches!(err, Error::ManifestRead { .. }));
    assert!(err.to_string().contains("does not match directory name"));
    assert!(err.is_validation());
}

#[test]
fn test_read_rejects_missing_name_and_invalid_json() {
    let dir = sample_repo();
    write_manifest(dir.path(), "packages/anon", json!({ "version": "1.0.0" }));
    std::fs::create_dir_all(dir.path().join("packages/broken")).unwrap();
    std::fs::write(dir.path().join("packages/broken/package.json"), "{ not json").unwrap();
    let store = ManifestStore::new(dir.path());

    assert!(matches!(
        store.read(Path::new("packages/anon")),
        Err(Error::ManifestRead { .. })
    ));
    assert!(matches!(
        store.read(Path::new("packages/broken")),
        Err(Error::ManifestRead { .. })
    ));
}

#[test]
fn test_scoped_name_may_differ_from_directory() {
    let dir = sample_repo();
    let store = ManifestStore::new(dir.path());

    let package = store.read(Path::new("packages/scoped")).unwrap();
    assert_eq!(package.name, "@acme/scoped");
}

#[test]
fn test_load_workspace_appends_root_last() {
    let dir = sample_repo();
    let store = ManifestStore::new(dir.path());

    let workspace = store.load_workspace(&WorkspaceOptions::default(), true).unwrap();
    assert_eq!(workspace.names(), vec!["a", "b", "@acme/scoped", ROOT_PACKAGE]);
    assert_eq!(workspace.sub_packages().count(), 3);

    let without_root = store.load_workspace(&WorkspaceOptions::default(), false).unwrap();
    assert!(without_root.root_package().is_none());
}

#[test]
fn test_require_lists_available_packages() {
    let dir = sample_repo();
    let store = ManifestStore::new(dir.path());
    let workspace = store.load_workspace(&WorkspaceOptions::default(), true).unwrap();

    let err = workspace.require("zzz").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("zzz"));
    assert!(message.contains("a, b, @acme/scoped"));
    assert!(!message.contains(ROOT_PACKAGE));
}

#[test]
fn test_write_preserves_key_order_and_adds_newline() {
    let dir = TempDir::new().expect("Should create temp directory");
    std::fs::create_dir_all(dir.path().join("packages/a")).unwrap();
    std::fs::write(
        dir.path().join("packages/a/package.json"),
        r#"{"version":"1.0.0","name":"a","zeta":true,"alpha":1}"#,
    )
    .unwrap();
    let store = ManifestStore::new(dir.path());
    let manifest_path = Path::new("packages/a/package.json");

    let mut manifest = store.read_manifest(manifest_path).unwrap();
    manifest.set_version("1.1.0");
    store.write(manifest_path, &manifest).unwrap();

    let written = String::from_utf8(read_raw(dir.path(), "packages/a")).unwrap();
    assert_eq!(
        written,
        "{\n  \"version\": \"1.1.0\",\n  \"name\": \"a\",\n  \"zeta\": true,\n  \"alpha\": 1\n}\n"
    );
    assert!(!dir.path().join("packages/a/package.json.monolink-tmp").exists());
}

#[test]
fn test_failed_write_leaves_no_temporary_file() {
    let dir = TempDir::new().expect("Should create temp directory");
    // A non-empty directory where the manifest should be makes the rename fail.
    std::fs::create_dir_all(dir.path().join("packages/x/package.json/nested")).unwrap();
    let store = ManifestStore::new(dir.path());

    let result = store.write_raw(Path::new("packages/x/package.json"), b"{}\n");

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(!dir.path().join("packages/x/package.json.monolink-tmp").exists());
    assert!(dir.path().join("packages/x/package.json/nested").is_dir());
}

#[test]
fn test_parse_dep_handles_scopes_and_ranges() {
    assert_eq!(parse_dep("lodash"), ("lodash".to_string(), None));
    assert_eq!(
        parse_dep("lodash@^4.0.0"),
        ("lodash".to_string(), Some("^4.0.0".to_string()))
    );
    assert_eq!(parse_dep("@scope/pkg"), ("@scope/pkg".to_string(), None));
    assert_eq!(
        parse_dep("@scope/pkg@1.2.3"),
        ("@scope/pkg".to_string(), Some("1.2.3".to_string()))
    );
}

#[test]
fn test_config_defaults_without_file() {
    let dir = TempDir::new().expect("Should create temp directory");
    let config = WorkspaceConfig::load(dir.path()).unwrap();
    assert!(config.src.is_empty());
    assert_eq!(
        config.merge_cli(&[], None, None),
        WorkspaceOptions::default()
    );
}

#[test]
fn test_config_file_values_yield_to_cli() {
    let dir = TempDir::new().expect("Should create temp directory");
    std::fs::write(
        dir.path().join(CONFIG_FILE),
        r#"
src = ["libs/*", "apps/*"]
ignore_src = "libs/legacy"
link = "^@acme/"
parallel_limit = 4

[publish]
bump_dependents = "exact"
changelog_path = "HISTORY.md"
"#,
    )
    .unwrap();

    let config = WorkspaceConfig::load(dir.path()).unwrap();
    assert_eq!(config.parallel_limit, Some(4));
    assert_eq!(config.publish.bump_dependents, Some(BumpDependents::Exact));
    assert_eq!(config.publish.changelog_path.as_deref(), Some("HISTORY.md"));

    let from_file = config.merge_cli(&[], None, None);
    assert_eq!(from_file.src, vec!["libs/*", "apps/*"]);
    assert_eq!(from_file.ignore_src.as_deref(), Some("libs/legacy"));
    assert_eq!(from_file.link.as_deref(), Some("^@acme/"));

    let from_cli = config.merge_cli(&["pkgs/*".to_string()], None, Some("^ext-".to_string()));
    assert_eq!(from_cli.src, vec!["pkgs/*"]);
    assert_eq!(from_cli.ignore_src.as_deref(), Some("libs/legacy"));
    assert_eq!(from_cli.link.as_deref(), Some("^ext-"));
}

#[test]
fn test_invalid_config_reports_path() {
    let dir = TempDir::new().expect("Should create temp directory");
    std::fs::write(dir.path().join(CONFIG_FILE), "src = 3").unwrap();

    let err = WorkspaceConfig::load(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Toml { .. }));
    assert!(err.to_string().contains(CONFIG_FILE));
}

#[test]
fn test_bump_dependents_requirement() {
    assert_eq!(BumpDependents::default(), BumpDependents::Range);
    assert_eq!(BumpDependents::Range.requirement("2.0.0").as_deref(), Some("^2.0.0"));
    assert_eq!(BumpDependents::Exact.requirement("2.0.0").as_deref(), Some("2.0.0"));
    assert_eq!(BumpDependents::No.requirement("2.0.0"), None);
    assert_eq!(BumpDependents::from_str("EXACT"), Some(BumpDependents::Exact));
    assert_eq!(BumpDependents::from_str("sometimes"), None);
}
