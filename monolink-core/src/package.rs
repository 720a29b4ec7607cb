//! Package and manifest data models.

use std::path::PathBuf;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Reserved identity key of the monorepo's own top-level manifest.
pub const ROOT_PACKAGE: &str = "__ROOT_PACKAGE__";

/// Manifest file name inside every package directory.
pub const MANIFEST_FILE: &str = "package.json";

/// The four dependency maps a manifest may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepType {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DepType {
    /// All dependency types, in the order they are scanned.
    pub const ALL: [DepType; 4] = [
        DepType::Dependencies,
        DepType::DevDependencies,
        DepType::PeerDependencies,
        DepType::OptionalDependencies,
    ];

    #[inline]
    pub fn as_key(&self) -> &'static str {
        match self {
            DepType::Dependencies => "dependencies",
            DepType::DevDependencies => "devDependencies",
            DepType::PeerDependencies => "peerDependencies",
            DepType::OptionalDependencies => "optionalDependencies",
        }
    }
}

/// A package's declared metadata.
///
/// Backed by an insertion-ordered JSON object so that keys the tool does not
/// know about, and the order of all keys, survive a read/write cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn as_value_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.fields.get("version").and_then(Value::as_str)
    }

    pub fn set_version(&mut self, version: &str) {
        self.fields
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    pub fn is_private(&self) -> bool {
        self.fields
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Script names declared under `scripts`, in declaration order.
    pub fn script_names(&self) -> Vec<String> {
        self.fields
            .get("scripts")
            .and_then(Value::as_object)
            .map(|scripts| scripts.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the dependency map of the given type as name → range.
    ///
    /// Entries whose range is not a string are skipped.
    pub fn deps(&self, dep_type: DepType) -> IndexMap<String, String> {
        self.fields
            .get(dep_type.as_key())
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, range)| {
                        range.as_str().map(|r| (name.clone(), r.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn dep_range(&self, dep_type: DepType, name: &str) -> Option<&str> {
        self.fields
            .get(dep_type.as_key())
            .and_then(Value::as_object)
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    /// Inserts or overwrites a dependency, creating the map if needed.
    ///
    /// An existing key keeps its position; a new key is appended.
    pub fn set_dep(&mut self, dep_type: DepType, name: &str, range: &str) {
        let entry = self
            .fields
            .entry(dep_type.as_key().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(deps) = entry {
            deps.insert(name.to_string(), Value::String(range.to_string()));
        }
    }

    /// Removes a dependency, returning its range if it was present.
    ///
    /// The (possibly empty) map is kept.
    pub fn remove_dep(&mut self, dep_type: DepType, name: &str) -> Option<String> {
        let deps = self
            .fields
            .get_mut(dep_type.as_key())
            .and_then(Value::as_object_mut)?;
        deps.shift_remove(name)
            .map(|range| range.as_str().map(str::to_string).unwrap_or_default())
    }

    /// Total number of entries in a dependency map.
    pub fn dep_count(&self, dep_type: DepType) -> usize {
        self.fields
            .get(dep_type.as_key())
            .and_then(Value::as_object)
            .map(Map::len)
            .unwrap_or(0)
    }
}

/// Decides which dependency names are internal links.
///
/// A dependency is internal when it names a known package or matches the
/// configured link pattern.
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    names: Vec<String>,
    pattern: Option<Regex>,
}

impl LinkMatcher {
    pub fn new(names: Vec<String>, link_pattern: Option<&str>) -> Result<Self> {
        let pattern = link_pattern.map(Regex::new).transpose()?;
        Ok(Self { names, pattern })
    }

    #[inline]
    pub fn is_known_package(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    #[inline]
    pub fn matches_link_pattern(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|re| re.is_match(name))
            .unwrap_or(false)
    }

    #[inline]
    pub fn is_internal(&self, name: &str) -> bool {
        self.is_known_package(name) || self.matches_link_pattern(name)
    }
}

/// Represents a package in the monorepo.
#[derive(Debug, Clone)]
pub struct Package {
    /// Identity key; [`ROOT_PACKAGE`] for the monorepo root.
    pub name: String,
    /// Package directory, relative to the repository root.
    pub path: PathBuf,
    /// Manifest file, relative to the repository root.
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
}

impl Package {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, manifest: Manifest) -> Self {
        let path = path.into();
        let manifest_path = path.join(MANIFEST_FILE);
        Self {
            name: name.into(),
            path,
            manifest_path,
            manifest,
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.name == ROOT_PACKAGE
    }

    pub fn display_name(&self) -> &str {
        if self.is_root() {
            "ROOT"
        } else {
            &self.name
        }
    }

    pub fn version(&self) -> &str {
        self.manifest.version().unwrap_or("")
    }

    pub fn is_private(&self) -> bool {
        self.manifest.is_private()
    }

    /// Internal dependency names, deduplicated, in first-seen order.
    pub fn internal_deps(&self, is_known: impl Fn(&str) -> bool) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for dep_type in DepType::ALL {
            for name in self.manifest.deps(dep_type).into_keys() {
                if is_known(&name) && !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }
}

/// All packages of a monorepo, in discovery order.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    packages: IndexMap<String, Package>,
    matcher: LinkMatcher,
}

impl Workspace {
    pub fn new(
        root: impl Into<PathBuf>,
        packages: Vec<Package>,
        link_pattern: Option<&str>,
    ) -> Result<Self> {
        let mut map = IndexMap::with_capacity(packages.len());
        for package in packages {
            if map.contains_key(&package.name) {
                return Err(Error::Validation(format!(
                    "Duplicate package name: {}",
                    package.name
                )));
            }
            map.insert(package.name.clone(), package);
        }
        let names = map.keys().cloned().collect();
        Ok(Self {
            root: root.into(),
            packages: map,
            matcher: LinkMatcher::new(names, link_pattern)?,
        })
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Looks a package up, failing with a validation error listing the
    /// available names.
    pub fn require(&self, name: &str) -> Result<&Package> {
        self.packages.get(name).ok_or_else(|| Error::PackageNotFound {
            name: name.to_string(),
            available: self
                .packages
                .keys()
                .filter(|n| n.as_str() != ROOT_PACKAGE)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn sub_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values().filter(|p| !p.is_root())
    }

    pub fn names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    pub fn root_package(&self) -> Option<&Package> {
        self.packages.get(ROOT_PACKAGE)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn matcher(&self) -> &LinkMatcher {
        &self.matcher
    }

    /// Absolute directory of a package.
    pub fn package_dir(&self, package: &Package) -> PathBuf {
        self.root.join(&package.path)
    }
}

/// Splits `name@range` into its parts; scoped names keep their leading `@`.
pub fn parse_dep(spec: &str) -> (String, Option<String>) {
    let (scope, rest) = match spec.strip_prefix('@') {
        Some(rest) => ("@", rest),
        None => ("", spec),
    };
    match rest.split_once('@') {
        Some((name, range)) if !range.is_empty() => {
            (format!("{}{}", scope, name), Some(range.to_string()))
        }
        Some((name, _)) => (format!("{}{}", scope, name), None),
        None => (spec.to_string(), None),
    }
}
