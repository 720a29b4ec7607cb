//! Filesystem-backed manifest repository.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use glob::Pattern;
use tracing::{debug, info};

use crate::config::WorkspaceOptions;
use crate::error::{Error, Result};
use crate::package::{Manifest, Package, Workspace, MANIFEST_FILE, ROOT_PACKAGE};

/// Lists package directories and loads/stores their manifests.
///
/// All paths handed in and out are relative to the repository root. The
/// store also tracks which manifests currently have an open transaction so
/// that a manifest never has two writers.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
    open_transactions: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open_transactions: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn absolute(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Lists directories matching any `include` glob that contain a manifest
    /// and do not match `exclude`. Sorted and deduplicated.
    pub fn list(&self, include: &[String], exclude: Option<&str>) -> Result<Vec<PathBuf>> {
        let exclude = exclude
            .map(|p| Pattern::new(p.trim_end_matches('/')))
            .transpose()?;
        let mut paths = Vec::new();

        for pattern in include {
            let pattern = pattern.trim_end_matches('/');
            let full = self.root.join(pattern);
            let full = full.to_string_lossy();
            for entry in glob::glob(&full)? {
                let Ok(path) = entry else {
                    continue;
                };
                if !path.is_dir() || !path.join(MANIFEST_FILE).is_file() {
                    continue;
                }
                let relative = path
                    .strip_prefix(&self.root)
                    .map(Path::to_path_buf)
                    .unwrap_or(path);
                if exclude.as_ref().is_some_and(|ex| ex.matches_path(&relative)) {
                    continue;
                }
                paths.push(relative);
            }
        }

        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// Reads and validates the package at `package_path`.
    ///
    /// The repository root (`.`) becomes the synthetic root package. For
    /// other packages the manifest name must equal the directory name unless
    /// it is scoped (`@scope/name`).
    pub fn read(&self, package_path: &Path) -> Result<Package> {
        let manifest_path = package_path.join(MANIFEST_FILE);
        let manifest = self.read_manifest(&manifest_path)?;
        let is_root = package_path == Path::new(".");

        let name = manifest.name().unwrap_or_default().to_string();
        if is_root {
            return Ok(Package::new(ROOT_PACKAGE, package_path, manifest));
        }
        if name.is_empty() {
            return Err(Error::ManifestRead {
                path: self.absolute(&manifest_path),
                message: format!("Package has no name ({})", package_path.display()),
            });
        }
        let dir_name = package_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !name.starts_with('@') && name != dir_name {
            return Err(Error::ManifestRead {
                path: self.absolute(&manifest_path),
                message: format!(
                    "Package name ({}) does not match directory name {}",
                    name,
                    package_path.display()
                ),
            });
        }

        Ok(Package::new(name, package_path, manifest))
    }

    pub fn read_manifest(&self, manifest_path: &Path) -> Result<Manifest> {
        let absolute = self.absolute(manifest_path);
        let bytes = fs::read(&absolute).map_err(|e| Error::ManifestRead {
            path: absolute.clone(),
            message: e.to_string(),
        })?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| Error::ManifestRead {
                path: absolute.clone(),
                message: e.to_string(),
            })?;
        Manifest::from_value(value).ok_or_else(|| Error::ManifestRead {
            path: absolute,
            message: "manifest is not a JSON object".to_string(),
        })
    }

    pub fn read_raw(&self, manifest_path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(self.absolute(manifest_path))?)
    }

    /// Serializes with two-space indentation and a trailing newline.
    pub fn write(&self, manifest_path: &Path, manifest: &Manifest) -> Result<()> {
        self.write_raw(manifest_path, &Self::serialize(manifest)?)
    }

    pub fn serialize(manifest: &Manifest) -> Result<Vec<u8>> {
        let mut content = serde_json::to_string_pretty(manifest.as_value_map())?;
        content.push('\n');
        Ok(content.into_bytes())
    }

    /// Replaces the file atomically (write to a sibling, then rename).
    pub fn write_raw(&self, manifest_path: &Path, bytes: &[u8]) -> Result<()> {
        let absolute = self.absolute(manifest_path);
        let mut tmp = absolute.clone().into_os_string();
        tmp.push(".monolink-tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &absolute)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!("Wrote {}", absolute.display());
        Ok(())
    }

    /// Discovers and reads every package; the root package is appended last
    /// when `include_root` is set.
    pub fn load_workspace(&self, opts: &WorkspaceOptions, include_root: bool) -> Result<Workspace> {
        info!("Reading all package manifests...");
        let mut package_paths = self.list(&opts.src, opts.ignore_src.as_deref())?;
        if include_root {
            package_paths.push(PathBuf::from("."));
        }
        let packages = package_paths
            .iter()
            .map(|path| self.read(path))
            .collect::<Result<Vec<_>>>()?;
        Workspace::new(&self.root, packages, opts.link.as_deref())
    }

    /// Claims exclusive write access to a manifest until the claim drops.
    pub(crate) fn claim(&self, manifest_path: &Path) -> Result<ManifestClaim> {
        let mut open = self
            .open_transactions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !open.insert(manifest_path.to_path_buf()) {
            return Err(Error::TransactionConflict(self.absolute(manifest_path)));
        }
        Ok(ManifestClaim {
            registry: Arc::clone(&self.open_transactions),
            manifest_path: manifest_path.to_path_buf(),
        })
    }
}

/// Exclusive write access to one manifest.
#[derive(Debug)]
pub(crate) struct ManifestClaim {
    registry: Arc<Mutex<HashSet<PathBuf>>>,
    manifest_path: PathBuf,
}

impl Drop for ManifestClaim {
    fn drop(&mut self) {
        let mut open = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        open.remove(&self.manifest_path);
    }
}
