//! Manifest mutations that hide internal links from an external tool.
//!
//! A transaction strips every internal dependency from a manifest, lets an
//! external package manager work on what is left, and then merges the
//! stripped entries back into whatever the tool wrote. If the tool fails the
//! manifest is restored byte for byte.

use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::package::{DepType, LinkMatcher, Manifest, Package};
use crate::runner::{CommandOutput, CommandRunner, ExecOptions};
use crate::store::{ManifestClaim, ManifestStore};

/// Internal dependency entries removed from a manifest, by dependency type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRecord {
    removed: IndexMap<DepType, IndexMap<String, String>>,
}

impl MutationRecord {
    pub fn is_empty(&self) -> bool {
        self.removed.values().all(IndexMap::is_empty)
    }

    pub fn insert(&mut self, dep_type: DepType, name: &str, range: &str) {
        self.removed
            .entry(dep_type)
            .or_default()
            .insert(name.to_string(), range.to_string());
    }

    pub fn get(&self, dep_type: DepType, name: &str) -> Option<&str> {
        self.removed
            .get(&dep_type)
            .and_then(|deps| deps.get(name))
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.removed.values().any(|deps| deps.contains_key(name))
    }

    /// Forgets `name` under every dependency type so it is not restored.
    pub fn forget(&mut self, name: &str) -> bool {
        let mut found = false;
        for deps in self.removed.values_mut() {
            found |= deps.shift_remove(name).is_some();
        }
        found
    }

    /// Changes the range `name` is restored with, wherever it was declared.
    pub fn set_range(&mut self, name: &str, range: &str) -> bool {
        let mut found = false;
        for deps in self.removed.values_mut() {
            if let Some(existing) = deps.get_mut(name) {
                *existing = range.to_string();
                found = true;
            }
        }
        found
    }

    /// Iterates `(type, name, range)` in dependency type order.
    pub fn iter(&self) -> impl Iterator<Item = (DepType, &str, &str)> {
        DepType::ALL.into_iter().flat_map(move |dep_type| {
            self.removed
                .get(&dep_type)
                .into_iter()
                .flat_map(move |deps| {
                    deps.iter()
                        .map(move |(name, range)| (dep_type, name.as_str(), range.as_str()))
                })
        })
    }

    pub fn len(&self) -> usize {
        self.removed.values().map(IndexMap::len).sum()
    }

    /// Removed names with their range, each name once.
    pub fn by_name(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        for (_, name, range) in self.iter() {
            out.entry(name.to_string()).or_insert_with(|| range.to_string());
        }
        out
    }

    /// Whether `name` was only declared as a dev dependency.
    pub fn is_dev_only(&self, name: &str) -> bool {
        [
            DepType::Dependencies,
            DepType::PeerDependencies,
            DepType::OptionalDependencies,
        ]
        .into_iter()
        .all(|dep_type| self.get(dep_type, name).is_none())
    }
}

/// Strips internal links from `manifest` in place.
pub fn remove_internal_links(manifest: &mut Manifest, matcher: &LinkMatcher) -> MutationRecord {
    let mut record = MutationRecord::default();
    for dep_type in DepType::ALL {
        for (name, range) in manifest.deps(dep_type) {
            if matcher.is_internal(&name) {
                manifest.remove_dep(dep_type, &name);
                record.insert(dep_type, &name, &range);
            }
        }
    }
    record
}

/// An open mutation of one package manifest.
///
/// Dropping an open transaction restores the pristine manifest on a best
/// effort basis.
pub struct ManifestTransaction<'a> {
    store: &'a ManifestStore,
    manifest_path: PathBuf,
    pristine: Vec<u8>,
    staged: Option<Vec<u8>>,
    initial_record: MutationRecord,
    record: MutationRecord,
    claim: Option<ManifestClaim>,
}

impl<'a> ManifestTransaction<'a> {
    /// Claims the manifest, strips its internal links and stages the result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TransactionConflict`] if another transaction
    /// is open on the same manifest.
    pub fn begin(store: &'a ManifestStore, package: &Package, matcher: &LinkMatcher) -> Result<Self> {
        let manifest_path = package.manifest_path.clone();
        let claim = store.claim(&manifest_path)?;
        let pristine = store.read_raw(&manifest_path)?;
        let mut manifest = store.read_manifest(&manifest_path)?;

        let record = remove_internal_links(&mut manifest, matcher);
        let staged = if record.is_empty() {
            None
        } else {
            let bytes = ManifestStore::serialize(&manifest)?;
            store.write_raw(&manifest_path, &bytes)?;
            debug!(
                "Staged {} without {} internal link(s)",
                manifest_path.display(),
                record.len()
            );
            Some(bytes)
        };

        Ok(Self {
            store,
            manifest_path,
            pristine,
            staged,
            initial_record: record.clone(),
            record,
            claim: Some(claim),
        })
    }

    pub fn removed(&self) -> &MutationRecord {
        &self.record
    }

    pub fn removed_mut(&mut self) -> &mut MutationRecord {
        &mut self.record
    }

    /// Merges the removed entries back into the manifest as the external tool
    /// left it. Restored entries win over same-key entries the tool added.
    pub fn commit(mut self) -> Result<()> {
        let current = self.store.read_raw(&self.manifest_path)?;
        let untouched = current == *self.staged.as_ref().unwrap_or(&self.pristine);

        if untouched && self.record == self.initial_record {
            if self.staged.is_some() {
                self.store.write_raw(&self.manifest_path, &self.pristine)?;
            }
        } else if !self.record.is_empty() || self.record != self.initial_record {
            let mut manifest = self.store.read_manifest(&self.manifest_path)?;
            for (dep_type, name, range) in self.record.iter() {
                manifest.set_dep(dep_type, name, range);
            }
            self.store.write(&self.manifest_path, &manifest)?;
        }

        debug!("Restored internal links in {}", self.manifest_path.display());
        self.claim.take();
        Ok(())
    }

    /// Restores the pristine manifest bytes.
    pub fn abort(mut self) -> Result<()> {
        self.store.write_raw(&self.manifest_path, &self.pristine)?;
        debug!("Rolled back {}", self.manifest_path.display());
        self.claim.take();
        Ok(())
    }
}

impl Drop for ManifestTransaction<'_> {
    fn drop(&mut self) {
        if self.claim.is_none() {
            return;
        }
        warn!(
            "Transaction on {} was not finished, restoring original manifest",
            self.manifest_path.display()
        );
        if let Err(e) = self.store.write_raw(&self.manifest_path, &self.pristine) {
            warn!("Could not restore {}: {}", self.manifest_path.display(), e);
        }
    }
}

/// Runs `command` inside a transaction on `package`'s manifest.
///
/// Returns the command output together with the internal links that were
/// hidden from it. On failure the manifest is rolled back and the command's
/// error returned.
pub async fn run_in_transaction(
    store: &ManifestStore,
    package: &Package,
    matcher: &LinkMatcher,
    runner: &dyn CommandRunner,
    command: &str,
    opts: &ExecOptions,
) -> Result<(CommandOutput, MutationRecord)> {
    let tx = ManifestTransaction::begin(store, package, matcher)?;
    let record = tx.removed().clone();
    match runner.execute(command, opts).await {
        Ok(output) => {
            tx.commit()?;
            Ok((output, record))
        }
        Err(e) => {
            if let Err(restore_err) = tx.abort() {
                warn!("Could not roll back {}: {}", package.manifest_path.display(), restore_err);
            }
            Err(e)
        }
    }
}
