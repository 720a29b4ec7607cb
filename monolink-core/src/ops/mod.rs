//! Monorepo operations, one per CLI subcommand.

mod deps;
mod install;
mod release;
mod run;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use semver::{Version, VersionReq};
use tracing::warn;

use crate::config::WorkspaceOptions;
use crate::error::Result;
use crate::package::Workspace;
use crate::prompt::Prompt;
use crate::runner::{CommandRunner, ShellRunner};
use crate::store::ManifestStore;
use crate::transaction::MutationRecord;
use crate::vcs::{GitCli, Vcs};

pub use deps::{add_remove_upgrade, bump, remove_all, DepOperation, DepOptions};
pub use install::{bootstrap, clean, outdated, BootstrapOptions};
pub use release::{prepublish, publish, reset_all_versions, DEFAULT_COPY_ATTRS};
pub use run::{all, run_script, RunOptions};
pub use status::{status, GitStatus, PackageStatus, StatusReport};

/// Everything an operation needs from its environment.
#[derive(Clone)]
pub struct OpContext {
    pub store: ManifestStore,
    pub options: WorkspaceOptions,
    pub runner: Arc<dyn CommandRunner>,
    pub vcs: Arc<dyn Vcs>,
    pub prompt: Arc<dyn Prompt>,
}

impl OpContext {
    pub fn new(
        root: impl Into<PathBuf>,
        options: WorkspaceOptions,
        runner: Arc<dyn CommandRunner>,
        vcs: Arc<dyn Vcs>,
        prompt: Arc<dyn Prompt>,
    ) -> Self {
        Self {
            store: ManifestStore::new(root),
            options,
            runner,
            vcs,
            prompt,
        }
    }

    /// Context running real shell commands and `git`.
    pub fn with_shell(root: impl Into<PathBuf>, options: WorkspaceOptions, prompt: Arc<dyn Prompt>) -> Self {
        let root = root.into();
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner);
        let vcs = Arc::new(GitCli::new(root.clone(), Arc::clone(&runner)));
        Self::new(root, options, runner, vcs, prompt)
    }

    pub fn workspace(&self, include_root: bool) -> Result<Workspace> {
        self.store.load_workspace(&self.options, include_root)
    }
}

/// Whether `version` satisfies an npm-style `range`.
///
/// Handles `||` alternatives, exact versions and space-separated comparator
/// sets. Returns `None` when the range cannot be understood.
pub fn satisfies(version: &str, range: &str) -> Option<bool> {
    let version = Version::parse(version.trim()).ok()?;
    let mut understood = false;
    for alternative in range.split("||").map(str::trim) {
        if alternative.is_empty() || alternative == "*" || alternative == "x" {
            return Some(true);
        }
        if let Ok(exact) = Version::parse(alternative.trim_start_matches(['=', 'v'])) {
            understood = true;
            if exact == version {
                return Some(true);
            }
            continue;
        }
        let comparators = alternative.split_whitespace().collect::<Vec<_>>().join(", ");
        if let Ok(req) = VersionReq::parse(&comparators) {
            understood = true;
            if req.matches(&version) {
                return Some(true);
            }
        }
    }
    understood.then_some(false)
}

/// Warns about linked siblings whose version is outside the declared range.
pub(crate) fn warn_unsatisfied(workspace: &Workspace, removed: &MutationRecord) {
    for (dep, range) in removed.by_name() {
        // Link-pattern deps may not be part of the workspace.
        let Some(sibling) = workspace.get(&dep) else {
            continue;
        };
        if satisfies(sibling.version(), &range) == Some(false) {
            warn!(
                "{}@{} does not satisfy the specified range: {}",
                dep,
                sibling.version(),
                range
            );
        }
    }
}
