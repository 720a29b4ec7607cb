use serde::Serialize;

use crate::error::Result;
use crate::package::DepType;
use crate::vcs::CHANGED_SENTINEL;

use super::OpContext;

/// Repository state; `None` means the query failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    pub branch: Option<String>,
    pub last_tag: Option<String>,
    pub uncommitted: Option<bool>,
    pub unpulled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageStatus {
    pub name: String,
    pub is_root: bool,
    pub version: String,
    pub private: bool,
    /// Changed files since the last tag; `None` for the root.
    pub changes: Option<usize>,
    pub dependencies: usize,
    pub dev_dependencies: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub git: GitStatus,
    pub packages: Vec<PackageStatus>,
}

/// Collects git and per-package status. Git failures are tolerated.
pub async fn status(ctx: &OpContext) -> Result<StatusReport> {
    let vcs = ctx.vcs.as_ref();
    let last_tag = vcs.last_release_tag().await;
    let git = GitStatus {
        branch: vcs.current_branch().await.ok(),
        last_tag: last_tag.clone(),
        uncommitted: vcs.uncommitted_changes().await.ok().map(|u| !u.is_empty()),
        unpulled: vcs.unpulled_commit_count().await.ok().map(|n| n != 0),
    };

    let workspace = ctx.workspace(true)?;
    let mut packages = Vec::with_capacity(workspace.len());
    for package in workspace.packages() {
        let changes = if package.is_root() {
            None
        } else {
            let diff = vcs
                .diff_since(last_tag.as_deref(), &package.path)
                .await
                .unwrap_or_else(|_| CHANGED_SENTINEL.to_string());
            Some(diff.lines().filter(|l| !l.trim().is_empty()).count())
        };
        packages.push(PackageStatus {
            name: package.display_name().to_string(),
            is_root: package.is_root(),
            version: package.version().to_string(),
            private: package.is_private(),
            changes,
            dependencies: package.manifest.dep_count(DepType::Dependencies),
            dev_dependencies: package.manifest.dep_count(DepType::DevDependencies),
        });
    }

    Ok(StatusReport { git, packages })
}
