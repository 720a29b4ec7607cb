//! Version control queries used by status and release.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::runner::{shell_quote, CommandRunner, ExecOptions};

/// Returned by [`Vcs::diff_since`] when there is no tag to diff against.
pub const CHANGED_SENTINEL: &str = "CHANGED";

#[async_trait]
pub trait Vcs: Send + Sync {
    /// Most recent tag reachable from any ref, or `None` if the repository
    /// has no tags (or the query fails).
    async fn last_release_tag(&self) -> Option<String>;

    /// Names of files under `path` that changed since `tag`, one per line.
    /// Without a tag everything counts as changed.
    async fn diff_since(&self, tag: Option<&str>, path: &Path) -> Result<String>;

    async fn current_branch(&self) -> Result<String>;

    /// Porcelain status of the working tree; empty when clean.
    async fn uncommitted_changes(&self) -> Result<String>;

    /// Commits on the upstream branch that are not in `HEAD`.
    async fn unpulled_commit_count(&self) -> Result<u32>;

    /// Stages everything and commits.
    async fn commit(&self, message: &str) -> Result<()>;

    async fn tag(&self, name: &str) -> Result<()>;

    async fn push_with_tags(&self) -> Result<()>;
}

/// [`Vcs`] backed by the `git` command line.
pub struct GitCli {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    async fn git(&self, args: &str) -> Result<String> {
        let output = self
            .runner
            .execute(&format!("git {}", args), &ExecOptions::new(&self.root))
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn last_release_tag(&self) -> Option<String> {
        let commit = self.git("rev-list --tags --max-count=1").await.ok()?;
        if commit.is_empty() {
            return None;
        }
        let tag = self.git(&format!("describe --tags {}", commit)).await.ok()?;
        (!tag.is_empty()).then_some(tag)
    }

    async fn diff_since(&self, tag: Option<&str>, path: &Path) -> Result<String> {
        let Some(tag) = tag else {
            return Ok(CHANGED_SENTINEL.to_string());
        };
        self.git(&format!(
            "diff --name-only {} -- {}",
            shell_quote(tag),
            shell_quote(&path.to_string_lossy())
        ))
        .await
    }

    async fn current_branch(&self) -> Result<String> {
        self.git("symbolic-ref --short HEAD").await
    }

    async fn uncommitted_changes(&self) -> Result<String> {
        self.git("status --porcelain").await
    }

    async fn unpulled_commit_count(&self) -> Result<u32> {
        let count = self.git("rev-list --count --left-only @{u}...HEAD").await?;
        count
            .parse()
            .map_err(|_| Error::Validation(format!("Unexpected commit count from git: {}", count)))
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.git("add .").await?;
        self.git(&format!("commit -m {}", shell_quote(message))).await?;
        Ok(())
    }

    async fn tag(&self, name: &str) -> Result<()> {
        self.git(&format!("tag {}", shell_quote(name))).await?;
        Ok(())
    }

    async fn push_with_tags(&self) -> Result<()> {
        self.git("push --quiet").await?;
        self.git("push --tags --quiet").await?;
        Ok(())
    }
}
