//! TOML configuration for the monorepo and effective workspace options.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration file name, looked up at the repository root.
pub const CONFIG_FILE: &str = "monolink.toml";

/// Default glob for sub-package directories.
pub const DEFAULT_SRC: &str = "packages/*";

/// How dependents of released packages get their requirement rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpDependents {
    /// Leave dependents untouched.
    No,
    /// `^<version>`.
    #[default]
    Range,
    /// `<version>`.
    Exact,
}

impl BumpDependents {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "no" | "none" => Some(BumpDependents::No),
            "range" | "caret" => Some(BumpDependents::Range),
            "exact" => Some(BumpDependents::Exact),
            _ => None,
        }
    }

    /// Formats the requirement dependents should declare for `version`.
    pub fn requirement(&self, version: &str) -> Option<String> {
        match self {
            BumpDependents::No => None,
            BumpDependents::Range => Some(format!("^{}", version)),
            BumpDependents::Exact => Some(version.to_string()),
        }
    }
}

/// `[publish]` table of `monolink.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    pub publish_tag: Option<String>,
    pub access: Option<String>,
    pub bump_dependents: Option<BumpDependents>,
    pub changelog_path: Option<String>,
    pub graph_order: Option<bool>,
}

/// Workspace-level configuration as defined in `monolink.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Glob patterns for sub-package directories.
    #[serde(default)]
    pub src: Vec<String>,
    /// Glob pattern for sub-package directories to skip.
    pub ignore_src: Option<String>,
    /// Regex for dependencies that are linked rather than installed.
    pub link: Option<String>,
    /// Default concurrency limit for parallel runs.
    pub parallel_limit: Option<usize>,
    #[serde(default)]
    pub publish: PublishConfig,
}

impl WorkspaceConfig {
    /// Loads `monolink.toml` from `root`, or defaults when there is none.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })
    }

    /// Overlays command-line values on top of the file configuration.
    pub fn merge_cli(
        &self,
        src: &[String],
        ignore_src: Option<String>,
        link: Option<String>,
    ) -> WorkspaceOptions {
        let src = if !src.is_empty() {
            src.to_vec()
        } else if !self.src.is_empty() {
            self.src.clone()
        } else {
            vec![DEFAULT_SRC.to_string()]
        };
        WorkspaceOptions {
            src,
            ignore_src: ignore_src.or_else(|| self.ignore_src.clone()),
            link: link.or_else(|| self.link.clone()),
        }
    }
}

/// Effective options for discovering packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceOptions {
    pub src: Vec<String>,
    pub ignore_src: Option<String>,
    pub link: Option<String>,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            src: vec![DEFAULT_SRC.to_string()],
            ignore_src: None,
            link: None,
        }
    }
}
