//! Command implementations for the CLI.

mod deps;
mod install;
mod job_reporter;
mod prompt;
mod release;
mod release_reporter;
mod run;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use monolink_core::config::WorkspaceConfig;
use monolink_core::ops::OpContext;
use monolink_core::prompt::{FixedPrompt, Prompt};

use crate::WorkspaceArgs;

pub use deps::{cmd_bump, cmd_deps, cmd_remove_all};
pub use install::{cmd_bootstrap, cmd_clean, cmd_outdated};
pub use release::{cmd_prepublish, cmd_publish, cmd_reset_all_versions, PublishArgs};
pub use run::{cmd_all, cmd_run_script, RunArgs};
pub use status::cmd_status;

/// Configuration and operation context for one invocation.
pub struct Session {
    pub config: WorkspaceConfig,
    pub ctx: OpContext,
    pub assume_yes: bool,
}

impl Session {
    pub fn open(args: &WorkspaceArgs) -> Result<Self> {
        let root = args
            .root
            .canonicalize()
            .with_context(|| format!("Repository root {} not found", args.root.display()))?;
        let config = WorkspaceConfig::load(&root)?;
        let options = config.merge_cli(&args.src, args.ignore_src.clone(), args.link.clone());

        let prompt: Arc<dyn Prompt> = if args.yes {
            Arc::new(FixedPrompt::yes())
        } else {
            Arc::new(prompt::TerminalPrompt)
        };

        Ok(Self {
            config,
            ctx: OpContext::with_shell(root, options, prompt),
            assume_yes: args.yes,
        })
    }
}
