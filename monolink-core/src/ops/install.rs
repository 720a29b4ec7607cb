use std::fs;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::runner::{shell_quote, ExecOptions};
use crate::transaction::{run_in_transaction, MutationRecord};

use super::{satisfies, warn_unsatisfied, OpContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    /// Skip dev-only dependencies. Also enabled by `NODE_ENV=production`.
    pub production: bool,
    pub frozen_lockfile: bool,
    pub pure_lockfile: bool,
    pub no_lockfile: bool,
}

impl BootstrapOptions {
    fn is_production(&self) -> bool {
        self.production || std::env::var("NODE_ENV").is_ok_and(|env| env == "production")
    }

    fn install_command(&self, production: bool) -> String {
        let mut cmd = String::from("yarn install");
        for (enabled, flag) in [
            (production, "--production"),
            (self.frozen_lockfile, "--frozen-lockfile"),
            (self.pure_lockfile, "--pure-lockfile"),
            (self.no_lockfile, "--no-lockfile"),
        ] {
            if enabled {
                cmd.push(' ');
                cmd.push_str(flag);
            }
        }
        cmd
    }
}

/// Installs external dependencies everywhere, then links siblings.
///
/// Pass 1 registers every sub-package with `yarn link` and installs its
/// external dependencies with internal links hidden. Pass 2 links each
/// package to the siblings it depends on.
pub async fn bootstrap(ctx: &OpContext, opts: &BootstrapOptions) -> Result<()> {
    let workspace = ctx.workspace(true)?;
    let production = opts.is_production();
    let install = opts.install_command(production);
    let mut removed: IndexMap<String, MutationRecord> = IndexMap::new();

    for package in workspace.packages() {
        info!("PASS 1: processing {}...", package.display_name());
        let dir = workspace.package_dir(package);
        if !package.is_root() {
            info!("  - Registering...");
            ctx.runner
                .execute("yarn link", &ExecOptions::new(&dir))
                .await?;
        }

        info!("  - Installing external dependencies...");
        let (_, record) = run_in_transaction(
            &ctx.store,
            package,
            workspace.matcher(),
            ctx.runner.as_ref(),
            &install,
            &ExecOptions::new(&dir).with_label(format!("[{}]", package.display_name())),
        )
        .await?;
        removed.insert(package.name.clone(), record);
    }

    for package in workspace.packages() {
        info!("PASS 2: installing internal deps for {}...", package.display_name());
        let Some(record) = removed.get(&package.name) else {
            continue;
        };
        let dir = workspace.package_dir(package);
        for (dep, range) in record.by_name() {
            if production && record.is_dev_only(&dep) {
                continue;
            }
            info!("  - Linking to {}...", dep);
            if let Some(sibling) = workspace.get(&dep) {
                if satisfies(sibling.version(), &range) == Some(false) {
                    warn!(
                        "  - Warning: {}@{} does not satisfy specified range: {}",
                        dep,
                        sibling.version(),
                        range
                    );
                }
            }
            ctx.runner
                .execute(&format!("yarn link {}", shell_quote(&dep)), &ExecOptions::new(&dir))
                .await?;
        }
    }
    Ok(())
}

/// Runs `yarn outdated` for every package with internal links hidden.
pub async fn outdated(ctx: &OpContext) -> Result<()> {
    let workspace = ctx.workspace(true)?;
    for package in workspace.packages() {
        info!("Outdated dependencies in {}", package.display_name());
        let opts = ExecOptions::new(workspace.package_dir(package))
            .with_label(format!("[{}]", package.display_name()))
            .tolerating_failure();
        let (_, record) = run_in_transaction(
            &ctx.store,
            package,
            workspace.matcher(),
            ctx.runner.as_ref(),
            "yarn outdated",
            &opts,
        )
        .await?;
        warn_unsatisfied(&workspace, &record);
    }
    Ok(())
}

/// Deletes `node_modules` of every sub-package. Returns how many existed.
pub fn clean(ctx: &OpContext) -> Result<usize> {
    let workspace = ctx.workspace(false)?;
    let dirs: Vec<_> = workspace
        .sub_packages()
        .map(|p| workspace.package_dir(p).join("node_modules"))
        .collect();

    let removed = dirs
        .par_iter()
        .filter(|dir| dir.is_dir())
        .map(|dir| {
            info!("Removing {}...", dir.display());
            fs::remove_dir_all(dir)
        })
        .collect::<std::io::Result<Vec<_>>>()?;
    Ok(removed.len())
}
