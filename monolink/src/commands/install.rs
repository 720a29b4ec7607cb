//! Installation and cleanup commands.

use std::time::Instant;

use anyhow::Result;
use monolink_core::ops::{self, BootstrapOptions};

use crate::formatting::{create_spinner, format_duration, print_success};

use super::Session;

pub async fn cmd_bootstrap(
    session: &Session,
    production: bool,
    frozen_lockfile: bool,
    pure_lockfile: bool,
    no_lockfile: bool,
) -> Result<()> {
    let opts = BootstrapOptions {
        production,
        frozen_lockfile,
        pure_lockfile,
        no_lockfile,
    };
    let start = Instant::now();
    let spinner = create_spinner("Bootstrapping packages...");
    let result = ops::bootstrap(&session.ctx, &opts).await;
    spinner.finish_and_clear();
    result?;

    print_success(&format!(
        "Bootstrap completed in {}",
        format_duration(start.elapsed().as_secs_f64())
    ));
    Ok(())
}

pub async fn cmd_outdated(session: &Session) -> Result<()> {
    ops::outdated(&session.ctx).await?;
    Ok(())
}

pub fn cmd_clean(session: &Session) -> Result<()> {
    let removed = ops::clean(&session.ctx)?;
    print_success(&format!("Removed {} node_modules folder/s", removed));
    Ok(())
}
