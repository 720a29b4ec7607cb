use anyhow::Result;
use monolink_core::ops::{self, DepOperation, DepOptions};

use crate::formatting::{print_key_value, print_section_header, print_success};

use super::Session;

pub async fn cmd_deps(
    session: &Session,
    package: &str,
    op: DepOperation,
    deps: &[String],
    opts: DepOptions,
) -> Result<()> {
    ops::add_remove_upgrade(&session.ctx, package, op, deps, &opts).await?;
    let verb = match op {
        DepOperation::Add => "Added",
        DepOperation::Remove => "Removed",
        DepOperation::Upgrade => "Upgraded",
    };
    if deps.is_empty() {
        print_success(&format!("{} dependencies of {}", verb, package));
    } else {
        print_success(&format!("{} {} ({})", verb, deps.join(", "), package));
    }
    Ok(())
}

pub async fn cmd_bump(session: &Session, deps: &[String]) -> Result<()> {
    let versions = ops::bump(&session.ctx, deps).await?;
    print_section_header("New versions");
    for (name, range) in &versions {
        print_key_value(name, range);
    }
    println!();
    Ok(())
}

pub fn cmd_remove_all(session: &Session, deps: &[String]) -> Result<()> {
    let changed = ops::remove_all(&session.ctx, deps)?;
    print_success(&format!(
        "Removed {} from {} package/s",
        deps.join(", "),
        changed
    ));
    Ok(())
}
