use anyhow::Result;
use monolink_core::ops;
use owo_colors::OwoColorize;

use crate::formatting::{print_key_value, print_section_header, print_status_table};

use super::Session;

fn yes_no(value: Option<bool>, bad: &str, good: &str) -> String {
    match value {
        Some(true) => bad.yellow().to_string(),
        Some(false) => good.green().to_string(),
        None => "unknown".bright_black().to_string(),
    }
}

pub async fn cmd_status(session: &Session, json: bool) -> Result<()> {
    let report = ops::status(&session.ctx).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_section_header("Git");
    print_key_value(
        "Current branch:",
        report.git.branch.as_deref().unwrap_or("unknown"),
    );
    print_key_value(
        "Last tag:",
        report.git.last_tag.as_deref().unwrap_or("(none)"),
    );
    print_key_value(
        "Uncommitted changes:",
        &yes_no(report.git.uncommitted, "yes", "no"),
    );
    print_key_value(
        "Unpulled changes:",
        &yes_no(report.git.unpulled, "yes", "no"),
    );
    println!();

    print_section_header("Packages");
    print_status_table(&report.packages);
    println!();
    Ok(())
}
