//! Table formatting utilities using comfy-table.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use monolink_core::ops::PackageStatus;
use monolink_core::scheduler::{Job, JobCommand, JobStatus};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per package: version, visibility, changes and dependency counts.
pub fn print_status_table(packages: &[PackageStatus]) {
    let mut table = new_table(&["Package", "Version", "Private", "Changes", "Dependencies"]);

    for package in packages {
        let name_color = if package.is_root { Color::Cyan } else { Color::White };
        let changes = match package.changes {
            None => Cell::new("N/A").fg(Color::DarkGrey),
            Some(0) => Cell::new("-").fg(Color::DarkGrey),
            Some(n) => Cell::new(n).fg(Color::Yellow),
        };
        let private = if package.private {
            Cell::new("yes").fg(Color::DarkGrey)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(&package.name).fg(name_color),
            Cell::new(&package.version),
            private,
            changes,
            Cell::new(format!(
                "{} (+{} dev)",
                package.dependencies, package.dev_dependencies
            )),
        ]);
    }

    println!("{}", table);
}

/// Final status of every job that ran a command.
pub fn print_job_table(jobs: &[Job]) {
    let mut table = new_table(&["Package", "Command", "Status"]);
    for job in jobs.iter().filter(|j| j.command != JobCommand::Placeholder) {
        let status = match job.status() {
            JobStatus::Done => Cell::new("done").fg(Color::Green),
            JobStatus::Running => Cell::new("running").fg(Color::Yellow),
            JobStatus::Idle => Cell::new("skipped").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&job.package).fg(Color::White),
            Cell::new(job.command_line()).fg(Color::DarkGrey),
            status,
        ]);
    }
    println!("{}", table);
}
