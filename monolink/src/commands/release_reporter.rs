//! Release reporter implementation for CLI.

use monolink_core::release_reporter::ReleaseReporter;
use owo_colors::OwoColorize;

/// CLI implementation of ReleaseReporter.
pub struct CliReleaseReporter;

impl ReleaseReporter for CliReleaseReporter {
    fn report_dirty(&self, package: &str, version: &str, changed_files: usize) {
        let changes = if changed_files == 0 {
            "changed".to_string()
        } else {
            format!("{} file/s changed", changed_files)
        };
        println!(
            "  {} {} {}",
            format!("{}@{}", package, version).bold().white(),
            "→".cyan(),
            changes.yellow()
        );
    }

    fn report_bump(&self, package: &str, old: Option<&str>, new: &str) {
        println!(
            "  Bumped {} from {} to {}",
            package.bold().white(),
            old.unwrap_or("(none)").bright_black(),
            new.green()
        );
    }

    fn report_dependent(&self, package: &str, dependency: &str, requirement: &str) {
        println!(
            "  Updated {} dependency of {} to {}",
            dependency.bold(),
            package.bold().white(),
            requirement.cyan()
        );
    }
}
