use std::sync::atomic::{AtomicUsize, Ordering};

use monolink_core::scheduler::{Job, JobCommand, JobReporter};
use owo_colors::OwoColorize;

use crate::formatting::Status;

/// Prints a line whenever a job starts or finishes.
#[derive(Default)]
pub struct CliJobReporter {
    failed: AtomicUsize,
}

impl CliJobReporter {
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

impl JobReporter for CliJobReporter {
    fn on_start(&self, job: &Job, running: usize) {
        if job.command == JobCommand::Placeholder {
            return;
        }
        println!(
            "  {} {} {} {}",
            Status::Info.colored_symbol(),
            format!("[{}]", job.package).bright_black().bold(),
            job.command_line().bold(),
            format!("({} running)", running).bright_black()
        );
    }

    fn on_finish(&self, job: &Job, ok: bool, _running: usize) {
        if job.command == JobCommand::Placeholder {
            return;
        }
        if ok {
            println!(
                "  {} {}",
                Status::Success.colored_symbol(),
                format!("[{}]", job.package).bright_black().bold()
            );
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            println!(
                "  {} {} {}",
                Status::Error.colored_symbol(),
                format!("[{}]", job.package).red().bold(),
                "failed".red()
            );
        }
    }
}
