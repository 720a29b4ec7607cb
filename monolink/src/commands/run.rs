//! Bulk command execution.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use monolink_core::ops::{self, RunOptions};
use monolink_core::scheduler::Job;

use crate::formatting::{
    format_duration, print_job_table, print_section_header, print_success, print_warning,
};

use super::job_reporter::CliJobReporter;
use super::Session;

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Run jobs concurrently
    #[arg(long, action)]
    parallel: bool,

    /// Maximum number of concurrent jobs
    #[arg(long)]
    parallel_limit: Option<usize>,

    /// Wait for the jobs of a package's dependencies before starting it
    #[arg(long, action)]
    tree: bool,

    /// Keep going when a job fails
    #[arg(long, action)]
    ignore_errors: bool,
}

impl RunArgs {
    fn options(&self, session: &Session) -> RunOptions {
        RunOptions {
            parallel: self.parallel,
            parallel_limit: self.parallel_limit.or(session.config.parallel_limit),
            tree: self.tree,
            ignore_errors: self.ignore_errors,
        }
    }
}

pub async fn cmd_all(session: &Session, command: &str, args: RunArgs) -> Result<()> {
    print_section_header(&format!("Running '{}'", command));
    let reporter = Arc::new(CliJobReporter::default());
    let start = Instant::now();
    let jobs = ops::all(&session.ctx, command, &args.options(session), reporter.clone()).await?;
    summarize(&jobs, &reporter, start);
    Ok(())
}

pub async fn cmd_run_script(session: &Session, pattern: &str, args: RunArgs) -> Result<()> {
    print_section_header(&format!("Running scripts '{}'", pattern));
    let reporter = Arc::new(CliJobReporter::default());
    let start = Instant::now();
    let jobs =
        ops::run_script(&session.ctx, pattern, &args.options(session), reporter.clone()).await?;
    summarize(&jobs, &reporter, start);
    Ok(())
}

fn summarize(jobs: &[Job], reporter: &CliJobReporter, start: Instant) {
    println!();
    if jobs.is_empty() {
        print_warning("Nothing to run");
        return;
    }
    print_job_table(jobs);
    let elapsed = format_duration(start.elapsed().as_secs_f64());
    match reporter.failed() {
        0 => print_success(&format!("{} job/s finished in {}", jobs.len(), elapsed)),
        failed => print_warning(&format!(
            "{} job/s finished in {}, {} failure/s ignored",
            jobs.len(),
            elapsed,
            failed
        )),
    }
    println!();
}
