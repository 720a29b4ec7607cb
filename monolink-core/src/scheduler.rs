//! Bounded-concurrency execution of per-package jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use glob::Pattern;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::package::{Package, Workspace};
use crate::runner::{CommandOutput, CommandRunner, ExecOptions};

/// Delay between scans for a launchable job.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCommand {
    Shell(String),
    /// Completes immediately. Keeps a package's slot in tree mode.
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    Done,
}

/// A command to run in a package directory.
#[derive(Debug, Clone)]
pub struct Job {
    pub package: String,
    pub cwd: PathBuf,
    pub command: JobCommand,
    status: JobStatus,
}

impl Job {
    pub fn new(package: impl Into<String>, cwd: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            cwd: cwd.into(),
            command: JobCommand::Shell(command.into()),
            status: JobStatus::Idle,
        }
    }

    pub fn placeholder(package: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            cwd: cwd.into(),
            command: JobCommand::Placeholder,
            status: JobStatus::Idle,
        }
    }

    #[inline]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn command_line(&self) -> &str {
        match &self.command {
            JobCommand::Shell(cmd) => cmd,
            JobCommand::Placeholder => "",
        }
    }

    // Status only moves forward: idle -> running -> done.
    fn advance(&mut self, to: JobStatus) {
        debug_assert!(
            matches!(
                (self.status, to),
                (JobStatus::Idle, JobStatus::Running) | (JobStatus::Running, JobStatus::Done)
            ),
            "invalid job transition {:?} -> {:?}",
            self.status,
            to
        );
        self.status = to;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    pub mode: ExecutionMode,
    /// Maximum number of running jobs; unbounded when `None`.
    pub limit: Option<usize>,
    /// Do not start a job before the jobs of its direct dependencies finish.
    pub tree: bool,
    /// Mark failing jobs done instead of failing the run.
    pub ignore_errors: bool,
}

/// Observes job status transitions.
pub trait JobReporter: Send + Sync {
    fn on_start(&self, job: &Job, running: usize);
    fn on_finish(&self, job: &Job, ok: bool, running: usize);
}

/// Logs transitions at debug level.
#[derive(Debug, Default)]
pub struct TracingJobReporter;

impl JobReporter for TracingJobReporter {
    fn on_start(&self, job: &Job, running: usize) {
        debug!("[{}] started '{}' ({} running)", job.package, job.command_line(), running);
    }

    fn on_finish(&self, job: &Job, ok: bool, running: usize) {
        debug!(
            "[{}] finished '{}' ok={} ({} running)",
            job.package,
            job.command_line(),
            ok,
            running
        );
    }
}

/// Creates one job per command, in `order`.
///
/// In tree mode a package without commands still gets a placeholder so the
/// ordering of its dependents is preserved.
pub fn plan_jobs<F>(workspace: &Workspace, order: &[String], tree: bool, mut create: F) -> Vec<Job>
where
    F: FnMut(&Package) -> Vec<String>,
{
    let mut jobs = Vec::new();
    for name in order {
        let Some(package) = workspace.get(name) else {
            continue;
        };
        let cwd = workspace.package_dir(package);
        let commands = create(package);
        if commands.is_empty() && tree {
            jobs.push(Job::placeholder(name.clone(), cwd));
            continue;
        }
        for command in commands {
            jobs.push(Job::new(name.clone(), cwd.clone(), command));
        }
    }
    jobs
}

/// `yarn run <script>` for every script of `package` matching `pattern`.
pub fn script_commands(package: &Package, pattern: &Pattern) -> Vec<String> {
    package
        .manifest
        .script_names()
        .into_iter()
        .filter(|script| pattern.matches(script))
        .map(|script| format!("yarn run {}", script))
        .collect()
}

/// Runs jobs serially or with bounded parallelism.
pub struct JobScheduler {
    runner: Arc<dyn CommandRunner>,
    graph: Option<Arc<DependencyGraph>>,
    options: SchedulerOptions,
    reporter: Arc<dyn JobReporter>,
}

type Joined = std::result::Result<(usize, Result<CommandOutput>), tokio::task::JoinError>;

impl JobScheduler {
    pub fn new(runner: Arc<dyn CommandRunner>, options: SchedulerOptions) -> Self {
        Self {
            runner,
            graph: None,
            options,
            reporter: Arc::new(TracingJobReporter),
        }
    }

    /// Graph consulted in tree mode.
    pub fn with_graph(mut self, graph: Arc<DependencyGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn JobReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Runs all jobs and returns them with their final status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduling`] wrapping the first non-ignored job
    /// failure. In parallel mode, jobs already running are awaited first and
    /// a failure carrying subprocess output is preferred.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<Vec<Job>> {
        if self.options.limit == Some(0) {
            return Err(Error::Validation(
                "Parallel limit must be at least 1".to_string(),
            ));
        }
        if self.options.tree && self.graph.is_none() {
            return Err(Error::Validation(
                "Tree mode requires a dependency graph".to_string(),
            ));
        }
        match self.options.mode {
            ExecutionMode::Serial => self.run_serial(jobs).await,
            ExecutionMode::Parallel => self.run_parallel(jobs).await,
        }
    }

    async fn run_serial(&self, mut jobs: Vec<Job>) -> Result<Vec<Job>> {
        for idx in 0..jobs.len() {
            jobs[idx].advance(JobStatus::Running);
            self.reporter.on_start(&jobs[idx], 1);
            let result = match jobs[idx].command.clone() {
                JobCommand::Placeholder => Ok(CommandOutput::default()),
                JobCommand::Shell(cmd) => {
                    self.runner.execute(&cmd, &self.exec_options(&jobs[idx])).await
                }
            };
            jobs[idx].advance(JobStatus::Done);
            self.reporter.on_finish(&jobs[idx], result.is_ok(), 0);

            if let Err(e) = result {
                if self.options.ignore_errors {
                    warn!("[{}] ignoring failure: {}", jobs[idx].package, e);
                    continue;
                }
                return Err(Error::Scheduling {
                    package: jobs[idx].package.clone(),
                    source: Box::new(e),
                });
            }
        }
        Ok(jobs)
    }

    async fn run_parallel(&self, mut jobs: Vec<Job>) -> Result<Vec<Job>> {
        let limit = self.options.limit.unwrap_or(usize::MAX);
        let mut in_flight: JoinSet<(usize, Result<CommandOutput>)> = JoinSet::new();
        let mut running = 0usize;
        let mut failure: Option<Error> = None;

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                self.settle(&mut jobs, joined, &mut running, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            match self.next_job(&jobs) {
                Some(idx) if running < limit => {
                    jobs[idx].advance(JobStatus::Running);
                    running += 1;
                    self.reporter.on_start(&jobs[idx], running);

                    match jobs[idx].command.clone() {
                        JobCommand::Placeholder => {
                            jobs[idx].advance(JobStatus::Done);
                            running -= 1;
                            self.reporter.on_finish(&jobs[idx], true, running);
                        }
                        JobCommand::Shell(cmd) => {
                            let runner = Arc::clone(&self.runner);
                            let opts = self.exec_options(&jobs[idx]);
                            in_flight.spawn(async move { (idx, runner.execute(&cmd, &opts).await) });
                        }
                    }
                }
                _ => {
                    if !jobs.iter().any(|j| j.status == JobStatus::Idle) {
                        break;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            self.settle(&mut jobs, joined, &mut running, &mut failure);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(jobs),
        }
    }

    /// First idle job that may start now.
    ///
    /// In tree mode a job waits for every earlier, unfinished job of a
    /// package it directly depends on.
    fn next_job(&self, jobs: &[Job]) -> Option<usize> {
        let graph = self.graph.as_deref().filter(|_| self.options.tree);
        jobs.iter().enumerate().position(|(idx, job)| {
            if job.status != JobStatus::Idle {
                return false;
            }
            let Some(graph) = graph else {
                return true;
            };
            !jobs[..idx]
                .iter()
                .any(|prev| prev.status != JobStatus::Done && graph.depends_on(&job.package, &prev.package))
        })
    }

    fn settle(&self, jobs: &mut [Job], joined: Joined, running: &mut usize, failure: &mut Option<Error>) {
        let (idx, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                *running = running.saturating_sub(1);
                record_failure(
                    failure,
                    Error::Scheduling {
                        package: "unknown".to_string(),
                        source: Box::new(Error::Io(std::io::Error::other(e.to_string()))),
                    },
                );
                return;
            }
        };

        jobs[idx].advance(JobStatus::Done);
        *running = running.saturating_sub(1);
        self.reporter.on_finish(&jobs[idx], result.is_ok(), *running);

        if let Err(e) = result {
            if self.options.ignore_errors {
                warn!("[{}] ignoring failure: {}", jobs[idx].package, e);
                return;
            }
            record_failure(
                failure,
                Error::Scheduling {
                    package: jobs[idx].package.clone(),
                    source: Box::new(e),
                },
            );
        }
    }

    fn exec_options(&self, job: &Job) -> ExecOptions {
        ExecOptions::new(&job.cwd).with_label(format!("[{}]", job.package))
    }
}

fn record_failure(slot: &mut Option<Error>, error: Error) {
    let replace = match slot {
        None => true,
        Some(existing) => !existing.has_captured_output() && error.has_captured_output(),
    };
    if replace {
        *slot = Some(error);
    }
}
