use std::sync::Arc;

use glob::Pattern;
use tracing::warn;

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::package::Package;
use crate::scheduler::{
    plan_jobs, script_commands, ExecutionMode, Job, JobReporter, JobScheduler, SchedulerOptions,
};

use super::OpContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub parallel: bool,
    pub parallel_limit: Option<usize>,
    pub tree: bool,
    pub ignore_errors: bool,
}

impl RunOptions {
    fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            mode: if self.parallel {
                ExecutionMode::Parallel
            } else {
                ExecutionMode::Serial
            },
            limit: self.parallel_limit,
            tree: self.tree,
            ignore_errors: self.ignore_errors,
        }
    }
}

/// Runs a shell command in every sub-package.
pub async fn all(
    ctx: &OpContext,
    command: &str,
    opts: &RunOptions,
    reporter: Arc<dyn JobReporter>,
) -> Result<Vec<Job>> {
    run_jobs(ctx, opts, reporter, |_| vec![command.to_string()]).await
}

/// Runs every script matching `pattern` in every sub-package.
pub async fn run_script(
    ctx: &OpContext,
    pattern: &str,
    opts: &RunOptions,
    reporter: Arc<dyn JobReporter>,
) -> Result<Vec<Job>> {
    let pattern = Pattern::new(pattern)?;
    run_jobs(ctx, opts, reporter, |package| script_commands(package, &pattern)).await
}

async fn run_jobs<F>(
    ctx: &OpContext,
    opts: &RunOptions,
    reporter: Arc<dyn JobReporter>,
    create: F,
) -> Result<Vec<Job>>
where
    F: FnMut(&Package) -> Vec<String>,
{
    let workspace = ctx.workspace(false)?;
    let graph = Arc::new(DependencyGraph::new(&workspace));
    for cycle in graph.cycles() {
        warn!("Dependency cycle between: {}", cycle.join(", "));
    }

    let order = if opts.tree {
        graph.traversal_order().to_vec()
    } else {
        workspace.names()
    };
    let jobs = plan_jobs(&workspace, &order, opts.tree, create);

    JobScheduler::new(ctx.runner.clone(), opts.scheduler_options())
        .with_graph(graph)
        .with_reporter(reporter)
        .run(jobs)
        .await
}
