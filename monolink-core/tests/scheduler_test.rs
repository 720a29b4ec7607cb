mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::RecordingRunner;
use glob::Pattern;
use monolink_core::error::{Error, Result};
use monolink_core::graph::DependencyGraph;
use monolink_core::package::{Manifest, Package, Workspace};
use monolink_core::runner::{CommandOutput, CommandRunner, ExecOptions};
use monolink_core::scheduler::{
    plan_jobs, script_commands, ExecutionMode, Job, JobCommand, JobReporter, JobScheduler,
    JobStatus, SchedulerOptions,
};
use serde_json::json;

fn chain_workspace() -> Workspace {
    let package = |name: &str, manifest: serde_json::Value| {
        Package::new(name, format!("packages/{}", name), Manifest::from_value(manifest).unwrap())
    };
    Workspace::new(
        "/repo",
        vec![
            package("a", json!({ "name": "a", "dependencies": { "b": "*" } })),
            package("b", json!({ "name": "b", "dependencies": { "c": "*" } })),
            package(
                "c",
                json!({ "name": "c", "scripts": { "build": "tsc", "build:docs": "typedoc", "test": "jest" } }),
            ),
        ],
        None,
    )
    .unwrap()
}

fn parallel(limit: Option<usize>) -> SchedulerOptions {
    SchedulerOptions {
        mode: ExecutionMode::Parallel,
        limit,
        ..SchedulerOptions::default()
    }
}

fn jobs(names: &[&str]) -> Vec<Job> {
    names
        .iter()
        .map(|name| Job::new(*name, "/repo", format!("build {}", name)))
        .collect()
}

#[derive(Default)]
struct CountingReporter {
    events: Mutex<Vec<String>>,
}

impl JobReporter for CountingReporter {
    fn on_start(&self, job: &Job, _running: usize) {
        self.events.lock().unwrap().push(format!("start {}", job.package));
    }

    fn on_finish(&self, job: &Job, ok: bool, _running: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finish {} {}", job.package, ok));
    }
}

/// `build a` fails at once without output; `build b` fails later with stderr.
struct StaggeredFailures;

#[async_trait]
impl CommandRunner for StaggeredFailures {
    async fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandOutput> {
        let stderr = if command == "build b" {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "src/index.ts(3,1): error TS2304".to_string()
        } else {
            String::new()
        };
        Err(Error::ExternalTool {
            command: command.to_string(),
            cwd: opts.cwd.clone(),
            code: Some(2),
            stdout: String::new(),
            stderr,
        })
    }
}

#[tokio::test]
async fn test_serial_runs_in_order() {
    let runner = Arc::new(RecordingRunner::new());
    let scheduler = JobScheduler::new(runner.clone(), SchedulerOptions::default());

    let done = scheduler.run(jobs(&["a", "b", "c"])).await.unwrap();

    assert_eq!(runner.commands(), vec!["build a", "build b", "build c"]);
    assert!(done.iter().all(|job| job.status() == JobStatus::Done));
}

#[tokio::test]
async fn test_serial_failure_stops_remaining_jobs() {
    let runner = Arc::new(RecordingRunner::new());
    runner.fail_on("build b");
    let scheduler = JobScheduler::new(runner.clone(), SchedulerOptions::default());

    let err = scheduler.run(jobs(&["a", "b", "c"])).await.unwrap_err();

    match err {
        Error::Scheduling { package, source } => {
            assert_eq!(package, "b");
            assert!(matches!(*source, Error::ExternalTool { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(runner.commands(), vec!["build a", "build b"]);
}

#[tokio::test]
async fn test_ignore_errors_runs_everything() {
    let runner = Arc::new(RecordingRunner::new());
    runner.fail_on("build a");
    let options = SchedulerOptions {
        ignore_errors: true,
        ..parallel(Some(2))
    };
    let scheduler = JobScheduler::new(runner.clone(), options);

    let done = scheduler.run(jobs(&["a", "b", "c"])).await.unwrap();

    assert_eq!(runner.commands().len(), 3);
    assert!(done.iter().all(|job| job.status() == JobStatus::Done));
}

#[tokio::test]
async fn test_parallel_respects_limit() {
    let runner = Arc::new(RecordingRunner::with_delay(Duration::from_millis(30)));
    let scheduler = JobScheduler::new(runner.clone(), parallel(Some(2)));

    let done = scheduler
        .run(jobs(&["a", "b", "c", "d", "e", "f"]))
        .await
        .unwrap();

    assert_eq!(done.len(), 6);
    assert_eq!(runner.commands().len(), 6);
    assert!(runner.max_running() <= 2);
    assert!(runner.max_running() >= 1);
}

#[tokio::test]
async fn test_parallel_failure_stops_launching() {
    let runner = Arc::new(RecordingRunner::new());
    runner.fail_on("build a");
    let scheduler = JobScheduler::new(runner.clone(), parallel(Some(1)));

    let err = scheduler.run(jobs(&["a", "b", "c"])).await.unwrap_err();

    assert!(matches!(err, Error::Scheduling { ref package, .. } if package == "a"));
    assert_eq!(runner.commands(), vec!["build a"]);
}

#[tokio::test]
async fn test_tree_mode_waits_for_dependencies() {
    let workspace = chain_workspace();
    let graph = Arc::new(DependencyGraph::new(&workspace));
    assert_eq!(graph.traversal_order(), &["c", "b", "a"]);

    let runner = Arc::new(RecordingRunner::with_delay(Duration::from_millis(10)));
    let options = SchedulerOptions {
        tree: true,
        ..parallel(None)
    };
    let scheduler = JobScheduler::new(runner.clone(), options).with_graph(graph.clone());

    let order: Vec<&str> = graph.traversal_order().iter().map(String::as_str).collect();
    scheduler.run(jobs(&order)).await.unwrap();

    assert_eq!(runner.commands(), vec!["build c", "build b", "build a"]);
    assert_eq!(runner.max_running(), 1);
}

#[tokio::test]
async fn test_tree_mode_placeholders_keep_ordering() {
    let workspace = chain_workspace();
    let graph = Arc::new(DependencyGraph::new(&workspace));
    let planned = plan_jobs(&workspace, graph.traversal_order(), true, |package| {
        if package.name == "b" {
            Vec::new()
        } else {
            vec![format!("build {}", package.name)]
        }
    });
    assert_eq!(planned.len(), 3);
    assert_eq!(planned[1].command, JobCommand::Placeholder);
    assert_eq!(planned[1].cwd, workspace.root.join("packages/b"));

    let runner = Arc::new(RecordingRunner::new());
    let reporter = Arc::new(CountingReporter::default());
    let options = SchedulerOptions {
        tree: true,
        ..parallel(Some(4))
    };
    let done = JobScheduler::new(runner.clone(), options)
        .with_graph(graph)
        .with_reporter(reporter.clone())
        .run(planned)
        .await
        .unwrap();

    assert!(done.iter().all(|job| job.status() == JobStatus::Done));
    assert_eq!(runner.commands(), vec!["build c", "build a"]);
    let events = reporter.events.lock().unwrap().clone();
    assert!(events.contains(&"start b".to_string()));
    assert!(events.contains(&"finish b true".to_string()));
}

#[test]
fn test_plan_jobs_without_tree_skips_empty_packages() {
    let workspace = chain_workspace();
    let pattern = Pattern::new("build*").unwrap();
    let planned = plan_jobs(&workspace, &workspace.names(), false, |package| {
        script_commands(package, &pattern)
    });

    let commands: Vec<&str> = planned.iter().map(Job::command_line).collect();
    assert_eq!(commands, vec!["yarn run build", "yarn run build:docs"]);
    assert!(planned.iter().all(|job| job.package == "c"));
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let runner = Arc::new(RecordingRunner::new());

    let zero_limit = JobScheduler::new(runner.clone(), parallel(Some(0)));
    assert!(matches!(
        zero_limit.run(jobs(&["a"])).await,
        Err(Error::Validation(_))
    ));

    let tree_without_graph = JobScheduler::new(
        runner.clone(),
        SchedulerOptions {
            tree: true,
            ..parallel(None)
        },
    );
    assert!(matches!(
        tree_without_graph.run(jobs(&["a"])).await,
        Err(Error::Validation(_))
    ));
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_empty_job_list() {
    let runner = Arc::new(RecordingRunner::new());
    let done = JobScheduler::new(runner, parallel(None))
        .run(Vec::new())
        .await
        .unwrap();
    assert!(done.is_empty());
}

#[tokio::test]
async fn test_parallel_failure_waits_for_running_jobs_and_keeps_captured_output() {
    let reporter = Arc::new(CountingReporter::default());
    let scheduler =
        JobScheduler::new(Arc::new(StaggeredFailures), parallel(None)).with_reporter(reporter.clone());

    let err = scheduler.run(jobs(&["a", "b"])).await.unwrap_err();

    let events = reporter.events.lock().unwrap().clone();
    assert!(events.contains(&"finish a false".to_string()));
    assert!(events.contains(&"finish b false".to_string()));
    match err {
        Error::Scheduling { package, source } => {
            assert_eq!(package, "b");
            assert!(matches!(*source, Error::ExternalTool { ref stderr, .. } if stderr.contains("TS2304")));
        }
        other => panic!("unexpected error: {other}"),
    }
}
