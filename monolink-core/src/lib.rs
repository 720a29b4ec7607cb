//! Core library for JavaScript monorepo management.

pub mod config;
pub mod error;
pub mod graph;
pub mod ops;
pub mod package;
pub mod prompt;
pub mod release;
pub mod release_reporter;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod transaction;
pub mod vcs;

pub use config::{BumpDependents, PublishConfig, WorkspaceConfig, WorkspaceOptions};
pub use error::{Error, PreconditionKind, Result};
pub use graph::DependencyGraph;
pub use package::{DepType, LinkMatcher, Manifest, Package, Workspace, ROOT_PACKAGE};
pub use prompt::{FixedPrompt, Prompt};
pub use release::{
    calc_next_version, IncrementBy, PublishOptions, ReleaseCandidate, ReleaseEngine,
    ReleaseOutcome,
};
pub use release_reporter::{ReleaseReporter, SilentReporter};
pub use runner::{CommandOutput, CommandRunner, ExecOptions, ShellRunner};
pub use scheduler::{
    ExecutionMode, Job, JobCommand, JobReporter, JobScheduler, JobStatus, SchedulerOptions,
};
pub use store::ManifestStore;
pub use transaction::{run_in_transaction, ManifestTransaction, MutationRecord};
pub use vcs::{GitCli, Vcs};
