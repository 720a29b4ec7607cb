//! Error types and result aliases.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Release precondition that was not met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionKind {
    /// Releases are only cut from `master` or `main`.
    WrongBranch(String),
    /// The working tree has uncommitted changes.
    Uncommitted(String),
    /// The remote has commits that were not pulled yet.
    Unpulled(String),
}

impl fmt::Display for PreconditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionKind::WrongBranch(branch) => {
                write!(f, "can't publish from current branch: {}", branch)
            }
            PreconditionKind::Uncommitted(changes) => write!(
                f,
                "can't publish with uncommitted changes (stash/commit them):\n{}",
                changes
            ),
            PreconditionKind::Unpulled(count) => {
                write!(f, "remote history differs ({} unpulled commits), please pull changes", count)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Invalid link pattern: {0}")]
    LinkPattern(#[from] regex::Error),

    #[error("Could not read manifest at {path}: {message}")]
    ManifestRead { path: PathBuf, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No such package: {name}. Available packages: {available}")]
    PackageNotFound { name: String, available: String },

    #[error("{}", format_external_tool(.command, .cwd, .code, .stderr))]
    ExternalTool {
        command: String,
        cwd: PathBuf,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Precondition failed: {0}")]
    Precondition(PreconditionKind),

    #[error("Job for {package} failed: {source}")]
    Scheduling {
        package: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Manifest {0} already has an open transaction")]
    TransactionConflict(PathBuf),
}

fn format_external_tool(command: &str, cwd: &Path, code: &Option<i32>, stderr: &str) -> String {
    let mut msg = match code {
        Some(code) => format!("Command '{}' failed [{}] at {}", command, code, cwd.display()),
        None => format!("Command '{}' failed at {}", command, cwd.display()),
    };
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        msg.push('\n');
        msg.push_str(stderr);
    }
    msg
}

impl Error {
    /// Whether this failure carries output captured from a subprocess.
    ///
    /// Used by the scheduler to pick the most informative of several
    /// failures.
    pub fn has_captured_output(&self) -> bool {
        match self {
            Error::ExternalTool { stdout, stderr, .. } => {
                !stdout.trim().is_empty() || !stderr.trim().is_empty()
            }
            Error::Scheduling { source, .. } => source.has_captured_output(),
            _ => false,
        }
    }

    /// Whether this error aborts an operation before anything was mutated.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::PackageNotFound { .. } | Error::ManifestRead { .. }
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "monolink.toml".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
