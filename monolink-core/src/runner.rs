//! Shell command execution with streamed, captured output.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

/// Options for a single command invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory of the command.
    pub cwd: PathBuf,
    /// Return the output instead of an error on a non-zero exit.
    pub tolerate_failure: bool,
    /// Prefix for streamed output lines. Unlabelled output is only traced.
    pub label: Option<String>,
}

impl ExecOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn tolerating_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs shell command strings on behalf of the core.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalTool`] if the command cannot be spawned, or
    /// exits non-zero and `opts.tolerate_failure` is not set.
    async fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandOutput> {
        debug!("Executing '{}' at {}", command, opts.cwd.display());

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&opts.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool {
                command: command.to_string(),
                cwd: opts.cwd.clone(),
                code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn: {}", e),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let label = opts.label.as_deref();
        let (stdout, stderr, status) = tokio::join!(
            collect_lines(stdout, label),
            collect_lines(stderr, label),
            child.wait()
        );
        let output = CommandOutput {
            code: status?.code(),
            stdout,
            stderr,
        };

        if !output.success() && !opts.tolerate_failure {
            return Err(Error::ExternalTool {
                command: command.to_string(),
                cwd: opts.cwd.clone(),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

// Reads to EOF so the child never sees a closed pipe. Lines that are not
// valid UTF-8 are decoded lossily.
async fn collect_lines<R>(reader: Option<R>, label: Option<&str>) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Stopped reading command output: {}", e);
                break;
            }
        }
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        match label {
            Some(label) => info!("{} {}", label, line),
            None => trace!("{}", line),
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

/// Quotes an argument for `sh`.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./@^~=:+,".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}
