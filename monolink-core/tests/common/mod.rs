#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use monolink_core::config::WorkspaceOptions;
use monolink_core::error::{Error, Result};
use monolink_core::ops::OpContext;
use monolink_core::prompt::{FixedPrompt, Prompt};
use monolink_core::runner::{CommandOutput, CommandRunner, ExecOptions};
use monolink_core::vcs::{Vcs, CHANGED_SENTINEL};
use serde_json::Value;
use tempfile::TempDir;

/// Writes `packages/<name>/package.json` (or the root manifest for `.`).
pub fn write_manifest(root: &Path, dir: &str, manifest: Value) {
    let dir = root.join(dir);
    std::fs::create_dir_all(&dir).expect("Should create package directory");
    let mut content = serde_json::to_string_pretty(&manifest).expect("Should serialize manifest");
    content.push('\n');
    std::fs::write(dir.join("package.json"), content).expect("Should write package.json");
}

pub fn read_manifest(root: &Path, dir: &str) -> Value {
    let content =
        std::fs::read_to_string(root.join(dir).join("package.json")).expect("Should read package.json");
    serde_json::from_str(&content).expect("Should parse package.json")
}

pub fn read_raw(root: &Path, dir: &str) -> Vec<u8> {
    std::fs::read(root.join(dir).join("package.json")).expect("Should read package.json")
}

type Hook = Box<dyn Fn(&str, &Path) + Send + Sync>;

/// Records every command instead of running it.
///
/// Commands containing a registered failure marker fail with captured
/// stderr. A hook may touch the filesystem to simulate the tool.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(String, PathBuf)>>,
    failures: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, String>>,
    hook: Mutex<Option<Hook>>,
    delay: Option<Duration>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_on(&self, marker: &str) {
        self.failures.lock().unwrap().push(marker.to_string());
    }

    pub fn respond(&self, command: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), stdout.to_string());
    }

    pub fn on_command(&self, hook: impl Fn(&str, &Path) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), opts.cwd.clone()));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(command, &opts.cwd);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|marker| command.contains(marker.as_str()));
        if failing && !opts.tolerate_failure {
            return Err(Error::ExternalTool {
                command: command.to_string(),
                cwd: opts.cwd.clone(),
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{} failed", command),
            });
        }
        let stdout = self
            .responses
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default();
        Ok(CommandOutput {
            code: Some(if failing { 1 } else { 0 }),
            stdout,
            stderr: String::new(),
        })
    }
}

/// In-memory repository state.
pub struct FakeVcs {
    pub tag: Option<String>,
    pub branch: String,
    pub uncommitted: String,
    pub unpulled: u32,
    /// Diff output per package path; missing paths have no changes.
    pub diffs: HashMap<PathBuf, String>,
    pub log: Mutex<Vec<String>>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self {
            tag: None,
            branch: "master".to_string(),
            uncommitted: String::new(),
            unpulled: 0,
            diffs: HashMap::new(),
            log: Mutex::new(Vec::new()),
        }
    }
}

impl FakeVcs {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn last_release_tag(&self) -> Option<String> {
        self.tag.clone()
    }

    async fn diff_since(&self, tag: Option<&str>, path: &Path) -> Result<String> {
        if tag.is_none() {
            return Ok(CHANGED_SENTINEL.to_string());
        }
        Ok(self.diffs.get(path).cloned().unwrap_or_default())
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    async fn uncommitted_changes(&self) -> Result<String> {
        Ok(self.uncommitted.clone())
    }

    async fn unpulled_commit_count(&self) -> Result<u32> {
        Ok(self.unpulled)
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("commit {}", message));
        Ok(())
    }

    async fn tag(&self, name: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("tag {}", name));
        Ok(())
    }

    async fn push_with_tags(&self) -> Result<()> {
        self.log.lock().unwrap().push("push".to_string());
        Ok(())
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub runner: Arc<RecordingRunner>,
    pub vcs: Arc<FakeVcs>,
    pub prompt: Arc<FixedPrompt>,
}

impl Fixture {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn context(&self, options: WorkspaceOptions) -> OpContext {
        let prompt: Arc<dyn Prompt> = self.prompt.clone();
        OpContext::new(
            self.dir.path(),
            options,
            self.runner.clone(),
            self.vcs.clone(),
            prompt,
        )
    }
}

pub fn fixture(vcs: FakeVcs, prompt: FixedPrompt) -> Fixture {
    Fixture {
        dir: TempDir::new().expect("Should create temp directory"),
        runner: Arc::new(RecordingRunner::new()),
        vcs: Arc::new(vcs),
        prompt: Arc::new(prompt),
    }
}
