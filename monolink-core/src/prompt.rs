//! User confirmation as an injected capability.

use std::sync::Mutex;

use crate::error::Result;

/// Asks the user questions.
pub trait Prompt: Send + Sync {
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Returns the index of the chosen entry of `choices`.
    fn select(&self, message: &str, choices: &[String], default: usize) -> Result<usize>;
}

/// Answers every question with fixed values and remembers what was asked.
#[derive(Debug)]
pub struct FixedPrompt {
    confirm: bool,
    select: Option<usize>,
    asked: Mutex<Vec<String>>,
}

impl FixedPrompt {
    pub fn new(confirm: bool, select: Option<usize>) -> Self {
        Self {
            confirm,
            select,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Confirms everything and takes the default choice.
    pub fn yes() -> Self {
        Self::new(true, None)
    }

    pub fn no() -> Self {
        Self::new(false, None)
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }

    fn remember(&self, message: &str) {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
    }
}

impl Prompt for FixedPrompt {
    fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
        self.remember(message);
        Ok(self.confirm)
    }

    fn select(&self, message: &str, choices: &[String], default: usize) -> Result<usize> {
        self.remember(message);
        let idx = self.select.unwrap_or(default);
        Ok(idx.min(choices.len().saturating_sub(1)))
    }
}
