//! Interactive confirmations on the terminal.

use std::io::{self, BufRead, Write};

use monolink_core::error::Result;
use monolink_core::prompt::Prompt;
use owo_colors::OwoColorize;

/// Reads answers from stdin.
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line(&self) -> Result<String> {
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        print!("{} {} {} ", "?".green().bold(), message.bold(), hint.bright_black());
        let answer = self.read_line()?.to_lowercase();
        Ok(match answer.as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }

    fn select(&self, message: &str, choices: &[String], default: usize) -> Result<usize> {
        println!("{} {}", "?".green().bold(), message.bold());
        for (idx, choice) in choices.iter().enumerate() {
            let marker = if idx == default { ">" } else { " " };
            println!("  {} {}) {}", marker.cyan(), idx + 1, choice);
        }
        loop {
            print!("  {} ", format!("Choice [{}]:", default + 1).bright_black());
            let answer = self.read_line()?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(n - 1),
                _ => println!("  {}", "Please enter one of the listed numbers".yellow()),
            }
        }
    }
}
