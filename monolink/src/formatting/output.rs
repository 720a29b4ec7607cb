use owo_colors::OwoColorize;

/// Outcome marker printed in front of progress and summary lines.
#[derive(Debug, Clone, Copy)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
}

impl Status {
    pub fn colored_symbol(&self) -> String {
        match self {
            Status::Success => "✓".green().to_string(),
            Status::Error => "✗".red().to_string(),
            Status::Warning => "⚠".yellow().to_string(),
            Status::Info => "→".cyan().to_string(),
        }
    }
}

/// Prints `[title]` in bold cyan followed by a blank line.
pub fn print_section_header(title: &str) {
    println!("{}", format!("[{}]", title).cyan().bold());
    println!();
}

pub fn print_success(message: &str) {
    println!("  {} {}", Status::Success.colored_symbol(), message.green().bold());
}

pub fn print_warning(message: &str) {
    println!("  {} {}", Status::Warning.colored_symbol(), message.yellow().bold());
}

pub fn print_key_value(key: &str, value: &str) {
    println!("  {} {}", key.bright_black().bold(), value.bold().white());
}

/// Release summary: a titled frame with one `key value` line per item.
pub fn print_summary_box(title: &str, items: &[(&str, String)]) {
    println!("┌─ {} {}", title.cyan().bold(), "─".repeat(50).bright_black());
    for (key, value) in items {
        println!("│ {} {}", key.bright_black().bold(), value.bold().white());
    }
    println!("└{}", "─".repeat(60).bright_black());
}

/// `850ms`, `2.31s` or `1m 4.2s`.
pub fn format_duration(seconds: f64) -> String {
    match seconds {
        s if s < 1.0 => format!("{:.0}ms", s * 1000.0),
        s if s < 60.0 => format!("{:.2}s", s),
        s => format!("{}m {:.1}s", (s / 60.0) as u64, s % 60.0),
    }
}
