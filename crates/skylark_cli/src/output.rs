//! Terminal output helpers shared by every command.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;

/// Consistent formatting for command output.
///
/// Regular output goes to stdout; errors and warnings go to stderr so that
/// piping a timeline somewhere keeps only the content.
#[derive(Debug, Default, Clone, Copy)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    /// Bold heading followed by a rule.
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", title.bold().bright_blue());
        println!("{}", "─".repeat(title.chars().count().clamp(8, 60)).dimmed());
    }

    pub fn status(&self, message: &str) {
        println!("  {}", message.dimmed());
    }

    pub fn print(&self, message: &str) {
        println!("{message}");
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".bright_green(), message);
    }

    /// Labelled value, label first.
    pub fn info(&self, label: &str, value: &str) {
        println!("  {} {}", label.bright_cyan(), value);
    }

    pub fn kv(&self, key: &str, value: &str) {
        println!("  {:<14} {}", format!("{key}:").dimmed(), value);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".bright_red(), message.bright_red());
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", "!".yellow(), message.yellow());
    }

    pub fn list_item(&self, message: &str) {
        println!("  {} {}", "•".dimmed(), message);
    }
}

/// "3 minutes ago", "in 2 hours", falling back to a date past a week.
pub fn format_relative_time(time: DateTime<Utc>) -> String {
    format_relative_to(time, Utc::now())
}

fn format_relative_to(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(time);
    let (seconds, future) = if delta.num_seconds() < 0 {
        (-delta.num_seconds(), true)
    } else {
        (delta.num_seconds(), false)
    };

    let amount = match seconds {
        0..=59 => return "just now".to_string(),
        60..=3_599 => plural(seconds / 60, "minute"),
        3_600..=86_399 => plural(seconds / 3_600, "hour"),
        86_400..=604_799 => plural(seconds / 86_400, "day"),
        _ => return time.format("%Y-%m-%d").to_string(),
    };

    if future {
        format!("in {amount}")
    } else {
        format!("{amount} ago")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
