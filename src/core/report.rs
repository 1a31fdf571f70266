//! # Reporting
//!
//! Everything fonk prints about the commands it runs goes through a [`Reporter`].
//! Executors never write to the terminal themselves; they are handed a
//! [`SharedReporter`] and hold its lock for as long as one command's report takes,
//! which is what keeps concurrent reports from interleaving.
use colored::Colorize;
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

const RULE_WIDTH: usize = 72;

/// Which of a child's streams a chunk of captured output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// Receives the progress and results of a session.
pub trait Reporter: Send + fmt::Debug {
    /// Printed once when a session starts, unless quiet.
    fn header(&mut self);
    /// A command is about to run in the foreground.
    fn running(&mut self, name: &str, applied: &[String]);
    /// A command run in the background has finished.
    fn ran(&mut self, name: &str, applied: &[String]);
    /// The exact argument vector of the command being reported.
    fn command_line(&mut self, arguments: &[String]);
    /// Output captured from a command run in the background.
    fn output(&mut self, stream: Stream, text: &str);
    /// A command was killed after exceeding its deadline.
    fn timed_out(&mut self, name: &str, limit: Duration);
    /// The end-of-session summary.
    fn summary(&mut self, failed: &BTreeMap<String, i32>, quiet: bool);
}

/// A reporter shared by every task of a session.
pub type SharedReporter = Arc<Mutex<dyn Reporter>>;

/// Locks the reporter. A task that panicked mid-report leaves nothing worth
/// protecting, so a poisoned lock is simply taken over.
pub fn lock(reporter: &SharedReporter) -> MutexGuard<'_, dyn Reporter + 'static> {
    reporter.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wraps a reporter for sharing.
pub fn shared<R: Reporter + 'static>(reporter: R) -> SharedReporter {
    Arc::new(Mutex::new(reporter))
}

/// Joins flag names the way they are shown next to a command name.
fn applied_suffix(applied: &[String]) -> String {
    if applied.is_empty() {
        String::new()
    } else {
        format!(" ({})", applied.join(", "))
    }
}

/// Joins arguments into something that can be pasted back into a shell.
pub fn quote_arguments(arguments: &[String]) -> String {
    shlex::try_join(arguments.iter().map(String::as_str)).unwrap_or_else(|_| arguments.join(" "))
}

/// Centers `title` in a horizontal rule.
fn rule(title: &str) -> String {
    let title_width = title.chars().count() + 2;
    let side = RULE_WIDTH.saturating_sub(title_width) / 2;
    let line = "─".repeat(side);
    format!("{} {} {}", line, title, line)
}

// --- Console ---

/// Prints to the terminal with colors.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Creates a console reporter.
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn header(&mut self) {
        println!("{}", rule(t!("report.header")).red().bold());
    }

    fn running(&mut self, name: &str, applied: &[String]) {
        println!(
            "{} {}{}",
            t!("report.running").red().bold(),
            name.bold(),
            applied_suffix(applied).green()
        );
    }

    fn ran(&mut self, name: &str, applied: &[String]) {
        println!(
            "{} {}{}",
            t!("report.ran").red().bold(),
            name.bold(),
            applied_suffix(applied).green()
        );
    }

    fn command_line(&mut self, arguments: &[String]) {
        println!("{} {}", "⋙".bold(), quote_arguments(arguments).dimmed());
    }

    fn output(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => println!("{}", text),
            Stream::Stderr => eprintln!("{}", text),
        }
    }

    fn timed_out(&mut self, name: &str, limit: Duration) {
        println!(
            "{}",
            format!(
                t!("report.timed_out"),
                name = name,
                seconds = limit.as_secs_f64()
            )
            .yellow()
            .bold()
        );
    }

    fn summary(&mut self, failed: &BTreeMap<String, i32>, quiet: bool) {
        if failed.is_empty() {
            if !quiet {
                println!("{}", rule(t!("report.success")).green().bold());
            }
            return;
        }

        let lines: Vec<String> = failed
            .iter()
            .map(|(name, code)| format!(t!("report.failure_line"), name = name, code = code))
            .collect();
        let inner_width = lines
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(RULE_WIDTH.saturating_sub(4));

        let title = format!(" {} ", t!("report.failure_title"));
        let top_fill = (inner_width + 2).saturating_sub(title.chars().count());
        println!(
            "{}{}{}{}",
            "╭".red(),
            title.red().bold(),
            "─".repeat(top_fill).red(),
            "╮".red()
        );
        for line in &lines {
            let pad = inner_width.saturating_sub(line.chars().count());
            println!("{} {}{} {}", "│".red(), line, " ".repeat(pad), "│".red());
        }
        println!(
            "{}{}{}",
            "╰".red(),
            "─".repeat(inner_width + 2).red(),
            "╯".red()
        );
    }
}

// --- In memory ---

/// Records every report as plain text lines. Used to observe sessions without a terminal.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    /// Everything reported so far, one entry per line.
    pub lines: Vec<String>,
}

impl MemoryReporter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for MemoryReporter {
    fn header(&mut self) {
        self.lines.push("header".to_string());
    }

    fn running(&mut self, name: &str, applied: &[String]) {
        self.lines.push(format!("running {}{}", name, applied_suffix(applied)));
    }

    fn ran(&mut self, name: &str, applied: &[String]) {
        self.lines.push(format!("ran {}{}", name, applied_suffix(applied)));
    }

    fn command_line(&mut self, arguments: &[String]) {
        self.lines.push(format!("$ {}", quote_arguments(arguments)));
    }

    fn output(&mut self, stream: Stream, text: &str) {
        let prefix = match stream {
            Stream::Stdout => "out",
            Stream::Stderr => "err",
        };
        self.lines
            .extend(text.lines().map(|line| format!("{}: {}", prefix, line)));
    }

    fn timed_out(&mut self, name: &str, limit: Duration) {
        self.lines
            .push(format!("timed out {} after {}s", name, limit.as_secs_f64()));
    }

    fn summary(&mut self, failed: &BTreeMap<String, i32>, quiet: bool) {
        if failed.is_empty() {
            if !quiet {
                self.lines.push("success".to_string());
            }
            return;
        }
        self.lines.extend(
            failed
                .iter()
                .map(|(name, code)| format!("failed {} {}", name, code)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_arguments_escapes_spaces() {
        let args = vec!["echo".to_string(), "hello world".to_string()];
        assert_eq!(quote_arguments(&args), "echo 'hello world'");
    }

    #[test]
    fn test_rule_centers_title() {
        let line = rule("abc");
        assert!(line.contains(" abc "));
        assert!(line.starts_with('─'));
        assert!(line.ends_with('─'));
    }

    #[test]
    fn test_memory_reporter_records_in_order() {
        let memory = Arc::new(Mutex::new(MemoryReporter::new()));
        let reporter: SharedReporter = memory.clone();
        {
            let mut r = lock(&reporter);
            r.ran("lint", &["fix".to_string()]);
            r.output(Stream::Stdout, "one\ntwo");
            r.output(Stream::Stderr, "oops");
            r.summary(&BTreeMap::from([("lint".to_string(), 2)]), false);
        }
        let recorded = memory.lock().unwrap();
        assert_eq!(
            recorded.lines,
            vec!["ran lint (fix)", "out: one", "out: two", "err: oops", "failed lint 2"]
        );
    }

    #[test]
    fn test_quiet_success_summary_is_silent() {
        let mut memory = MemoryReporter::new();
        memory.summary(&BTreeMap::new(), true);
        assert!(memory.lines.is_empty());
        memory.summary(&BTreeMap::new(), false);
        assert_eq!(memory.lines, vec!["success"]);
    }
}
