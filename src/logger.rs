//! Run output
//!
//! The executor reports progress through the [`Logger`] trait so that run
//! output can go to the terminal, a file or a test double.

use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::Script;

/// One line of subprocess output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub text: String,
    /// Line was written to stderr
    pub is_error: bool,
}

impl LogMessage {
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Sink for script run progress
pub trait Logger {
    fn start_script(&mut self, script: &Script);

    fn finish_script(&mut self, script: &Script);

    /// A step begins; `index` is 0-based out of `max` steps
    fn log_start(
        &mut self,
        headline: &str,
        subject: &str,
        line: usize,
        ignore_error: bool,
        index: usize,
        max: usize,
    );

    /// The current step is running and has produced no output yet
    fn log_wait(&mut self);

    fn log(&mut self, message: LogMessage);

    fn log_success(&mut self);

    fn log_failure(&mut self);

    fn warn(&mut self, message: &str);
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn start_script(&mut self, script: &Script) {
        (**self).start_script(script)
    }

    fn finish_script(&mut self, script: &Script) {
        (**self).finish_script(script)
    }

    fn log_start(
        &mut self,
        headline: &str,
        subject: &str,
        line: usize,
        ignore_error: bool,
        index: usize,
        max: usize,
    ) {
        (**self).log_start(headline, subject, line, ignore_error, index, max)
    }

    fn log_wait(&mut self) {
        (**self).log_wait()
    }

    fn log(&mut self, message: LogMessage) {
        (**self).log(message)
    }

    fn log_success(&mut self) {
        (**self).log_success()
    }

    fn log_failure(&mut self) {
        (**self).log_failure()
    }

    fn warn(&mut self, message: &str) {
        (**self).warn(message)
    }
}

/// Colored terminal output
#[derive(Default)]
pub struct TerminalLogger {
    spinner: Option<ProgressBar>,
    script_started: Option<Instant>,
    step_started: Option<Instant>,
}

impl TerminalLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn step_duration(&self) -> String {
        let elapsed = self
            .step_started
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO);
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

impl Logger for TerminalLogger {
    fn start_script(&mut self, script: &Script) {
        self.script_started = Some(Instant::now());
        println!(
            "{} {} {}",
            style("Starting execution of").bold(),
            style(script.full_name()).cyan().bold(),
            style(format!("({})", script.path().display())).dim()
        );
        println!();
    }

    fn finish_script(&mut self, script: &Script) {
        self.clear_spinner();
        let elapsed = self
            .script_started
            .take()
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO);
        println!();
        println!(
            "{} {} {}",
            style("Finished").bold(),
            style(script.full_name()).cyan().bold(),
            style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
        );
    }

    fn log_start(
        &mut self,
        headline: &str,
        subject: &str,
        line: usize,
        ignore_error: bool,
        index: usize,
        max: usize,
    ) {
        self.clear_spinner();
        self.step_started = Some(Instant::now());

        let position = if line == 0 {
            "config".to_string()
        } else {
            format!("line {}", line)
        };
        let ignore_note = if ignore_error { " (ignoring errors)" } else { "" };

        println!(
            "{} {} {}{}",
            style(format!("({}/{})", index + 1, max)).bold(),
            style(headline).bold(),
            style(position).dim(),
            style(ignore_note).yellow()
        );
        println!("{} {}", style("→").dim(), subject);
    }

    fn log_wait(&mut self) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(spinner_style);
        }
        spinner.set_message("waiting for output");
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn log(&mut self, message: LogMessage) {
        self.clear_spinner();
        if message.is_error {
            eprintln!("  {}", style(message.text).red());
        } else {
            println!("  {}", message.text);
        }
    }

    fn log_success(&mut self) {
        self.clear_spinner();
        println!("{} {}", style("✓").green(), style(self.step_duration()).dim());
    }

    fn log_failure(&mut self) {
        self.clear_spinner();
        println!("{} {}", style("✗").red(), style(self.step_duration()).dim());
    }

    fn warn(&mut self, message: &str) {
        self.clear_spinner();
        println!("{} {}", style("!").yellow().bold(), style(message).yellow());
    }
}

/// Call recorded by [`RecordingLogger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    StartScript(String),
    FinishScript(String),
    Start {
        headline: String,
        subject: String,
        line: usize,
        ignore_error: bool,
        index: usize,
        max: usize,
    },
    Wait,
    Message(LogMessage),
    Success,
    Failure,
    Warning(String),
}

/// Keeps every call in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    pub entries: Vec<LogEntry>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of every output line, stdout and stderr interleaved
    pub fn output(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Message(message) => Some(message.text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &LogEntry) -> usize {
        self.entries.iter().filter(|entry| *entry == wanted).count()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Warning(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn start_script(&mut self, script: &Script) {
        self.entries.push(LogEntry::StartScript(script.full_name()));
    }

    fn finish_script(&mut self, script: &Script) {
        self.entries.push(LogEntry::FinishScript(script.full_name()));
    }

    fn log_start(
        &mut self,
        headline: &str,
        subject: &str,
        line: usize,
        ignore_error: bool,
        index: usize,
        max: usize,
    ) {
        self.entries.push(LogEntry::Start {
            headline: headline.to_string(),
            subject: subject.to_string(),
            line,
            ignore_error,
            index,
            max,
        });
    }

    fn log_wait(&mut self) {
        self.entries.push(LogEntry::Wait);
    }

    fn log(&mut self, message: LogMessage) {
        self.entries.push(LogEntry::Message(message));
    }

    fn log_success(&mut self) {
        self.entries.push(LogEntry::Success);
    }

    fn log_failure(&mut self) {
        self.entries.push(LogEntry::Failure);
    }

    fn warn(&mut self, message: &str) {
        self.entries.push(LogEntry::Warning(message.to_string()));
    }
}
