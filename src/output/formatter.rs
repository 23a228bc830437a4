//! Console messages for the `build`, `paginate` and `clean` commands.
//!
//! Progress and results go to stdout; `--quiet` keeps only output that was
//! explicitly asked for (a dry-run plan, the clean listing) and `--verbose`
//! adds source paths and stage boundaries.
//!
//! # Examples
//!
//! ```
//! use latexpages::output::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.section("Compiling 4 part(s)...");
//! formatter.progress(1, 4, "intro");
//! formatter.success("Built book.pdf");
//! ```

use crate::build::{BuildEvent, Plan, Stage};
use crate::clean::{CleanOutcome, CleanPlan};
use std::io::{self, IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Plain,
    Success,
    Debug,
}

impl Tone {
    fn style(self) -> (&'static str, &'static str) {
        match self {
            Tone::Plain => ("", ""),
            Tone::Success => ("✓ ", "\x1b[32m"),
            Tone::Debug => ("→ ", "\x1b[36m"),
        }
    }
}

/// Prints user-facing messages according to `--quiet` / `--verbose`.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    quiet: bool,
    verbose: bool,
    colored: bool,
}

impl OutputFormatter {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            colored: io::stdout().is_terminal() && std::env::var("TERM").is_ok(),
        }
    }

    /// Suppressed in quiet mode.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", self.line(Tone::Plain, message));
        }
    }

    /// Suppressed in quiet mode.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{}", self.line(Tone::Success, message));
        }
    }

    /// Only shown with `--verbose`.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            println!("{}", self.line(Tone::Debug, message));
        }
    }

    fn line(&self, tone: Tone, message: &str) -> String {
        let (prefix, color) = tone.style();
        if self.colored && !color.is_empty() {
            format!("{color}{prefix}{message}\x1b[0m")
        } else {
            format!("{prefix}{message}")
        }
    }

    /// Stage header, suppressed in quiet mode.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n{title}");
        }
    }

    /// Labelled value, only shown with `--verbose`.
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            println!("  {label}: {value}");
        }
    }

    /// `[current/total]` line within a stage, suppressed in quiet mode.
    pub fn progress(&self, current: usize, total: usize, message: &str) {
        if !self.quiet {
            println!("  [{current}/{total}] {message}");
            io::stdout().flush().ok();
        }
    }

    /// Printed even in quiet mode.
    pub fn raw(&self, text: &str) {
        println!("{text}");
    }

    /// Print a dry-run plan in human readable form.
    pub fn plan(&self, plan: &Plan) {
        self.raw(&plan_lines(plan).join("\n"));
    }

    /// Print the files a clean would remove.
    pub fn clean_plan(&self, plan: &CleanPlan) {
        for line in plan.listing() {
            self.raw(&line);
        }
    }

    /// Report the result of a clean.
    pub fn clean_outcome(&self, outcome: &CleanOutcome) {
        match outcome {
            CleanOutcome::Nothing => self.info("Nothing to clean"),
            CleanOutcome::Declined => self.info("Nothing deleted"),
            CleanOutcome::Removed { files, directory } => {
                self.success(&format!("Deleted {files} file(s)"));
                if let Some(dir) = directory {
                    self.detail("Removed", &dir.display().to_string());
                }
            }
        }
    }
}

/// Tracks stage progress and prints build events as they arrive.
#[derive(Debug)]
pub struct BuildProgress<'a> {
    formatter: &'a OutputFormatter,
    done: usize,
    total: usize,
}

impl<'a> BuildProgress<'a> {
    pub fn new(formatter: &'a OutputFormatter) -> Self {
        Self {
            formatter,
            done: 0,
            total: 0,
        }
    }

    pub fn handle(&mut self, event: BuildEvent) {
        match event {
            BuildEvent::StageStarted { stage, tasks } => {
                self.done = 0;
                self.total = tasks;
                self.formatter.section(&stage_title(stage, tasks));
            }
            BuildEvent::PartCompiled { part } => {
                self.done += 1;
                self.formatter.progress(self.done, self.total, &part);
            }
            BuildEvent::FileCopied { source, target } => {
                self.done += 1;
                self.formatter.progress(
                    self.done,
                    self.total,
                    &target.file_name().map_or_else(
                        || target.display().to_string(),
                        |name| name.to_string_lossy().into_owned(),
                    ),
                );
                self.formatter.detail("From", &source.display().to_string());
            }
            BuildEvent::TargetCombined { name, pdf } => {
                self.done += 1;
                self.formatter.progress(self.done, self.total, &name);
                self.formatter.detail("Output", &pdf.display().to_string());
            }
            BuildEvent::StageFinished { stage } => {
                self.formatter.debug(&format!("{stage} stage finished"));
            }
        }
    }
}

fn stage_title(stage: Stage, tasks: usize) -> String {
    match stage {
        Stage::Compile => format!("Compiling {tasks} part(s)..."),
        Stage::Copy => format!("Copying {tasks} PDF(s)..."),
        Stage::Combine => format!("Combining {tasks} document(s)..."),
    }
}

/// Human readable lines of a dry-run plan.
pub fn plan_lines(plan: &Plan) -> Vec<String> {
    let mut lines = vec![format!(
        "DRY RUN: engine {}, {} worker(s)",
        plan.engine, plan.workers
    )];

    lines.push(format!("\nCompile ({}):", plan.compile.len()));
    for step in &plan.compile {
        for command in &step.commands {
            lines.push(format!(
                "  [{}] {} (in {})",
                step.task.part,
                command.command_line(),
                step.task.directory.display()
            ));
        }
    }

    if !plan.copy.is_empty() {
        lines.push(format!("\nCopy ({}):", plan.copy.len()));
        for copy in &plan.copy {
            lines.push(format!(
                "  {} -> {}",
                copy.source.display(),
                copy.target.display()
            ));
        }
    }

    if !plan.combine.is_empty() {
        lines.push(format!("\nCombine ({}):", plan.combine.len()));
        for step in &plan.combine {
            lines.push(format!("  {} <- {}", step.source.display(), step.target.main.join(", ")));
            for command in &step.commands {
                lines.push(format!("    {}", command.command_line()));
            }
        }
    }

    lines
}
