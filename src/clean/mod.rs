//! Removal of intermediate files from part directories and of the output
//! directory.
//!
//! Patterns are shell globs matched against `part/file` paths, so `*.aux`
//! matches in every part directory while `intro/*.log` targets one part.
//! Nothing is deleted without confirmation.

use crate::config::Job;
use crate::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Files found for removal, before confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPlan {
    /// Directory the listing is shown relative to.
    pub root: PathBuf,
    pub in_parts: Vec<PathBuf>,
    pub in_output: Vec<PathBuf>,
    /// Output directory to remove, when output cleaning is on.
    pub output_dir: Option<PathBuf>,
}

impl CleanPlan {
    pub fn is_empty(&self) -> bool {
        self.in_parts.is_empty() && self.in_output.is_empty()
    }

    /// Every listed file, relative to `root` where possible.
    pub fn listing(&self) -> impl Iterator<Item = String> + '_ {
        self.in_parts.iter().chain(&self.in_output).map(|path| {
            path.strip_prefix(&self.root)
                .unwrap_or(path)
                .display()
                .to_string()
        })
    }

    /// Confirmation question for this plan.
    pub fn question(&self) -> String {
        match &self.output_dir {
            Some(dir) => format!(
                "...delete {} files matched in parts and {} files removing {}?",
                self.in_parts.len(),
                self.in_output.len(),
                dir.strip_prefix(&self.root).unwrap_or(dir).display()
            ),
            None => format!("...delete {} files matched in parts?", self.in_parts.len()),
        }
    }
}

/// What [`clean`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanOutcome {
    /// No file matched; nothing was asked.
    Nothing,
    /// The user said no.
    Declined,
    Removed {
        files: usize,
        directory: Option<PathBuf>,
    },
}

/// Find, confirm and delete the job's intermediate files.
///
/// `clean_output` turns on output directory removal in addition to the
/// `[clean] output` option. `confirm` sees the plan and decides.
pub fn clean<F>(job: &Job, clean_output: bool, confirm: F) -> Result<CleanOutcome>
where
    F: FnOnce(&CleanPlan) -> Result<bool>,
{
    let plan = plan(job, clean_output)?;
    if plan.is_empty() {
        debug!("nothing to clean");
        return Ok(CleanOutcome::Nothing);
    }

    if !confirm(&plan)? {
        return Ok(CleanOutcome::Declined);
    }

    remove(&plan.in_parts, plan.output_dir.as_deref())?;
    Ok(CleanOutcome::Removed {
        files: plan.in_parts.len() + plan.in_output.len(),
        directory: plan.output_dir,
    })
}

/// Collect the files [`clean`] would delete.
pub fn plan(job: &Job, clean_output: bool) -> Result<CleanPlan> {
    let in_parts = matched_files(&job.to_clean(), &job.clean.parts, &job.clean.except)?;

    let (in_output, output_dir) = if job.clean.output || clean_output {
        let dir = job.output_dir();
        (output_files(&dir)?, Some(dir))
    } else {
        (Vec::new(), None)
    };

    Ok(CleanPlan {
        root: job.config_dir.clone(),
        in_parts,
        in_output,
        output_dir,
    })
}

fn glob_set(option: &str, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidPattern {
            option: option.to_string(),
            pattern: pattern.clone(),
            reason: e.kind().to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::InvalidPattern {
        option: option.to_string(),
        pattern: patterns.join(" "),
        reason: e.to_string(),
    })
}

/// Files directly inside `dirs` matching any of `patterns` and none of
/// `except`, sorted by name within each directory.
///
/// Matching is done on `<directory name>/<file name>`.
pub fn matched_files(dirs: &[PathBuf], patterns: &[String], except: &[String]) -> Result<Vec<PathBuf>> {
    let include = glob_set("parts", patterns)?;
    let exclude = glob_set("except", except)?;

    let mut matched = Vec::new();
    for dir in dirs {
        let prefix = dir.file_name().map(Path::new).unwrap_or(dir);

        let mut entries = fs::read_dir(dir)
            .map_err(|e| Error::file_io(dir, e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| Error::file_io(dir, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = prefix.join(entry.file_name());
            if include.is_match(&relative) && !exclude.is_match(&relative) {
                matched.push(path);
            }
        }
    }
    Ok(matched)
}

/// Every file below `directory`, sorted; empty when it does not exist.
pub fn output_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(directory).to_path_buf();
            Error::file_io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Delete `files`, then the whole `directory` if given.
pub fn remove(files: &[PathBuf], directory: Option<&Path>) -> Result<()> {
    for file in files {
        debug!(path = %file.display(), "removing");
        fs::remove_file(file).map_err(|e| Error::file_io(file, e))?;
    }
    if let Some(dir) = directory {
        if dir.exists() {
            info!(path = %dir.display(), "removing output directory");
            fs::remove_dir_all(dir).map_err(|e| Error::file_io(dir, e))?;
        }
    }
    Ok(())
}

/// Ask a yes/no `question`, defaulting to no.
///
/// Repeats until the answer is empty, `y`, `yes`, `n` or `no`. End of input
/// counts as no.
pub fn confirm<R, W>(question: &str, input: &mut R, output: &mut W) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    loop {
        write!(output, "{question} [y/N] ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }

        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => writeln!(output, "Please answer '(y)es' or '(n)o'.")?,
        }
    }
}
