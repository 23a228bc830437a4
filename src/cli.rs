//! CLI argument parsing for latexpages.
//!
//! This module defines the command-line interface structure using `clap`.
//! Every subcommand takes the INI file as an optional positional argument,
//! defaulting to `latexpages.ini` in the current directory.
//!
//! # Examples
//!
//! ```no_run
//! use latexpages::cli::Cli;
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! println!("Using {}", cli.command.config().display());
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::backend::Engine;
use crate::build::BuildOptions;
use crate::config::DEFAULT_CONFIG;
use crate::error::{Error, Result};

/// Compile LaTeX documents and combine them into a single PDF file.
///
/// Each part lives in its own directory and is compiled on its own. The
/// resulting PDFs are copied into an output directory and joined with
/// pdfpages into one document, optionally also as a two-up version.
#[derive(Parser, Debug)]
#[command(name = "latexpages")]
#[command(version)]
#[command(about = "Compiles and combines LaTeX docs into a single PDF file", long_about = None)]
#[command(author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Show debug output, including every external command
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile all parts, copy their PDFs and combine them
    Build(BuildArgs),

    /// Compute and update start page numbers in parts and contents
    Paginate(PaginateArgs),

    /// List intermediate files and delete them on confirmation
    Clean(CleanArgs),
}

impl Command {
    /// Configuration file of the selected subcommand.
    pub fn config(&self) -> &Path {
        match self {
            Self::Build(args) => &args.config,
            Self::Paginate(args) => &args.config,
            Self::Clean(args) => &args.config,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// INI file configuring the parts and output options
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Compile the given part without copying or combining
    #[arg(long, value_name = "PART")]
    pub only: Option<String>,

    /// Open the compiled part in a viewer (with --only)
    #[arg(long, requires = "only")]
    pub view: bool,

    /// Number of parallel processes (default: one per core)
    #[arg(long, value_name = "N")]
    pub processes: Option<usize>,

    /// LaTeX driver (default: guess from platform)
    #[arg(short = 'c', long, value_enum, value_name = "ENGINE")]
    pub engine: Option<Engine>,

    /// Keep combination documents and their auxiliary files
    #[arg(long)]
    pub keep: bool,

    /// Show the commands a build would run without running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the dry-run plan as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,
}

impl BuildArgs {
    /// Convert the flags into build overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `--processes` is zero.
    pub fn to_options(&self) -> Result<BuildOptions> {
        if self.processes == Some(0) {
            return Err(Error::invalid_option(
                "compile",
                "processes",
                "0",
                "a positive integer",
            ));
        }

        Ok(BuildOptions {
            processes: self.processes,
            engine: self.engine,
            cleanup: !self.keep,
            only: self.only.clone(),
            view: self.view,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct PaginateArgs {
    /// INI file configuring the parts and paginate options
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// INI file configuring the parts and clean options
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Also delete the output directory (overrides INI file)
    #[arg(long)]
    pub output: bool,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
