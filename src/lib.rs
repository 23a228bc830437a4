//! latexpages - Compile LaTeX parts and combine them into a single PDF.
//!
//! A collection (proceedings, a reader, a journal issue) is described by an
//! INI file next to one directory per part. This library:
//!
//! - compiles every part with `latexmk` or `texify`, in parallel
//! - copies the part PDFs into an output directory under configured names
//! - combines them with pdfpages into one document, optionally also two-up
//! - renumbers start pages in the part sources and the table of contents
//! - lists and removes intermediate files
//!
//! # Examples
//!
//! ```no_run
//! use latexpages::backend::LatexBackend;
//! use latexpages::build::{self, BuildOptions};
//! use latexpages::config::Job;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job = Job::load("book/latexpages.ini")?;
//! build::build(
//!     &job,
//!     &LatexBackend::new(),
//!     &BuildOptions::default(),
//!     std::future::pending(),
//!     |event| println!("{event:?}"),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ```no_run
//! use latexpages::backend::ProbedCounter;
//! use latexpages::config::Job;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job = Job::load("book/latexpages.ini")?;
//! let counter = ProbedCounter::new(job.paginate.counter);
//! let changed = latexpages::paginate::paginate(&job, &counter)?;
//! println!("changed: {changed}");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod build;
pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod paginate;
pub mod render;
pub mod utils;

// Re-export commonly used types
pub use config::Job;
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
