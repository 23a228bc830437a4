//! External collaborators: LaTeX compilation and PDF page counting.
//!
//! The build pipeline and the pagination engine only see the [`Compiler`]
//! and [`PageCounter`] traits. [`LatexBackend`] drives `latexmk` or
//! MiKTeX's `texify`; the page counters ask `pdfinfo`, `pdftk`, or read the
//! PDF in-process with `lopdf`.

pub mod latex;
pub mod pages;

pub use latex::{Invocation, LatexBackend};
pub use pages::{CounterChoice, LopdfCounter, PageCounter, ProbedCounter, ToolCounter};

use crate::{Error, Result};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

/// LaTeX driver used to produce PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// `latexmk` perl script (TeX Live).
    Latexmk,
    /// MiKTeX `texify`.
    Texify,
}

impl Engine {
    /// Engine used when neither the command line nor the config names one.
    pub fn platform_default() -> Result<Self> {
        Self::for_platform(std::env::consts::OS)
    }

    /// Default engine for an `std::env::consts::OS` value.
    pub fn for_platform(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self::Texify),
            "linux" | "macos" => Ok(Self::Latexmk),
            other => Err(Error::UnsupportedPlatform {
                platform: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latexmk => "latexmk",
            Self::Texify => "texify",
        }
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "latexmk" => Ok(Self::Latexmk),
            "texify" => Ok(Self::Texify),
            _ => Err(Error::invalid_option(
                "compile",
                "engine",
                s,
                "latexmk or texify",
            )),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra command line options, one list per tool stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileOptions {
    pub latexmk: Vec<String>,
    pub texify: Vec<String>,
    pub dvips: Vec<String>,
    pub ps2pdf: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        let words = |s: &[&str]| s.iter().map(|w| w.to_string()).collect();
        Self {
            latexmk: words(&["-silent"]),
            texify: words(&["--batch", "--verbose", "--quiet"]),
            dvips: words(&["-q"]),
            ps2pdf: Vec::new(),
        }
    }
}

/// One compilation of a `.tex` file inside its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest<'a> {
    /// Working directory of the external processes.
    pub directory: PathBuf,
    /// Source file name relative to `directory`.
    pub filename: String,
    /// Route through DVI and PostScript.
    pub dvips: bool,
    /// Open a viewer after compiling.
    pub view: bool,
    pub engine: Engine,
    pub options: &'a CompileOptions,
}

impl CompileRequest<'_> {
    /// Path of the PDF the request is expected to produce.
    pub fn pdf_path(&self) -> PathBuf {
        self.directory.join(crate::utils::swapext(&self.filename, "pdf"))
    }
}

/// Turns a LaTeX source into a PDF.
pub trait Compiler: Send + Sync {
    /// Compile the request's source file.
    ///
    /// Fails with [`Error::ExecutableNotFound`] when a tool is not installed
    /// or with an I/O error when it cannot be launched. An unsuccessful exit
    /// status is not an error.
    fn compile(&self, request: &CompileRequest<'_>) -> impl Future<Output = Result<()>> + Send;
}
