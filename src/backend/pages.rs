//! PDF page counting.
//!
//! [`ProbedCounter`] is constructed once, picks the first available backend
//! on first use and keeps it for its lifetime. It is passed explicitly to
//! the pagination engine, so tests can hand in a fake [`PageCounter`].

use crate::{Error, Result};
use lopdf::Document;
use regex::Regex;
use serde::Serialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Returns the number of pages of a PDF.
pub trait PageCounter: Send + Sync {
    fn count_pages(&self, pdf: &Path) -> Result<u32>;

    /// Whether this backend can run in the current environment.
    fn probe(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Page counter selection from the `[paginate] counter` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterChoice {
    /// First available of pdfinfo, pdftk, lopdf.
    #[default]
    Auto,
    Pdfinfo,
    Pdftk,
    Lopdf,
}

impl FromStr for CounterChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pdfinfo" => Ok(Self::Pdfinfo),
            "pdftk" => Ok(Self::Pdftk),
            "lopdf" => Ok(Self::Lopdf),
            _ => Err(Error::invalid_option(
                "paginate",
                "counter",
                s,
                "auto, pdfinfo, pdftk or lopdf",
            )),
        }
    }
}

/// Counts pages by running an external tool and scanning its output.
#[derive(Debug, Clone)]
pub struct ToolCounter {
    program: &'static str,
    probe_args: &'static [&'static str],
    trailing_args: &'static [&'static str],
    pattern: Regex,
}

impl ToolCounter {
    /// `pdfinfo <pdf>` from poppler or xpdf.
    pub fn pdfinfo() -> Self {
        Self {
            program: "pdfinfo",
            probe_args: &["-v"],
            trailing_args: &[],
            pattern: Regex::new(r"(?m)^Pages:\s+(\d+)").expect("valid regex"),
        }
    }

    /// `pdftk <pdf> dump_data`.
    pub fn pdftk() -> Self {
        Self {
            program: "pdftk",
            probe_args: &["--version"],
            trailing_args: &["dump_data"],
            pattern: Regex::new(r"(?m)^NumberOfPages: (\d+)").expect("valid regex"),
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    fn not_found(&self) -> Error {
        Error::executable_not_found(
            self.program,
            "make sure the pdfinfo or pdftk executable is on your system's PATH",
        )
    }

    /// Extract the page count from tool output.
    fn parse(&self, pdf: &Path, output: &str) -> Result<u32> {
        self.pattern
            .captures(output)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| Error::PageCountUnparsable {
                path: pdf.to_path_buf(),
                program: self.program.to_string(),
            })
    }
}

impl PageCounter for ToolCounter {
    fn count_pages(&self, pdf: &Path) -> Result<u32> {
        let mut args: Vec<OsString> = vec![pdf.as_os_str().to_owned()];
        args.extend(self.trailing_args.iter().map(OsString::from));

        let output = Command::new(self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => self.not_found(),
                _ => Error::file_io(pdf, err),
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("{} {}", self.program, pdf.display()),
                status: output.status.to_string(),
            });
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        self.parse(pdf, &text)
    }

    /// Available when the executable launches and answers its version
    /// query successfully.
    fn probe(&self) -> Result<bool> {
        let launched = Command::new(self.program)
            .args(self.probe_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match launched {
            Ok(status) => {
                if !status.success() {
                    debug!(program = self.program, %status, "version query failed");
                }
                Ok(status.success())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Reads the page tree in-process with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfCounter;

impl PageCounter for LopdfCounter {
    fn count_pages(&self, pdf: &Path) -> Result<u32> {
        let document = Document::load(pdf).map_err(|e| Error::FailedToLoadPdf {
            path: pdf.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(document.get_pages().len() as u32)
    }
}

/// Ordered registry of named backends; the first available one wins.
pub struct ProbedCounter {
    candidates: Vec<(&'static str, Box<dyn PageCounter>)>,
    chosen: OnceLock<usize>,
}

impl ProbedCounter {
    /// Registry for a configured choice.
    ///
    /// An explicit choice has a single candidate, so a missing tool is
    /// reported instead of silently falling back.
    pub fn new(choice: CounterChoice) -> Self {
        let candidates: Vec<(&'static str, Box<dyn PageCounter>)> = match choice {
            CounterChoice::Auto => vec![
                ("pdfinfo", Box::new(ToolCounter::pdfinfo())),
                ("pdftk", Box::new(ToolCounter::pdftk())),
                ("lopdf", Box::new(LopdfCounter)),
            ],
            CounterChoice::Pdfinfo => vec![("pdfinfo", Box::new(ToolCounter::pdfinfo()))],
            CounterChoice::Pdftk => vec![("pdftk", Box::new(ToolCounter::pdftk()))],
            CounterChoice::Lopdf => vec![("lopdf", Box::new(LopdfCounter))],
        };
        Self::from_candidates(candidates)
    }

    pub fn from_candidates(candidates: Vec<(&'static str, Box<dyn PageCounter>)>) -> Self {
        Self {
            candidates,
            chosen: OnceLock::new(),
        }
    }

    /// Name of the selected backend, once resolved.
    pub fn selected(&self) -> Option<&'static str> {
        self.chosen.get().map(|&i| self.candidates[i].0)
    }

    fn resolve(&self) -> Result<usize> {
        if let Some(&index) = self.chosen.get() {
            return Ok(index);
        }

        let mut tried = Vec::new();
        for (index, (name, counter)) in self.candidates.iter().enumerate() {
            if counter.probe()? {
                info!(counter = name, "selected page counter");
                return Ok(*self.chosen.get_or_init(|| index));
            }
            debug!(counter = name, "page counter unavailable");
            tried.push(*name);
        }

        Err(Error::executable_not_found(
            tried.join(" and "),
            "make sure the pdfinfo or pdftk executable is on your system's PATH",
        ))
    }
}

impl PageCounter for ProbedCounter {
    fn count_pages(&self, pdf: &Path) -> Result<u32> {
        let index = self.resolve()?;
        self.candidates[index].1.count_pages(pdf)
    }

    fn probe(&self) -> Result<bool> {
        Ok(self.resolve().is_ok())
    }
}

impl std::fmt::Debug for ProbedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.candidates.iter().map(|(name, _)| *name).collect();
        f.debug_struct("ProbedCounter")
            .field("candidates", &names)
            .field("selected", &self.selected())
            .finish()
    }
}
