//! Error types for latexpages.
//!
//! Every failure aborts the current operation and bubbles up to the caller
//! carrying the file, pattern or executable needed to diagnose it. Nothing is
//! retried internally.
//!
//! # Error Categories
//!
//! - **Configuration Errors**: missing or malformed options, missing part
//!   sources, unknown `use_dvips` entries
//! - **Execution Errors**: external executables that are absent or fail
//! - **Layout Errors**: two-up combination requested with front matter
//! - **Pattern Errors**: substitution patterns that no longer match the files

use std::io;
use std::path::PathBuf;

/// Result type alias for latexpages operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for latexpages operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file does not exist.
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Configuration file could not be parsed as INI.
    #[error("Failed to parse configuration: {}\n  Reason: {reason}", path.display())]
    ConfigSyntax {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A required option is missing or empty.
    #[error("Empty {option} option in {section} section")]
    MissingOption {
        /// INI section.
        section: String,
        /// Option key.
        option: String,
    },

    /// An option holds a value that cannot be interpreted.
    #[error("Invalid value for {option} option in {section} section: {value:?}\n  Expected: {expected}")]
    InvalidOption {
        /// INI section.
        section: String,
        /// Option key.
        option: String,
        /// Offending value.
        value: String,
        /// What would have been accepted.
        expected: String,
    },

    /// Part source files referenced by the configuration are missing.
    #[error("Part source file(s) not found: {}", display_paths(paths))]
    MissingPartSources {
        /// Every missing source file.
        paths: Vec<PathBuf>,
    },

    /// `use_dvips` lists parts that are not in any part list.
    #[error("use_dvips names unknown part(s): {}", parts.join(", "))]
    UnknownDvipsParts {
        /// Unknown identifiers, sorted.
        parts: Vec<String>,
    },

    /// A configured regular expression is invalid.
    #[error("Invalid pattern {pattern:?} for {option} option\n  Reason: {reason}")]
    InvalidPattern {
        /// Option key holding the pattern.
        option: String,
        /// Pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Requested part identifier is not part of the job.
    #[error("Unknown part: {part:?}")]
    UnknownPart {
        /// The identifier asked for.
        part: String,
    },

    /// An external executable is not on the search path.
    #[error("Failed to execute {program:?}\n  Hint: {hint}")]
    ExecutableNotFound {
        /// Program name.
        program: String,
        /// What to install or put on PATH.
        hint: String,
    },

    /// No default compile engine is known for this platform.
    #[error("No default LaTeX engine for platform {platform:?}, choose one with --engine")]
    UnsupportedPlatform {
        /// `std::env::consts::OS` value.
        platform: String,
    },

    /// An external command exited unsuccessfully.
    #[error("Command failed ({status}): {command}")]
    CommandFailed {
        /// Command line, space separated.
        command: String,
        /// Exit status description.
        status: String,
    },

    /// Two-up combination was asked to carry front matter.
    #[error("Two-up combination cannot include front matter ({count} file(s) given)")]
    LayoutConflict {
        /// Number of front matter files passed.
        count: usize,
    },

    /// Substitution pattern did not match at all.
    #[error("Pattern {pattern:?} not found in {}", path.display())]
    PatternNotFound {
        /// File searched.
        path: PathBuf,
        /// Pattern text.
        pattern: String,
    },

    /// Positional contents pattern matched the wrong number of times.
    #[error(
        "Pattern {pattern:?} matched {found} time(s) in {}, expected {expected}",
        path.display()
    )]
    MatchCountMismatch {
        /// File searched.
        path: PathBuf,
        /// Pattern text.
        pattern: String,
        /// Number of computed start pages.
        expected: usize,
        /// Number of matches.
        found: usize,
    },

    /// Page counter output did not contain a page count.
    #[error("Failed to read page count of {} from {program} output", path.display())]
    PageCountUnparsable {
        /// PDF queried.
        path: PathBuf,
        /// Counter backend name.
        program: String,
    },

    /// Start pages ran past the largest representable page number.
    #[error("Page numbers overflow after {}", path.display())]
    PageNumberOverflow {
        /// PDF whose page count overflowed the running total.
        path: PathBuf,
    },

    /// PDF could not be opened by the in-process page counter.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", path.display())]
    FailedToLoadPdf {
        /// PDF path.
        path: PathBuf,
        /// lopdf message.
        reason: String,
    },

    /// Text could not be decoded or encoded with the configured encoding.
    #[error("Cannot {action} {} as {encoding}", path.display())]
    Encoding {
        /// File processed.
        path: PathBuf,
        /// Encoding label.
        encoding: String,
        /// `decode` or `encode`.
        action: &'static str,
    },

    /// User cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// I/O error on a known path.
    #[error("I/O error on {}: {source}", path.display())]
    FileIo {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Plan serialization failed.
    #[error("Failed to serialize plan: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a MissingOption error.
    pub fn missing_option(section: &str, option: &str) -> Self {
        Self::MissingOption {
            section: section.to_string(),
            option: option.to_string(),
        }
    }

    /// Create an InvalidOption error.
    pub fn invalid_option(
        section: &str,
        option: &str,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidOption {
            section: section.to_string(),
            option: option.to_string(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create an UnknownPart error.
    pub fn unknown_part(part: impl Into<String>) -> Self {
        Self::UnknownPart { part: part.into() }
    }

    /// Create an ExecutableNotFound error.
    pub fn executable_not_found(program: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ExecutableNotFound {
            program: program.into(),
            hint: hint.into(),
        }
    }

    /// Create a PatternNotFound error.
    pub fn pattern_not_found(path: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::PatternNotFound {
            path: path.into(),
            pattern: pattern.into(),
        }
    }

    /// Attach a path to an I/O error.
    pub fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Check if the error stems from the configuration file.
    ///
    /// These are raised before any work begins.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigSyntax { .. }
                | Self::MissingOption { .. }
                | Self::InvalidOption { .. }
                | Self::MissingPartSources { .. }
                | Self::UnknownDvipsParts { .. }
                | Self::InvalidPattern { .. }
        )
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            _ if self.is_config_error() => 2,
            Self::UnknownPart { .. } => 2,
            Self::ExecutableNotFound { .. } => 3,
            Self::UnsupportedPlatform { .. } => 3,
            Self::CommandFailed { .. } => 4,
            Self::LayoutConflict { .. } => 5,
            Self::PatternNotFound { .. } => 6,
            Self::MatchCountMismatch { .. } => 6,
            Self::PageCountUnparsable { .. } => 7,
            Self::FailedToLoadPdf { .. } => 7,
            Self::PageNumberOverflow { .. } => 7,
            Self::Encoding { .. } => 8,
            Self::Cancelled => 130, // Standard exit code for SIGINT
            _ => 1,
        }
    }
}
