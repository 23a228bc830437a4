//! Configuration module for latexpages.
//!
//! This module turns the layered INI configuration (built-in defaults, then
//! the user's file) into a validated, immutable [`Job`] and derives the
//! execution plans from it:
//! - compile tasks for every part, in group order
//! - copies of part PDFs into the output directory
//! - the normal and optional two-up combination targets
//! - the sources whose start pages get renumbered
//!
//! Every relative path is resolved against the directory holding the
//! configuration file.

mod names;
mod settings;

pub use names::NameTemplate;

use crate::backend::{CompileOptions, CompileRequest, CounterChoice, Engine};
use crate::utils::swapext;
use crate::{Error, Result};
use encoding_rs::Encoding;
use regex::Regex;
use serde::Serialize;
use settings::Settings;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file looked up when none is given.
pub const DEFAULT_CONFIG: &str = "latexpages.ini";

const DEFAULTS: &str = include_str!("defaults.ini");

/// Combination document skeleton used when no template file is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("template.tex");

/// Group a part belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    /// Roman-numbered preliminaries.
    Front,
    /// Arabic-numbered body.
    Main,
    /// Standalone exports, not combined.
    Extra,
}

/// Ordered part identifiers sharing one export name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartGroup {
    pub group: Group,
    pub parts: Vec<String>,
    pub names: NameTemplate,
}

/// `[template]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSettings {
    pub filename: Option<PathBuf>,
    pub filename_two_up: Option<PathBuf>,
    pub class: String,
    pub options: String,
    pub options_two_up: String,
    pub include: String,
    pub include_two_up: String,
}

impl TemplateSettings {
    /// Template file for a layout; `None` means the built-in skeleton.
    pub fn path(&self, two_up: bool) -> Option<&Path> {
        if two_up {
            self.filename_two_up.as_deref()
        } else {
            self.filename.as_deref()
        }
    }

    pub fn class_options(&self, two_up: bool) -> &str {
        if two_up {
            &self.options_two_up
        } else {
            &self.options
        }
    }

    pub fn include_options(&self, two_up: bool) -> &str {
        if two_up {
            &self.include_two_up
        } else {
            &self.include
        }
    }
}

/// `[compile]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSettings {
    pub processes: Option<usize>,
    pub engine: Option<Engine>,
    pub options: CompileOptions,
}

/// How the table of contents is rewritten.
#[derive(Debug, Clone)]
pub enum ContentsRule {
    /// Every match of `replace` receives the next start page.
    Positional { replace: regex::bytes::Regex },
    /// The first match of `replace` receives one template line per part.
    Templated {
        replace: Regex,
        template: String,
        author_extract: Regex,
        title_extract: Regex,
    },
}

/// `[paginate]` section.
#[derive(Debug, Clone)]
pub struct PaginateSettings {
    /// Start page pattern inside each part source.
    pub update: regex::bytes::Regex,
    /// Table of contents source, if any.
    pub contents: Option<PathBuf>,
    pub rule: ContentsRule,
    pub encoding: &'static Encoding,
    pub counter: CounterChoice,
}

/// `[clean]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanSettings {
    pub parts: Vec<String>,
    pub except: Vec<String>,
    pub output: bool,
}

/// A part compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileTask {
    pub part: String,
    /// Part directory, the working directory of the compile.
    pub directory: PathBuf,
    /// `<part>.tex`
    pub filename: String,
    pub dvips: bool,
}

impl CompileTask {
    pub fn request<'a>(&self, engine: Engine, options: &'a CompileOptions) -> CompileRequest<'a> {
        CompileRequest {
            directory: self.directory.clone(),
            filename: self.filename.clone(),
            dvips: self.dvips,
            view: false,
            engine,
            options,
        }
    }
}

/// A part PDF copied into the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyTask {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// One combination document to render and compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombineTarget {
    /// Output base name; the document is `<name>.tex` in the output directory.
    pub name: String,
    pub template: Option<PathBuf>,
    pub front: Vec<String>,
    pub main: Vec<String>,
    pub two_up: bool,
}

/// A part source whose start page gets renumbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationRecord {
    pub part: String,
    pub source: PathBuf,
    pub pdf: PathBuf,
}

/// Validated configuration of one document collection.
#[derive(Debug, Clone)]
pub struct Job {
    pub config_dir: PathBuf,
    pub name: String,
    /// Output directory as configured, relative to `config_dir`.
    pub directory: PathBuf,
    pub two_up: Option<String>,
    pub front: PartGroup,
    pub main: PartGroup,
    pub extras: PartGroup,
    pub first_to_front: bool,
    pub dvips: BTreeSet<String>,
    pub template: TemplateSettings,
    pub context: BTreeMap<String, String>,
    pub compile: CompileSettings,
    pub paginate: PaginateSettings,
    pub clean: CleanSettings,
}

impl Job {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the file does not exist, an option
    /// is missing or invalid, part sources are missing, or `use_dvips`
    /// names unknown parts.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let config_dir = parent.canonicalize().map_err(|e| Error::file_io(parent, e))?;

        Self::parse(&text, path, config_dir)
    }

    /// Build a job from configuration text whose paths resolve against
    /// `config_dir`. `origin` only appears in error messages.
    pub fn parse(text: &str, origin: &Path, config_dir: PathBuf) -> Result<Self> {
        let settings = Settings::from_layers([
            (Path::new("<built-in defaults>"), DEFAULTS),
            (origin, text),
        ])?;

        let name = settings.string("make", "name")?;
        let directory = PathBuf::from(settings.string("make", "directory")?);
        let make_two_up = settings.boolean("make", "make_two_up", false)?;
        let two_up = match settings.optional_string("make", "two_up") {
            Some(template) => {
                let template = NameTemplate::parse_collection(&template).map_err(|reason| {
                    Error::invalid_option("make", "two_up", &template, reason)
                })?;
                Some(template.render_collection(&name))
            }
            None => None,
        };
        let two_up = match (make_two_up, two_up) {
            (false, _) => None,
            (true, Some(two_up)) => Some(two_up),
            (true, None) => return Err(Error::missing_option("make", "two_up")),
        };

        let group = |group: Group, option: &str, parts: Vec<String>| -> Result<PartGroup> {
            let template = settings.string("make", option)?;
            let names = NameTemplate::parse(&template)
                .map_err(|reason| Error::invalid_option("make", option, &template, reason))?;
            Ok(PartGroup {
                group,
                parts,
                names,
            })
        };
        let front = group(Group::Front, "frontmatter", settings.list("parts", "frontmatter"))?;
        let main = group(
            Group::Main,
            "mainmatter",
            settings.required_list("parts", "mainmatter")?,
        )?;
        let extras = group(Group::Extra, "extras", settings.list("parts", "extras"))?;

        let known: BTreeSet<&str> = [&front, &main, &extras]
            .into_iter()
            .flat_map(|g| g.parts.iter().map(String::as_str))
            .collect();
        let dvips: BTreeSet<String> = settings.list("parts", "use_dvips").into_iter().collect();
        let unknown: Vec<String> = dvips
            .iter()
            .filter(|part| !known.contains(part.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(Error::UnknownDvipsParts { parts: unknown });
        }

        let missing: Vec<PathBuf> = [&front, &main, &extras]
            .into_iter()
            .flat_map(|g| g.parts.iter())
            .map(|part| source_path(&config_dir, part))
            .filter(|source| !source.is_file())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingPartSources { paths: missing });
        }

        let first_to_front = settings.boolean("parts", "first_to_front", false)?;

        let filename = settings
            .optional_string("template", "filename")
            .map(|f| config_dir.join(f));
        let filename_two_up = settings
            .optional_string("template", "filename_two_up")
            .map(|f| config_dir.join(f))
            .or_else(|| filename.clone());
        let text_or_empty = |option: &str| {
            settings
                .optional_string("template", option)
                .unwrap_or_default()
        };
        let template = TemplateSettings {
            filename,
            filename_two_up,
            class: settings.string("template", "class")?,
            options: text_or_empty("options"),
            options_two_up: text_or_empty("options_two_up"),
            include: text_or_empty("include"),
            include_two_up: text_or_empty("include_two_up"),
        };

        let context = settings.items("substitute").into_iter().collect();

        let compile = CompileSettings {
            processes: settings.positive_integer("compile", "processes")?,
            engine: settings
                .optional_string("compile", "engine")
                .map(|engine| engine.parse())
                .transpose()?,
            options: CompileOptions {
                latexmk: settings.shell_words("compile", "latexmk")?,
                texify: settings.shell_words("compile", "texify")?,
                dvips: settings.shell_words("compile", "dvips")?,
                ps2pdf: settings.shell_words("compile", "ps2pdf")?,
            },
        };

        let paginate = parse_paginate(&settings, &config_dir)?;

        let clean = CleanSettings {
            parts: settings.list("clean", "parts"),
            except: settings.list("clean", "except"),
            output: settings.boolean("clean", "output", false)?,
        };

        let job = Self {
            config_dir,
            name,
            directory,
            two_up,
            front,
            main,
            extras,
            first_to_front,
            dvips,
            template,
            context,
            compile,
            paginate,
            clean,
        };
        debug!(
            name = %job.name,
            parts = job.groups().map(|g| g.parts.len()).sum::<usize>(),
            two_up = job.two_up.is_some(),
            "loaded job"
        );
        Ok(job)
    }

    /// The three groups in compile order.
    pub fn groups(&self) -> impl Iterator<Item = &PartGroup> {
        [&self.front, &self.main, &self.extras].into_iter()
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.config_dir.join(&self.directory)
    }

    /// `(part, export name)` pairs of a group.
    pub fn export_names<'a>(&'a self, group: &'a PartGroup) -> impl Iterator<Item = (&'a str, String)> {
        group.parts.iter().enumerate().map(move |(index0, part)| {
            (part.as_str(), group.names.render(&self.name, part, index0))
        })
    }

    fn names_of(&self, group: &PartGroup) -> Vec<String> {
        self.export_names(group).map(|(_, name)| name).collect()
    }

    /// One compile task per part: front, main, then extras.
    pub fn to_compile(&self) -> Vec<CompileTask> {
        self.groups()
            .flat_map(|g| g.parts.iter())
            .map(|part| CompileTask {
                part: part.clone(),
                directory: self.config_dir.join(part),
                filename: format!("{part}.tex"),
                dvips: self.dvips.contains(part),
            })
            .collect()
    }

    /// The compile task of a single part.
    pub fn to_compile_only(&self, part: &str) -> Result<CompileTask> {
        self.to_compile()
            .into_iter()
            .find(|task| task.part == part)
            .ok_or_else(|| Error::unknown_part(part))
    }

    /// Part PDFs and their export paths in the output directory.
    pub fn to_copy(&self) -> Vec<CopyTask> {
        let output = self.output_dir();
        self.groups()
            .flat_map(|g| self.export_names(g))
            .map(|(part, name)| CopyTask {
                source: self.config_dir.join(part).join(format!("{part}.pdf")),
                target: output.join(swapext(&name, "pdf")),
            })
            .collect()
    }

    /// The normal combination, then the two-up one when configured.
    ///
    /// Extras are exported but never combined.
    pub fn to_combine(&self) -> Vec<CombineTarget> {
        let mut front = self.names_of(&self.front);
        let mut main = self.names_of(&self.main);
        if self.first_to_front && !main.is_empty() {
            front.push(main.remove(0));
        }

        let mut targets = vec![CombineTarget {
            name: self.name.clone(),
            template: self.template.path(false).map(Path::to_path_buf),
            front,
            main,
            two_up: false,
        }];

        if let Some(two_up) = &self.two_up {
            let mut all = self.names_of(&self.front);
            all.extend(self.names_of(&self.main));
            targets.push(CombineTarget {
                name: two_up.clone(),
                template: self.template.path(true).map(Path::to_path_buf),
                front: Vec::new(),
                main: all,
                two_up: true,
            });
        }

        targets
    }

    /// Main matter sources, minus the first when it moved to the front.
    pub fn to_update(&self) -> Vec<PaginationRecord> {
        let skip = usize::from(self.first_to_front);
        self.main
            .parts
            .iter()
            .skip(skip)
            .map(|part| PaginationRecord {
                part: part.clone(),
                source: source_path(&self.config_dir, part),
                pdf: self.config_dir.join(part).join(format!("{part}.pdf")),
            })
            .collect()
    }

    /// Part directories, in compile order.
    pub fn to_clean(&self) -> Vec<PathBuf> {
        self.groups()
            .flat_map(|g| g.parts.iter())
            .map(|part| self.config_dir.join(part))
            .collect()
    }
}

fn source_path(config_dir: &Path, part: &str) -> PathBuf {
    config_dir.join(part).join(format!("{part}.tex"))
}

fn pattern_error(option: &str, pattern: &str, reason: impl ToString) -> Error {
    Error::InvalidPattern {
        option: option.to_string(),
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

const NEEDS_GROUP: &str = "pattern needs a capture group around the text to replace";

/// Byte pattern for source and contents files of any 8-bit encoding.
///
/// Unicode mode is off, so `.` and classes match single bytes rather than
/// UTF-8 scalar values.
pub fn byte_regex(pattern: &str) -> std::result::Result<regex::bytes::Regex, regex::Error> {
    regex::bytes::RegexBuilder::new(pattern).unicode(false).build()
}

fn bytes_pattern(settings: &Settings, option: &str) -> Result<regex::bytes::Regex> {
    let pattern = settings.string("paginate", option)?;
    let regex = byte_regex(&pattern).map_err(|e| pattern_error(option, &pattern, e))?;
    if regex.captures_len() < 2 {
        return Err(pattern_error(option, &pattern, NEEDS_GROUP));
    }
    Ok(regex)
}

fn text_pattern(settings: &Settings, option: &str, dot_all: bool) -> Result<Regex> {
    let pattern = settings.string("paginate", option)?;
    let regex = regex::RegexBuilder::new(&pattern)
        .dot_matches_new_line(dot_all)
        .build()
        .map_err(|e| pattern_error(option, &pattern, e))?;
    if regex.captures_len() < 2 {
        return Err(pattern_error(option, &pattern, NEEDS_GROUP));
    }
    Ok(regex)
}

fn parse_paginate(settings: &Settings, config_dir: &Path) -> Result<PaginateSettings> {
    let update = bytes_pattern(settings, "update")?;
    let contents = settings
        .optional_string("paginate", "contents")
        .map(|target| source_path(config_dir, &target));

    let rule = match settings.quoted_string("paginate", "template") {
        Some(template) => ContentsRule::Templated {
            replace: text_pattern(settings, "replace", true)?,
            template,
            author_extract: text_pattern(settings, "author_extract", false)?,
            title_extract: text_pattern(settings, "title_extract", false)?,
        },
        None => ContentsRule::Positional {
            replace: bytes_pattern(settings, "replace")?,
        },
    };

    let label = settings.string("paginate", "encoding")?;
    let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        Error::invalid_option("paginate", "encoding", &label, "a WHATWG encoding label")
    })?;

    let counter = settings.string("paginate", "counter")?.parse()?;

    Ok(PaginateSettings {
        update,
        contents,
        rule,
        encoding,
        counter,
    })
}
