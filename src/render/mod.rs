//! Combination documents: LaTeX sources that concatenate part PDFs with
//! the `pdfpages` package.

use crate::backend::{CompileOptions, CompileRequest, Compiler, Engine};
use crate::config::{CombineTarget, DEFAULT_TEMPLATE, Job};
use crate::utils::{safe_substitute, swapext};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Export names to include, split by numbering style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationDocument {
    /// Roman-numbered names, possibly empty.
    pub front: Vec<String>,
    /// Arabic-numbered names.
    pub main: Vec<String>,
    pub two_up: bool,
}

impl From<&CombineTarget> for CombinationDocument {
    fn from(target: &CombineTarget) -> Self {
        Self {
            front: target.front.clone(),
            main: target.main.clone(),
            two_up: target.two_up,
        }
    }
}

fn include(options: &str, names: &[String]) -> String {
    let files: Vec<String> = names.iter().map(|name| format!("{name},-")).collect();
    format!(r"\includepdfmerge[{options}]{{{}}}", files.join(","))
}

impl CombinationDocument {
    /// Document body with the page numbering switches and includes.
    ///
    /// # Errors
    ///
    /// [`Error::LayoutConflict`] for a two-up document with front matter.
    pub fn body(&self, include_options: &str) -> Result<String> {
        if self.two_up {
            if !self.front.is_empty() {
                return Err(Error::LayoutConflict {
                    count: self.front.len(),
                });
            }
            return Ok(include(include_options, &self.main));
        }

        let mut lines = Vec::new();
        if !self.front.is_empty() {
            lines.push(r"\pagenumbering{roman}".to_string());
            lines.push(include(include_options, &self.front));
            lines.push(r"\pagenumbering{arabic}".to_string());
        }
        lines.push(include(include_options, &self.main));
        Ok(lines.join("\n"))
    }
}

/// Fill a combination template.
///
/// Context keys are upper-cased; `__CLASS__`, `__OPTIONS__` and
/// `__DOCUMENT__` carry the document class, its options and the body.
pub fn render(
    document: &CombinationDocument,
    context: &BTreeMap<String, String>,
    template: &str,
    include_options: &str,
    class: &str,
    class_options: &str,
) -> Result<String> {
    let body = document.body(include_options)?;

    let mut values: HashMap<String, String> = context
        .iter()
        .map(|(key, value)| (key.to_uppercase(), value.clone()))
        .collect();
    values.insert("__CLASS__".to_string(), class.to_string());
    values.insert("__OPTIONS__".to_string(), class_options.to_string());
    values.insert("__DOCUMENT__".to_string(), body);

    Ok(safe_substitute(template, &values))
}

/// Read a template file, or the built-in one for `None`.
pub async fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file_io(path, e)),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Write the source as UTF-8.
pub async fn emit(path: &Path, source: &str) -> Result<()> {
    tokio::fs::write(path, source)
        .await
        .map_err(|e| Error::file_io(path, e))
}

/// Remove every `<stem>.*` sibling of `path` except `<stem>.pdf`.
///
/// Returns the removed files, sorted.
pub fn cleanup(path: &Path) -> Result<Vec<PathBuf>> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = path.with_file_name(swapext(&file_name, ""));
    let keep = path.with_file_name(swapext(&file_name, "pdf"));
    let pattern = format!("{}*", glob::Pattern::escape(&prefix.to_string_lossy()));

    let entries = glob::glob(&pattern).map_err(|e| Error::InvalidPattern {
        option: "cleanup".to_string(),
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut removed = Vec::new();
    for entry in entries {
        let candidate = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            Error::file_io(path, e.into())
        })?;
        if candidate == keep || !candidate.is_file() {
            continue;
        }
        std::fs::remove_file(&candidate).map_err(|e| Error::file_io(&candidate, e))?;
        removed.push(candidate);
    }
    removed.sort();
    debug!(source = %path.display(), removed = removed.len(), "cleaned auxiliary files");
    Ok(removed)
}

/// Compile a written combination source, then optionally clean up.
pub async fn compile_and_cleanup<C: Compiler>(
    path: &Path,
    compiler: &C,
    engine: Engine,
    options: &CompileOptions,
    cleanup_after: bool,
) -> Result<()> {
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = CompileRequest {
        directory,
        filename,
        dvips: false,
        view: false,
        engine,
        options,
    };
    compiler.compile(&request).await?;

    if cleanup_after {
        cleanup(path)?;
    }
    Ok(())
}

/// Render, write and compile one combination target of `job`.
///
/// The source is `<output dir>/<name>.tex`; returns the produced PDF path.
/// The layout is checked before anything is written or compiled.
pub async fn combine<C: Compiler>(
    job: &Job,
    target: &CombineTarget,
    compiler: &C,
    engine: Engine,
    cleanup_after: bool,
) -> Result<PathBuf> {
    let document = CombinationDocument::from(target);
    let template = load_template(target.template.as_deref()).await?;
    let source = render(
        &document,
        &job.context,
        &template,
        job.template.include_options(target.two_up),
        &job.template.class,
        job.template.class_options(target.two_up),
    )?;

    let path = job.output_dir().join(swapext(&target.name, "tex"));
    emit(&path, &source).await?;
    compile_and_cleanup(&path, compiler, engine, &job.compile.options, cleanup_after).await?;

    Ok(path.with_extension("pdf"))
}
