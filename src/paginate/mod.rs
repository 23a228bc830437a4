//! Start page renumbering and table of contents rewriting.
//!
//! Part sources are edited as raw bytes, so the start page pattern works on
//! any 8-bit encoding. Only the templated contents mode decodes text, with
//! the configured encoding and without lossy replacement.
//!
//! Every step is idempotent: a file is only rewritten when the substitution
//! changes its content.

use crate::backend::PageCounter;
use crate::config::{ContentsRule, Job, PaginationRecord};
use crate::utils::safe_substitute;
use crate::{Error, Result};
use encoding_rs::Encoding;
use regex::bytes;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Values available to a contents template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartContext {
    pub author: String,
    pub title: String,
    pub startpage: u32,
}

impl PartContext {
    fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("author".to_string(), self.author.clone()),
            ("title".to_string(), self.title.clone()),
            ("startpage".to_string(), self.startpage.to_string()),
        ])
    }
}

/// Renumber every main matter part and rewrite the table of contents.
///
/// Returns whether any file changed.
pub fn paginate(job: &Job, counter: &dyn PageCounter) -> Result<bool> {
    let settings = &job.paginate;
    let records = job.to_update();

    let (updated, pages) = start_pages(&settings.update, &records, counter)?;
    let target = settings.contents.as_deref();

    let changed = match &settings.rule {
        ContentsRule::Positional { replace } => write_contents(target, replace, &pages)?,
        ContentsRule::Templated {
            replace,
            template,
            author_extract,
            title_extract,
        } => {
            let contexts = template_contexts(
                &records,
                &pages,
                author_extract,
                title_extract,
                settings.encoding,
            )?;
            write_contents_template(target, replace, template, &contexts, settings.encoding)?
        }
    };

    debug!(updated, changed, "pagination finished");
    Ok(updated || changed)
}

/// Write the running start page into each record's source.
///
/// The first part starts on page 1, each following part right after the
/// last page of the previous part's PDF.
///
/// # Errors
///
/// [`Error::PatternNotFound`] when a source has no match for `pattern`.
pub fn start_pages(
    pattern: &bytes::Regex,
    records: &[PaginationRecord],
    counter: &dyn PageCounter,
) -> Result<(bool, Vec<u32>)> {
    let mut changed = false;
    let mut pages = Vec::with_capacity(records.len());
    let mut page = 1u32;

    for record in records {
        changed |= replace_first(&record.source, pattern, page.to_string().as_bytes())?;
        pages.push(page);
        page = page
            .checked_add(counter.count_pages(&record.pdf)?)
            .ok_or_else(|| Error::PageNumberOverflow {
                path: record.pdf.clone(),
            })?;
    }

    Ok((changed, pages))
}

/// Replace group 1 of the first match of `pattern` in `path` with `repl`.
pub fn replace_first(path: &Path, pattern: &bytes::Regex, repl: &[u8]) -> Result<bool> {
    let old = fs::read(path).map_err(|e| Error::file_io(path, e))?;

    let mut found = 0;
    let new = pattern.replacen(&old, 1, |caps: &bytes::Captures<'_>| {
        found += 1;
        let result = splice_bytes(caps, repl);
        info!("{}\t{}", path.display(), String::from_utf8_lossy(&result));
        result
    });

    if found == 0 {
        return Err(Error::pattern_not_found(path, pattern.as_str()));
    }
    write_if_changed(path, &old, new)
}

/// Give every match of `pattern` in `target` the next page from `pages`.
///
/// Without a target nothing happens and `false` is returned.
///
/// # Errors
///
/// [`Error::MatchCountMismatch`] unless there is exactly one match per page.
pub fn write_contents(target: Option<&Path>, pattern: &bytes::Regex, pages: &[u32]) -> Result<bool> {
    let Some(path) = target else {
        return Ok(false);
    };
    let old = fs::read(path).map_err(|e| Error::file_io(path, e))?;

    let mut found = 0;
    let new = pattern.replace_all(&old, |caps: &bytes::Captures<'_>| {
        let result = match pages.get(found) {
            Some(page) => splice_bytes(caps, page.to_string().as_bytes()),
            None => caps[0].to_vec(),
        };
        found += 1;
        info!("{}\t{}", path.display(), String::from_utf8_lossy(&result));
        result
    });

    if found != pages.len() {
        return Err(Error::MatchCountMismatch {
            path: path.to_path_buf(),
            pattern: pattern.as_str().to_string(),
            expected: pages.len(),
            found,
        });
    }
    write_if_changed(path, &old, new)
}

/// Extract author and title of each record, paired with its start page.
///
/// The last match of each pattern wins; no match gives an empty string.
pub fn template_contexts(
    records: &[PaginationRecord],
    pages: &[u32],
    author_extract: &Regex,
    title_extract: &Regex,
    encoding: &'static Encoding,
) -> Result<Vec<PartContext>> {
    records
        .iter()
        .zip(pages)
        .map(|(record, &startpage)| -> Result<PartContext> {
            let raw = fs::read(&record.source).map_err(|e| Error::file_io(&record.source, e))?;
            let text = decode(&record.source, &raw, encoding)?;
            Ok(PartContext {
                author: last_group(author_extract, &text),
                title: last_group(title_extract, &text),
                startpage,
            })
        })
        .collect()
}

fn last_group(pattern: &Regex, text: &str) -> String {
    pattern
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map_or_else(String::new, |m| m.as_str().to_string())
}

/// Replace group 1 of the first match in `target` with one rendered
/// template line per context.
///
/// Without a target nothing happens and `false` is returned.
pub fn write_contents_template(
    target: Option<&Path>,
    pattern: &Regex,
    template: &str,
    contexts: &[PartContext],
    encoding: &'static Encoding,
) -> Result<bool> {
    let Some(path) = target else {
        return Ok(false);
    };
    let raw = fs::read(path).map_err(|e| Error::file_io(path, e))?;
    let old = decode(path, &raw, encoding)?;

    let lines: Vec<String> = contexts
        .iter()
        .map(|context| safe_substitute(template, &context.to_map()))
        .collect();
    let repl = lines.join("\n");

    let mut found = 0;
    let new = pattern.replacen(&old, 1, |caps: &Captures<'_>| {
        found += 1;
        let result = splice_text(caps, &repl);
        info!("{}\t{}", path.display(), result);
        result
    });

    if found == 0 {
        return Err(Error::pattern_not_found(path, pattern.as_str()));
    }
    if new == old {
        return Ok(false);
    }

    let encoded = encode(path, &new, encoding)?;
    fs::write(path, encoded).map_err(|e| Error::file_io(path, e))?;
    Ok(true)
}

/// The whole match with its first group swapped for `repl`.
///
/// A match whose group did not participate is returned unchanged.
fn splice_bytes(caps: &bytes::Captures<'_>, repl: &[u8]) -> Vec<u8> {
    let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
        return caps[0].to_vec();
    };
    let (start, end) = (group.start() - whole.start(), group.end() - whole.start());
    let whole = whole.as_bytes();

    let mut result = Vec::with_capacity(whole.len() + repl.len());
    result.extend_from_slice(&whole[..start]);
    result.extend_from_slice(repl);
    result.extend_from_slice(&whole[end..]);
    result
}

fn splice_text(caps: &Captures<'_>, repl: &str) -> String {
    let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
        return caps[0].to_string();
    };
    let (start, end) = (group.start() - whole.start(), group.end() - whole.start());
    let whole = whole.as_str();
    format!("{}{}{}", &whole[..start], repl, &whole[end..])
}

fn write_if_changed(path: &Path, old: &[u8], new: Cow<'_, [u8]>) -> Result<bool> {
    if new.as_ref() == old {
        return Ok(false);
    }
    fs::write(path, new.as_ref()).map_err(|e| Error::file_io(path, e))?;
    Ok(true)
}

fn decode(path: &Path, raw: &[u8], encoding: &'static Encoding) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(Cow::into_owned)
        .ok_or_else(|| Error::Encoding {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
            action: "decode",
        })
}

fn encode(path: &Path, text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(Error::Encoding {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
            action: "encode",
        });
    }
    Ok(bytes.into_owned())
}
