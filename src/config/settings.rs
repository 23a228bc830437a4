//! Layered INI settings with typed getters.

use crate::utils::decode_escapes;
use crate::{Error, Result};
use ini::{Ini, ParseOption};
use std::path::Path;

/// Options that keep regular expressions and LaTeX snippets verbatim.
fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        enabled_indented_mutiline_value: true,
        ..ParseOption::default()
    }
}

/// Merged view over the built-in defaults and one user file.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    ini: Ini,
}

impl Settings {
    /// Parse `layers` in order; later layers override earlier ones per key.
    pub fn from_layers<'a, I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a Path, &'a str)>,
    {
        let mut merged = Ini::new();

        for (path, text) in layers {
            let layer =
                Ini::load_from_str_opt(text, parse_option()).map_err(|e| Error::ConfigSyntax {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;

            for (section, properties) in layer.iter() {
                let Some(section) = section else {
                    if properties.is_empty() {
                        continue;
                    }
                    return Err(Error::ConfigSyntax {
                        path: path.to_path_buf(),
                        reason: "option found before the first section header".to_string(),
                    });
                };
                // keeps empty sections visible to `items`
                merged.entry(Some(section.to_string())).or_insert_with(Default::default);
                for (key, value) in properties.iter() {
                    merged
                        .with_section(Some(section))
                        .set(key.trim().to_lowercase(), value);
                }
            }
        }

        Ok(Self { ini: merged })
    }

    fn raw(&self, section: &str, option: &str) -> Option<&str> {
        self.ini
            .section(Some(section))
            .and_then(|props| props.get(option))
    }

    /// Trimmed value, `None` when absent or empty.
    pub fn optional_string(&self, section: &str, option: &str) -> Option<String> {
        self.raw(section, option)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Trimmed value, `MissingOption` when absent or empty.
    pub fn string(&self, section: &str, option: &str) -> Result<String> {
        self.optional_string(section, option)
            .ok_or_else(|| Error::missing_option(section, option))
    }

    /// Value with surrounding double quotes stripped and escapes decoded.
    pub fn quoted_string(&self, section: &str, option: &str) -> Option<String> {
        self.optional_string(section, option)
            .map(|value| decode_escapes(value.trim_matches('"')))
    }

    /// Whitespace-separated tokens, empty when absent.
    pub fn list(&self, section: &str, option: &str) -> Vec<String> {
        self.raw(section, option)
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Whitespace-separated tokens, `MissingOption` when there are none.
    pub fn required_list(&self, section: &str, option: &str) -> Result<Vec<String>> {
        let values = self.list(section, option);
        if values.is_empty() {
            return Err(Error::missing_option(section, option));
        }
        Ok(values)
    }

    /// Command line options split with POSIX shell rules.
    pub fn shell_words(&self, section: &str, option: &str) -> Result<Vec<String>> {
        let Some(value) = self.optional_string(section, option) else {
            return Ok(Vec::new());
        };
        shlex::split(&value).ok_or_else(|| {
            Error::invalid_option(section, option, value, "shell-style words with balanced quotes")
        })
    }

    pub fn boolean(&self, section: &str, option: &str, default: bool) -> Result<bool> {
        let Some(value) = self.optional_string(section, option) else {
            return Ok(default);
        };
        match value.to_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Ok(true),
            "0" | "no" | "false" | "off" => Ok(false),
            _ => Err(Error::invalid_option(
                section,
                option,
                value,
                "one of 1, yes, true, on, 0, no, false, off",
            )),
        }
    }

    /// Positive integer, `None` when absent.
    pub fn positive_integer(&self, section: &str, option: &str) -> Result<Option<usize>> {
        let Some(value) = self.optional_string(section, option) else {
            return Ok(None);
        };
        match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(Error::invalid_option(section, option, value, "a positive integer")),
        }
    }

    /// Every key/value pair of a section, values trimmed.
    pub fn items(&self, section: &str) -> Vec<(String, String)> {
        self.ini
            .section(Some(section))
            .map(|props| {
                props
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
