//! Filename and text helpers shared by the config, render and paginate
//! modules.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})")
        .expect("valid regex")
});

/// Return `filename` with its extension replaced, or appended if it has none.
///
/// Only the segment after the last `.` is replaced.
///
/// ```
/// use latexpages::utils::swapext;
///
/// assert_eq!(swapext("spam.eggs", "ham"), "spam.ham");
/// assert_eq!(swapext("spam", "ham"), "spam.ham");
/// ```
pub fn swapext(filename: &str, extension: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map_or(filename, |(stem, _)| stem);
    format!("{stem}.{extension}")
}

/// Substitute `$NAME` and `${NAME}` placeholders from `context`.
///
/// Unknown placeholders and lone `$` signs are left untouched, `$$` becomes `$`.
pub fn safe_substitute(template: &str, context: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let key = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match context.get(key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Decode backslash escapes in a configuration string.
///
/// Recognized: `\n \t \r \\ \" \' \a \b \f \v \0 \xHH \uHHHH \UHHHHHHHH`.
/// Anything else (including malformed hex escapes) is kept verbatim.
pub fn decode_escapes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(&(_, next)) = chars.peek() else {
            out.push('\\');
            break;
        };
        let simple = match next {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'v' => Some('\x0b'),
            '0' => Some('\0'),
            '\\' | '"' | '\'' => Some(next),
            _ => None,
        };
        if let Some(decoded) = simple {
            chars.next();
            out.push(decoded);
            continue;
        }
        let width = match next {
            'x' => 2,
            'u' => 4,
            'U' => 8,
            _ => 0,
        };
        let digits_start = pos + 2;
        let decoded = value
            .get(digits_start..digits_start + width)
            .filter(|digits| width > 0 && digits.chars().all(|c| c.is_ascii_hexdigit()))
            .and_then(|digits| u32::from_str_radix(digits, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                // skip the escape letter and its digits
                for _ in 0..=width {
                    chars.next();
                }
            }
            None => out.push('\\'),
        }
    }

    out
}
