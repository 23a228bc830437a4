//! Export name templates such as `{index1:02}-{part}` or `%(index1)02d-%(part)s`.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Part,
    Index0,
    Index1,
}

impl Field {
    fn parse(key: &str, part_fields: bool) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "part" if part_fields => Some(Self::Part),
            "index0" if part_fields => Some(Self::Index0),
            "index1" if part_fields => Some(Self::Index1),
            _ => None,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Self::Index0 | Self::Index1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field {
        field: Field,
        width: usize,
        zero_pad: bool,
        left: bool,
    },
}

/// Parsed name template.
///
/// `{name}`, `{part}`, `{index0}` and `{index1}` are replaced by the
/// collection name, the part identifier and its 0- or 1-based position
/// inside its group. A width may follow a colon: `{index1:02}` zero-pads,
/// `{part:8}` pads with spaces. `{{` and `}}` produce literal braces.
///
/// The printf-style spelling is accepted too: `%(part)s`, `%(index1)02d`,
/// `%(part)8s` (right-aligned) and `%%` for a literal percent sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    pieces: Vec<Piece>,
}

impl NameTemplate {
    /// Parse a template for part export names.
    pub fn parse(template: &str) -> Result<Self, String> {
        Self::parse_fields(template, true)
    }

    /// Parse a template that may only reference `{name}`.
    pub fn parse_collection(template: &str) -> Result<Self, String> {
        Self::parse_fields(template, false)
    }

    fn parse_fields(template: &str, part_fields: bool) -> Result<Self, String> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err("single '}' in template".to_string()),
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => field.push(c),
                            None => return Err("unclosed '{' in template".to_string()),
                        }
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Self::parse_field(&field, part_fields)?);
                }
                '%' if chars.peek() == Some(&'%') => {
                    chars.next();
                    literal.push('%');
                }
                '%' => {
                    if chars.next() != Some('(') {
                        return Err("'%' must start a %(key)s field or be doubled".to_string());
                    }
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some(')') => break,
                            Some(c) => key.push(c),
                            None => return Err("unclosed '%(' in template".to_string()),
                        }
                    }
                    let mut format = String::new();
                    let conversion = loop {
                        match chars.next() {
                            Some(c) if c.is_ascii_digit() => format.push(c),
                            Some(c) => break c,
                            None => return Err(format!("missing conversion after %({key})")),
                        }
                    };
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Self::parse_printf_field(&key, &format, conversion, part_fields)?);
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self { pieces })
    }

    fn parse_field(text: &str, part_fields: bool) -> Result<Piece, String> {
        let (key, format) = text.split_once(':').unwrap_or((text, ""));
        let field = Self::lookup(key.trim(), part_fields)?;
        let left = !field.is_integer();
        Self::field_piece(field, key, format, left)
    }

    fn parse_printf_field(
        key: &str,
        format: &str,
        conversion: char,
        part_fields: bool,
    ) -> Result<Piece, String> {
        let field = Self::lookup(key, part_fields)?;
        match conversion {
            's' => {}
            'd' | 'i' if field.is_integer() => {}
            'd' | 'i' => return Err(format!("%({key}){conversion} needs an index key")),
            other => return Err(format!("unsupported conversion '{other}' for %({key})")),
        }
        Self::field_piece(field, key, format, false)
    }

    fn lookup(key: &str, part_fields: bool) -> Result<Field, String> {
        Field::parse(key, part_fields).ok_or_else(|| {
            if part_fields {
                format!("unknown key {{{key}}}, use {{name}}, {{part}}, {{index0}} or {{index1}}")
            } else {
                format!("unknown key {{{key}}}, only {{name}} is available")
            }
        })
    }

    fn field_piece(field: Field, key: &str, format: &str, left: bool) -> Result<Piece, String> {
        let zero_pad = format.starts_with('0') && format.len() > 1;
        let width = if format.is_empty() {
            0
        } else {
            format
                .parse::<usize>()
                .map_err(|_| format!("invalid width {format:?} for {{{key}}}"))?
        };

        if zero_pad && !field.is_integer() {
            return Err(format!("zero padding is only allowed for index keys, not {{{key}}}"));
        }

        Ok(Piece::Field {
            field,
            width,
            zero_pad,
            left,
        })
    }

    /// Render for the part at `index0` within its group.
    pub fn render(&self, name: &str, part: &str, index0: usize) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field {
                    field,
                    width,
                    zero_pad,
                    left,
                } => {
                    let width = *width;
                    let index1 = index0 + 1;
                    let text = match field {
                        Field::Name => name.to_string(),
                        Field::Part => part.to_string(),
                        Field::Index0 => index0.to_string(),
                        Field::Index1 => index1.to_string(),
                    };
                    // writing into a String cannot fail
                    let _ = if *zero_pad {
                        write!(out, "{text:0>width$}")
                    } else if *left {
                        write!(out, "{text:<width$}")
                    } else {
                        write!(out, "{text:>width$}")
                    };
                }
            }
        }
        out
    }

    /// Render a collection-level template.
    pub fn render_collection(&self, name: &str) -> String {
        self.render(name, "", 0)
    }
}
