//! Message templates with `{Column}` placeholders.
//!
//! A template is parsed once into literal and placeholder segments. `{{` and
//! `}}` stand for literal braces. Rendering looks each placeholder up by
//! column name and fails on names the row does not have.

use std::collections::HashMap;

use crate::errors::RenderError;
use crate::table::CellValue;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A value that can be substituted into a template.
pub trait TemplateValue {
    fn write_to(&self, out: &mut String);
}

impl TemplateValue for str {
    fn write_to(&self, out: &mut String) {
        out.push_str(self);
    }
}

impl TemplateValue for &str {
    fn write_to(&self, out: &mut String) {
        out.push_str(self);
    }
}

impl TemplateValue for String {
    fn write_to(&self, out: &mut String) {
        out.push_str(self);
    }
}

/// Absent values render as the empty string.
impl<T: TemplateValue> TemplateValue for Option<T> {
    fn write_to(&self, out: &mut String) {
        if let Some(value) = self {
            value.write_to(out);
        }
    }
}

impl TemplateValue for CellValue {
    fn write_to(&self, out: &mut String) {
        out.push_str(&self.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, RenderError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((position, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(RenderError::UnclosedPlaceholder(position)),
                            _ => name.push(inner),
                        }
                    }
                    if !closed {
                        return Err(RenderError::UnclosedPlaceholder(position));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(RenderError::UnmatchedBrace(position)),
                _ => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Checks that every placeholder names one of `header`'s columns.
    pub fn check<H: AsRef<str>>(&self, header: &[H]) -> Result<(), RenderError> {
        for name in self.placeholders() {
            if !header.iter().any(|column| column.as_ref() == name) {
                return Err(RenderError::UnknownPlaceholder(name.to_string()));
            }
        }
        Ok(())
    }

    /// Renders the template for one row, `header` and `row` being positionally
    /// aligned. Duplicate header names resolve to the first column.
    pub fn render<H, V>(&self, header: &[H], row: &[V]) -> Result<String, RenderError>
    where
        H: AsRef<str>,
        V: TemplateValue,
    {
        if header.len() != row.len() {
            return Err(RenderError::LengthMismatch {
                header: header.len(),
                row: row.len(),
            });
        }

        let mut columns: HashMap<&str, usize> = HashMap::with_capacity(header.len());
        for (index, column) in header.iter().enumerate() {
            columns.entry(column.as_ref()).or_insert(index);
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let index = columns
                        .get(name.as_str())
                        .ok_or_else(|| RenderError::UnknownPlaceholder(name.clone()))?;
                    row[*index].write_to(&mut out);
                }
            }
        }
        Ok(out)
    }
}

/// Parses `template` and renders it against one row.
pub fn render<H, V>(template: &str, header: &[H], row: &[V]) -> Result<String, RenderError>
where
    H: AsRef<str>,
    V: TemplateValue,
{
    Template::parse(template)?.render(header, row)
}
