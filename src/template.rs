//! Prompt templates with placeholders and conditional clauses
//!
//! Syntax:
//!
//! - `{name}` or `{a.b}` substitutes a context parameter
//! - `{?flag:text}` emits `text` when the boolean `flag` is true, nothing otherwise
//! - `{?flag:yes|no}` picks one of two clauses
//! - `{{` and `}}` are literal braces
//!
//! Templates are parsed once and every referenced parameter is checked when
//! they are rendered, so a missing parameter is never silently blank.

use std::collections::BTreeSet;

use crate::context::PipelineContext;
use crate::error::{BroodError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Param(String),
    Clause {
        flag: String,
        then: String,
        otherwise: String,
    },
}

/// A parsed prompt template
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every parameter the template reads, flags included
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(_) => None,
                Segment::Param(name) => Some(name.as_str()),
                Segment::Clause { flag, .. } => Some(flag.as_str()),
            })
            .collect()
    }

    /// Resolve the template against a context
    ///
    /// `stage` is only used to label errors.
    pub fn render(&self, ctx: &PipelineContext, stage: &str) -> Result<String> {
        // Report the first missing parameter in name order so the error is stable.
        if let Some(missing) = self.placeholders().into_iter().find(|name| !ctx.contains(name)) {
            return Err(BroodError::MissingParameter {
                name: missing.to_string(),
                stage: stage.to_string(),
            });
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Param(name) => out.push_str(&ctx.render(name, stage)?),
                Segment::Clause { flag, then, otherwise } => {
                    if ctx.flag(flag, stage)? {
                        out.push_str(then);
                    } else {
                        out.push_str(otherwise);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn parse_segments(source: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                text.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(BroodError::Template(format!(
                                "nested `{{` in placeholder starting at byte {pos}"
                            )))
                        }
                        c => body.push(c),
                    }
                }
                if !closed {
                    return Err(BroodError::Template(format!(
                        "unterminated placeholder starting at byte {pos}"
                    )));
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(parse_placeholder(&body, pos)?);
            }
            '}' => {
                return Err(BroodError::Template(format!("unmatched `}}` at byte {pos}")));
            }
            c => text.push(c),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn parse_placeholder(body: &str, pos: usize) -> Result<Segment> {
    if let Some(clause) = body.strip_prefix('?') {
        let (flag, branches) = clause.split_once(':').ok_or_else(|| {
            BroodError::Template(format!("clause at byte {pos} needs `flag:text`"))
        })?;
        let (then, otherwise) = branches.split_once('|').unwrap_or((branches, ""));
        return Ok(Segment::Clause {
            flag: checked_name(flag, pos)?,
            then: then.to_string(),
            otherwise: otherwise.to_string(),
        });
    }
    Ok(Segment::Param(checked_name(body, pos)?))
}

fn checked_name(name: &str, pos: usize) -> Result<String> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if valid {
        Ok(name.to_string())
    } else {
        Err(BroodError::Template(format!(
            "invalid parameter name `{name}` at byte {pos}"
        )))
    }
}
