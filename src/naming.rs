//! File and folder naming templates.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::feed::Subject;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z]+)(?::0?(\d+))?\}").expect("valid regex"));

/// Produces the file stem for a lecture.
///
/// Implemented by [`NameTemplate`] and by any matching closure, so callers
/// can plug in their own naming scheme.
pub trait LectureNamer: Send + Sync {
    /// Returns the file name without extension.
    fn stem(&self, subject: &Subject, week: u8, ordinal: u32) -> String;
}

impl<F> LectureNamer for F
where
    F: Fn(&Subject, u8, u32) -> String + Send + Sync,
{
    fn stem(&self, subject: &Subject, week: u8, ordinal: u32) -> String {
        self(subject, week, ordinal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Code,
    Name,
    Week,
    Ordinal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { field: Field, width: usize },
}

/// A parsed naming template such as `{code} Week {week:02} Lecture {ordinal}`.
///
/// Placeholders: `{code}`, `{name}`, `{week}`, `{ordinal}`. A `:0N` suffix
/// zero-pads numbers to `N` digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parses a lecture name template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown placeholders or unbalanced braces.
    pub fn parse(template: &str) -> Result<Self> {
        Self::parse_allowing(template, &[Field::Code, Field::Name, Field::Week, Field::Ordinal])
    }

    /// Parses a subject folder template, which may only use `{code}` and `{name}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for any other placeholder.
    pub fn parse_subject(template: &str) -> Result<Self> {
        Self::parse_allowing(template, &[Field::Code, Field::Name])
    }

    fn parse_allowing(template: &str, allowed: &[Field]) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(template) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            push_literal(&mut segments, &template[last..whole.start], template)?;
            last = whole.end;

            let field = match &caps[1] {
                "code" => Field::Code,
                "name" => Field::Name,
                "week" => Field::Week,
                "ordinal" => Field::Ordinal,
                other => {
                    return Err(Error::Config(format!(
                        "unknown placeholder {{{other}}} in {template:?}"
                    )));
                }
            };
            if !allowed.contains(&field) {
                return Err(Error::Config(format!(
                    "placeholder {{{}}} cannot be used in {template:?}",
                    &caps[1]
                )));
            }
            let width = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            segments.push(Segment::Field { field, width });
        }
        push_literal(&mut segments, &template[last..], template)?;

        if segments.is_empty() {
            return Err(Error::Config("name template cannot be empty".to_string()));
        }
        Ok(Self { segments })
    }

    /// Renders the template. Path separators in the result are replaced.
    #[must_use]
    pub fn render(&self, subject: &Subject, week: u8, ordinal: u32) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                &Segment::Field { field, width } => {
                    let value = match field {
                        Field::Code => subject.code.clone(),
                        Field::Name => subject.name.clone(),
                        Field::Week => format!("{week:0width$}"),
                        Field::Ordinal => format!("{ordinal:0width$}"),
                    };
                    out.push_str(&value);
                }
            }
        }
        sanitize(&out)
    }

    /// Renders a subject folder name.
    #[must_use]
    pub fn render_subject(&self, subject: &Subject) -> String {
        self.render(subject, 0, 0)
    }
}

impl LectureNamer for NameTemplate {
    fn stem(&self, subject: &Subject, week: u8, ordinal: u32) -> String {
        self.render(subject, week, ordinal)
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str, template: &str) -> Result<()> {
    if text.contains('{') || text.contains('}') {
        return Err(Error::Config(format!("malformed placeholder in {template:?}")));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "-").trim().to_string()
}
