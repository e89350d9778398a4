//! Error surface.
//!
//! Everything that can go wrong falls into one of the [ErrorKind]
//! categories: the lexer and parser fail with positions, the collectors
//! fail on schema questions (unknown columns, wildcards without a
//! resolver), the transformers fail on domain rules, and the renamers on
//! cursor/conflict problems. Formatting never fails for a well-formed
//! tree, so [ErrorKind::Format] is reserved.
//!
//! Internally everything travels as [Error] inside `anyhow::Result`; at
//! the public boundary [downcast] flattens whatever surfaced into
//! [ErrorMessages], and [ErrorMessages::composed] decorates each entry
//! with a line/column location and an annotated source snippet.

pub use anyhow::Result;

use ariadne::{Cache, Config, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::{Add, Range};

/// Byte range within the source text.
#[derive(Clone, PartialEq, Eq, Copy, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}..{}", self.start, self.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// Spans of sibling tokens merge into the covering range.
impl Add<Span> for Span {
    type Output = Span;

    fn add(self, rhs: Span) -> Span {
        Span {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

/// The failure category, per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Unterminated strings/comments, bad characters.
    Lex,
    /// Unexpected tokens, missing clauses.
    Parse,
    /// Unknown or ambiguous columns, wildcards without a resolver,
    /// aliases where real table names are required.
    Schema,
    /// A transformer's domain rule was violated.
    Transform,
    /// Cursor or conflict problems while renaming.
    Rename,
    /// Reserved; the formatter has no failure modes today.
    Format,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Lex => "lex",
            ErrorKind::Parse => "parse",
            ErrorKind::Schema => "schema",
            ErrorKind::Transform => "transform",
            ErrorKind::Rename => "rename",
            ErrorKind::Format => "format",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl Error {
    fn of(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            span: None,
            help: None,
        }
    }

    pub fn lex(message: impl Into<String>) -> Self {
        Error::of(ErrorKind::Lex, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::of(ErrorKind::Parse, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::of(ErrorKind::Schema, message)
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Error::of(ErrorKind::Transform, message)
    }

    pub fn rename(message: impl Into<String>) -> Self {
        Error::of(ErrorKind::Rename, message)
    }

    /// The parser's bread-and-butter failure.
    pub fn expected(expected: &str, found: &str) -> Self {
        Error::parse(format!("expected {expected}, found {found}"))
    }

    pub fn unexpected(found: &str) -> Self {
        Error::parse(format!("unexpected {found}"))
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

// The plain message only; the category and position travel next to it and
// are rendered by the boundary types below. Transformer tests match on
// these messages verbatim.
impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// Needed for anyhow
impl StdError for Error {}

/// One boundary-ready message: plain text plus everything a caller needs
/// to present it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    /// The failure category's label (`lex`, `parse`, …).
    pub code: Option<&'static str>,
    /// Plain text of the error.
    pub reason: String,
    /// A suggestion of how to fix it, when one exists.
    pub hint: Option<String>,
    /// Byte range of the origin within the source.
    pub span: Option<Span>,
    /// Annotated source snippet, filled in by [ErrorMessages::composed].
    pub display: Option<String>,
    /// Line/column (0-based) of the origin, filled in by
    /// [ErrorMessages::composed].
    pub location: Option<SourceLocation>,
}

/// `(line, column)` pair, 0-based, as resolved against the source text.
#[derive(Debug, Clone, Serialize)]
pub struct SourceLocation {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.display {
            // ariadne pads line ends; strip that so messages embed cleanly
            Some(display) => {
                let trimmed = display
                    .lines()
                    .map(str::trim_end)
                    .collect::<Vec<_>>()
                    .join("\n");
                f.write_str(&trimmed)
            }
            None => f.write_str(&self.reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessages {
    pub inner: Vec<ErrorMessage>,
}

impl From<ErrorMessage> for ErrorMessages {
    fn from(message: ErrorMessage) -> Self {
        ErrorMessages {
            inner: vec![message],
        }
    }
}

impl Display for ErrorMessages {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for message in &self.inner {
            Display::fmt(message, f)?;
        }
        Ok(())
    }
}

impl StdError for ErrorMessages {}

/// Flatten whatever error surfaced into boundary messages. A crate
/// [Error] keeps its category and span; anything foreign (serde, etc.)
/// degrades to its display text.
pub fn downcast(error: anyhow::Error) -> ErrorMessages {
    let error = match error.downcast::<ErrorMessages>() {
        Ok(messages) => return messages,
        Err(other) => other,
    };

    let message = match error.downcast::<Error>() {
        Ok(error) => ErrorMessage {
            code: Some(error.kind.label()),
            reason: error.message,
            hint: error.help,
            span: error.span,
            display: None,
            location: None,
        },
        Err(foreign) => ErrorMessage {
            code: None,
            reason: format!("{foreign:#}"),
            hint: None,
            span: None,
            display: None,
            location: None,
        },
    };
    message.into()
}

impl ErrorMessages {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// Resolve each message's location against the source and build the
    /// annotated display.
    pub fn composed(mut self, source_id: &str, source: &str, color: bool) -> Self {
        for message in &mut self.inner {
            let source = Source::from(source);
            message.location = message.compose_location(&source);
            message.display = message.compose_display(source_id, (source_id, source), color);
        }
        self
    }
}

impl ErrorMessage {
    fn compose_display<'a, C>(&self, source_id: &'a str, cache: C, color: bool) -> Option<String>
    where
        C: Cache<&'a str>,
    {
        let span = Range::from(self.span?);
        let headline = match self.code {
            Some(code) => format!("{code} error"),
            None => "error".to_string(),
        };

        let mut report = Report::build(ReportKind::Error, source_id, span.start)
            .with_config(Config::default().with_color(color))
            .with_message(headline)
            .with_label(Label::new((source_id, span)).with_message(&self.reason));
        if let Some(hint) = &self.hint {
            report.set_help(hint);
        }

        let mut out = Vec::new();
        report.finish().write(cache, &mut out).ok()?;
        String::from_utf8(out).ok()
    }

    fn compose_location(&self, source: &Source) -> Option<SourceLocation> {
        let span = self.span?;
        let start = source.get_offset_line(span.start)?;
        let end = source.get_offset_line(span.end)?;
        Some(SourceLocation {
            start: (start.1, start.2),
            end: (end.1, end.2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_keeps_category_and_span() {
        let error = Error::parse("expected `FROM`, found `;`").with_span(Some(Span {
            start: 9,
            end: 10,
        }));
        let messages = downcast(anyhow::Error::from(error));
        assert_eq!(messages.inner[0].code, Some("parse"));
        assert_eq!(messages.inner[0].span.map(|s| s.start), Some(9));
    }

    #[test]
    fn composed_resolves_locations() {
        let error = Error::lex("unterminated string literal").with_span(Some(Span {
            start: 10,
            end: 11,
        }));
        let messages =
            downcast(anyhow::Error::from(error)).composed("", "select 1\n'oops", false);
        let location = messages.inner[0].location.as_ref().unwrap();
        assert_eq!(location.start.0, 1);
    }

    #[test]
    fn spans_merge_to_the_covering_range() {
        let merged = Span { start: 4, end: 7 } + Span { start: 1, end: 5 };
        assert_eq!((merged.start, merged.end), (1, 7));
    }
}
