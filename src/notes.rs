//! Structured conversion notes.
//!
//! Every rewrite that loses information, guesses, or gives up leaves a [`Note`]
//! behind. Notes carry a stable [`NoteCode`] so report tooling can filter and
//! count them, and a [`SourcePosition`] so users can find the original text.
//!
//! The [`NoteCollector`] is append-only and never deduplicates: the same
//! warning at two different positions is two pieces of remediation work.

use serde::Serialize;
use std::fmt;

/// How serious a note is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Unsupported,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Unsupported => "unsupported",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Stable identifier for a kind of note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteCode {
    // Fatal
    UnterminatedBracket,
    MalformedLiteral,
    UnresolvedStepReference,
    CyclicStepDependency,
    MSyntaxError,

    // Non-fatal
    UnmappedType,
    UnsupportedConstruct,
    ExternalSourceAssumed,
    ConstraintDemoted,
    StatementRemoved,
    HintRemoved,
    CatalogReplaced,
    StyleDropped,
    FabricPassthrough,
}

impl NoteCode {
    /// The serialized form, e.g. `UNMAPPED_TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCode::UnterminatedBracket => "UNTERMINATED_BRACKET",
            NoteCode::MalformedLiteral => "MALFORMED_LITERAL",
            NoteCode::UnresolvedStepReference => "UNRESOLVED_STEP_REFERENCE",
            NoteCode::CyclicStepDependency => "CYCLIC_STEP_DEPENDENCY",
            NoteCode::MSyntaxError => "M_SYNTAX_ERROR",
            NoteCode::UnmappedType => "UNMAPPED_TYPE",
            NoteCode::UnsupportedConstruct => "UNSUPPORTED_CONSTRUCT",
            NoteCode::ExternalSourceAssumed => "EXTERNAL_SOURCE_ASSUMED",
            NoteCode::ConstraintDemoted => "CONSTRAINT_DEMOTED",
            NoteCode::StatementRemoved => "STATEMENT_REMOVED",
            NoteCode::HintRemoved => "HINT_REMOVED",
            NoteCode::CatalogReplaced => "CATALOG_REPLACED",
            NoteCode::StyleDropped => "STYLE_DROPPED",
            NoteCode::FabricPassthrough => "FABRIC_PASSTHROUGH",
        }
    }
}

impl fmt::Display for NoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based line and column in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single diagnostic produced during conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub severity: Severity,
    pub code: NoteCode,
    pub message: String,
    /// Byte offset into the source, when known.
    #[serde(skip)]
    pub offset: Option<usize>,
    pub position: Option<SourcePosition>,
}

impl Note {
    pub fn new(severity: Severity, code: NoteCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            offset: None,
            position: None,
        }
    }

    pub fn info(code: NoteCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub fn warning(code: NoteCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(Severity::Unsupported, NoteCode::UnsupportedConstruct, message)
    }

    pub fn error(code: NoteCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Anchor the note at a byte offset.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{} [{}] {}: {}", self.severity, self.code, pos, self.message),
            None => write!(f, "{} [{}] {}", self.severity, self.code, self.message),
        }
    }
}

/// Ordered, append-only note sink for one source file.
#[derive(Debug)]
pub struct NoteCollector<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
    notes: Vec<Note>,
}

impl<'src> NoteCollector<'src> {
    pub fn new(source: &'src str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
            notes: Vec::new(),
        }
    }

    /// Append a note, resolving its offset to a line and column.
    pub fn push(&mut self, mut note: Note) {
        if let Some(offset) = note.offset {
            note.position = Some(self.position(offset));
        }
        self.notes.push(note);
    }

    pub fn extend(&mut self, notes: impl IntoIterator<Item = Note>) {
        for note in notes {
            self.push(note);
        }
    }

    /// Resolve a byte offset. Offsets past the end clamp to the last position.
    pub fn position(&self, offset: usize) -> SourcePosition {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start)
            + 1;
        SourcePosition {
            line: line + 1,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn into_notes(self) -> Vec<Note> {
        self.notes
    }
}
