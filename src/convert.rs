//! The public conversion entry point.
//!
//! [`convert`] is a pure function of the source text, the source dialect and
//! a [`ConversionContext`]. It never panics on bad input and never fails: a
//! fatal condition becomes the single error note of its [`ConversionResult`].

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::notes::{Note, NoteCollector, Severity};
use crate::{fabric, powerquery, tsql};

/// The resolved naming context a conversion runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionContext {
    pub default_catalog: String,
    pub default_schema: String,
    /// Schema holding staged copies of non-SQL M sources.
    pub staging_schema: String,
}

impl ConversionContext {
    pub fn new(catalog: &str, schema: &str) -> Self {
        Self {
            default_catalog: catalog.into(),
            default_schema: schema.into(),
            ..Self::default()
        }
    }

    pub fn with_staging_schema(mut self, schema: &str) -> Self {
        self.staging_schema = schema.into();
        self
    }
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self {
            default_catalog: "main".into(),
            default_schema: "dbo".into(),
            staging_schema: "staging".into(),
        }
    }
}

/// Source dialects the converter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDialect {
    #[serde(rename = "tsql")]
    TSql,
    Fabric,
    #[serde(rename = "m")]
    PowerQuery,
}

impl SourceDialect {
    /// Route by file extension: `.sql` is T-SQL, `.m` and `.pq` are Power Query.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "sql" => Some(SourceDialect::TSql),
            "m" | "pq" => Some(SourceDialect::PowerQuery),
            _ => None,
        }
    }
}

impl fmt::Display for SourceDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceDialect::TSql => "tsql",
            SourceDialect::Fabric => "fabric",
            SourceDialect::PowerQuery => "m",
        };
        f.write_str(s)
    }
}

/// Output of converting one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub dialect: SourceDialect,
    /// `None` when a fatal error aborted the file.
    pub output_sql: Option<String>,
    pub notes: Vec<Note>,
    /// Set when parts of the source were dropped from `output_sql`.
    pub incomplete: bool,
}

impl ConversionResult {
    fn failed(dialect: SourceDialect, note: Note) -> Self {
        Self {
            dialect,
            output_sql: None,
            notes: vec![note],
            incomplete: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.output_sql.is_some()
    }

    pub fn has_errors(&self) -> bool {
        self.notes.iter().any(|n| n.severity == Severity::Error)
    }

    /// Number of notes at the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.notes.iter().filter(|n| n.severity == severity).count()
    }
}

/// Convert one source text into Databricks SQL.
pub fn convert(text: &str, dialect: SourceDialect, context: &ConversionContext) -> ConversionResult {
    let mut notes = NoteCollector::new(text);
    let outcome = match dialect {
        SourceDialect::TSql => tsql::rewrite(text, context, &mut notes).map(|sql| (sql, false)),
        SourceDialect::Fabric => fabric::rewrite(text, context, &mut notes).map(|sql| (sql, false)),
        SourceDialect::PowerQuery => {
            powerquery::convert(text, context, &mut notes).map(|out| (out.sql, out.incomplete))
        }
    };

    match outcome {
        Ok((sql, incomplete)) => {
            let notes = notes.into_notes();
            debug!(%dialect, notes = notes.len(), incomplete, "converted source");
            ConversionResult {
                dialect,
                output_sql: Some(sql),
                notes,
                incomplete,
            }
        }
        Err(err) => {
            warn!(%dialect, code = %err.code(), "conversion aborted: {}", err);
            ConversionResult::failed(dialect, fatal_note(&err, &notes))
        }
    }
}

/// The sole note reported for a fatal error.
fn fatal_note(err: &ConvertError, notes: &NoteCollector<'_>) -> Note {
    let mut note = Note::error(err.code(), err.to_string());
    if let Some(offset) = err.offset() {
        note.offset = Some(offset);
        note.position = Some(notes.position(offset));
    }
    note
}

/// Convert several sources independently. A fatal error in one never
/// affects the others.
pub fn convert_batch<'a>(
    sources: impl IntoIterator<Item = (&'a str, SourceDialect)>,
    context: &ConversionContext,
) -> Vec<ConversionResult> {
    sources
        .into_iter()
        .map(|(text, dialect)| convert(text, dialect, context))
        .collect()
}
