//! Power Query M to Databricks SQL.
//!
//! Conversion runs in three phases:
//!
//! 1. [`parser`] reads the `let ... in ...` document into an [`ast::MDocument`]
//! 2. [`graph`] turns bindings into steps and validates the step graph
//! 3. [`compiler`] walks the output chain and emits a single SELECT
//!
//! Phases 1 and 2 fail the whole file. Phase 3 only degrades: steps and
//! conditions it cannot express are reported and skipped.

pub mod ast;
pub mod compiler;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod predicate;

pub use graph::{MPipeline, MStep, StepKind};

use tracing::debug;

use crate::convert::ConversionContext;
use crate::error::ConvertResult;
use crate::notes::NoteCollector;

/// SQL compiled from an M query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MOutput {
    pub sql: String,
    /// Set when a step or condition was dropped.
    pub incomplete: bool,
}

/// Convert one M document.
pub fn convert(
    source: &str,
    context: &ConversionContext,
    notes: &mut NoteCollector<'_>,
) -> ConvertResult<MOutput> {
    let doc = parser::parse(source)?;
    let pipeline = MPipeline::build(source, doc)?;
    debug!(
        steps = pipeline.steps().len(),
        output = pipeline.output(),
        "built m step graph"
    );
    compiler::compile(&pipeline, context, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteCode;

    fn run(src: &str) -> (MOutput, Vec<NoteCode>) {
        let context = ConversionContext::default();
        let mut notes = NoteCollector::new(src);
        let out = convert(src, &context, &mut notes).unwrap();
        (out, notes.iter().map(|n| n.code).collect())
    }

    #[test]
    fn test_sql_database_table() {
        let (out, codes) = run(
            r#"let
    Source = Sql.Database("srv", "Sales"),
    dbo_Orders = Source{[Schema="dbo",Item="Orders"]}[Data],
    #"Kept" = Table.SelectColumns(dbo_Orders, {"OrderId", "Amount"})
in
    #"Kept""#,
        );
        insta::assert_snapshot!(out.sql, @r"
        SELECT
          OrderId,
          Amount
        FROM main.dbo.Orders;
        ");
        assert!(!out.incomplete);
        assert_eq!(codes, vec![NoteCode::CatalogReplaced]);
    }

    #[test]
    fn test_unknown_step_skipped() {
        let (out, codes) = run(
            r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="T"]}[Data],
    Added = Table.AddColumn(T, "C", each [A] + 1)
in
    Added"#,
        );
        insta::assert_snapshot!(out.sql, @r"
        SELECT
          *
        FROM main.dbo.T;
        ");
        assert!(out.incomplete);
        assert_eq!(codes, vec![NoteCode::UnsupportedConstruct]);
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let context = ConversionContext::default();
        let src = "let Source = in Source";
        let mut notes = NoteCollector::new(src);
        assert!(convert(src, &context, &mut notes).is_err());
    }
}
