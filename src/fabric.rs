//! Fabric Datamart adapter.
//!
//! Datamarts speak T-SQL, so conversion runs the T-SQL rewriter with a
//! [`StatementOverride`] hook in front of the shared statement cleanup.
//! [`FabricOverrides`] is the identity today; Fabric-only keywords get
//! handled there as they turn up.

use tracing::debug;

use crate::convert::ConversionContext;
use crate::error::ConvertResult;
use crate::notes::{Note, NoteCode, NoteCollector};
use crate::tsql::lexer::Token;
use crate::tsql::{StatementOverride, TsqlRewriter};

/// Fabric-specific statement adjustments.
#[derive(Debug, Default, Clone, Copy)]
pub struct FabricOverrides;

impl StatementOverride for FabricOverrides {
    fn name(&self) -> &'static str {
        "fabric"
    }

    fn apply(&self, tokens: Vec<Token>, _notes: &mut Vec<Note>) -> Vec<Token> {
        tokens
    }
}

/// Rewrite Fabric Datamart SQL with the default overrides.
pub fn rewrite(
    source: &str,
    context: &ConversionContext,
    notes: &mut NoteCollector<'_>,
) -> ConvertResult<String> {
    rewrite_with(source, context, &FabricOverrides, notes)
}

/// Rewrite Fabric Datamart SQL with a caller-supplied override.
pub fn rewrite_with(
    source: &str,
    context: &ConversionContext,
    overrides: &dyn StatementOverride,
    notes: &mut NoteCollector<'_>,
) -> ConvertResult<String> {
    debug!(hook = overrides.name(), "fabric datamart via t-sql rewriter");
    let sql = TsqlRewriter::new(context)
        .with_override(overrides)
        .rewrite(source, notes)?;
    notes.push(Note::info(
        NoteCode::FabricPassthrough,
        "Fabric Datamart SQL converted with the T-SQL rules",
    ));
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tsql::lexer::TokenKind;

    fn run(sql: &str, overrides: &dyn StatementOverride) -> (String, Vec<Note>) {
        let ctx = ConversionContext::new("cat", "dbo");
        let mut notes = NoteCollector::new(sql);
        let out = rewrite_with(sql, &ctx, overrides, &mut notes).unwrap();
        (out, notes.into_notes())
    }

    #[test]
    fn test_matches_tsql_output() {
        let sql = "SELECT ISNULL(a, 0) FROM [dbo].[Sales]";
        let ctx = ConversionContext::new("cat", "dbo");
        let mut tsql_notes = NoteCollector::new(sql);
        let expected = crate::tsql::rewrite(sql, &ctx, &mut tsql_notes).unwrap();

        let (out, notes) = run(sql, &FabricOverrides);
        assert_eq!(out, expected);
        assert_eq!(notes.last().map(|n| n.code), Some(NoteCode::FabricPassthrough));
    }

    #[derive(Debug)]
    struct DropComments;

    impl StatementOverride for DropComments {
        fn name(&self) -> &'static str {
            "drop-comments"
        }

        fn apply(&self, tokens: Vec<Token>, notes: &mut Vec<Note>) -> Vec<Token> {
            let before = tokens.len();
            let kept: Vec<Token> = tokens
                .into_iter()
                .filter(|t| t.kind != TokenKind::Comment)
                .collect();
            if kept.len() != before {
                notes.push(Note::info(NoteCode::StatementRemoved, "comment dropped"));
            }
            kept
        }
    }

    #[test]
    fn test_custom_override_runs_first() {
        let (out, notes) = run("SELECT 1 /* note */", &DropComments);
        assert_eq!(out, "SELECT 1 ");
        assert_eq!(notes[0].code, NoteCode::StatementRemoved);
    }
}
