//! T-SQL to Databricks SQL rewriting.
//!
//! Each statement walks a fixed sequence of stages:
//!
//! ```text
//! Lexing → Protecting → StatementCleanup → TypeRewrite → FunctionRewrite
//!        → IdentifierRewrite → ConstraintDemotion → Emit
//! ```
//!
//! Lexing happens once for the whole file; the two fatal lexer conditions
//! abort the file. Every later stage degrades to notes and leaves the tokens
//! it cannot handle untouched.

pub mod constraints;
pub mod functions;
pub mod identifiers;
pub mod lexer;
pub mod rules;
pub mod statements;

use std::fmt;

use tracing::debug;

use crate::convert::ConversionContext;
use crate::error::ConvertResult;
use crate::notes::{Note, NoteCollector};
use crate::sql::{Databricks, SqlDialect};

use lexer::{render, tokenize, Token, TokenKind};
use rules::{apply_rules, RewriteRule, RuleContext, StatementInfo};

/// Rewriter stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexing,
    Protecting,
    StatementCleanup,
    TypeRewrite,
    FunctionRewrite,
    IdentifierRewrite,
    ConstraintDemotion,
    Emit,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::Lexing => Stage::Protecting,
            Stage::Protecting => Stage::StatementCleanup,
            Stage::StatementCleanup => Stage::TypeRewrite,
            Stage::TypeRewrite => Stage::FunctionRewrite,
            Stage::FunctionRewrite => Stage::IdentifierRewrite,
            Stage::IdentifierRewrite => Stage::ConstraintDemotion,
            Stage::ConstraintDemotion | Stage::Emit => Stage::Emit,
        }
    }

    /// The rule category a rewrite stage runs.
    pub fn rule(self) -> Option<RewriteRule> {
        match self {
            Stage::TypeRewrite => Some(RewriteRule::Type),
            Stage::FunctionRewrite => Some(RewriteRule::Function),
            Stage::IdentifierRewrite => Some(RewriteRule::Identifier),
            Stage::ConstraintDemotion => Some(RewriteRule::Constraint),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lexing => "lexing",
            Stage::Protecting => "protecting",
            Stage::StatementCleanup => "statement-cleanup",
            Stage::TypeRewrite => "type-rewrite",
            Stage::FunctionRewrite => "function-rewrite",
            Stage::IdentifierRewrite => "identifier-rewrite",
            Stage::ConstraintDemotion => "constraint-demotion",
            Stage::Emit => "emit",
        };
        f.write_str(s)
    }
}

/// Dialect-specific statement adjustments applied before the shared cleanup.
pub trait StatementOverride: fmt::Debug + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, tokens: Vec<Token>, notes: &mut Vec<Note>) -> Vec<Token>;
}

/// Composes the lexer, the rule passes and the statement cleanup.
#[derive(Debug)]
pub struct TsqlRewriter<'a> {
    context: &'a ConversionContext,
    dialect: &'a dyn SqlDialect,
    overrides: Vec<&'a dyn StatementOverride>,
}

impl<'a> TsqlRewriter<'a> {
    pub fn new(context: &'a ConversionContext) -> Self {
        Self {
            context,
            dialect: &Databricks,
            overrides: Vec::new(),
        }
    }

    pub fn with_dialect(mut self, dialect: &'a dyn SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_override(mut self, hook: &'a dyn StatementOverride) -> Self {
        self.overrides.push(hook);
        self
    }

    /// Rewrite a whole file.
    pub fn rewrite(&self, source: &str, notes: &mut NoteCollector<'_>) -> ConvertResult<String> {
        debug!(stage = %Stage::Lexing, bytes = source.len(), "t-sql stage");
        let tokens = tokenize(source)?;
        let statements = statements::split(tokens);
        debug!(statements = statements.len(), "split t-sql source");

        let mut out = String::with_capacity(source.len());
        for statement in statements {
            out.push_str(&self.rewrite_statement(statement, notes));
        }
        Ok(out)
    }

    fn rewrite_statement(&self, mut tokens: Vec<Token>, notes: &mut NoteCollector<'_>) -> String {
        let mut info = StatementInfo::default();
        let mut stage = Stage::Protecting;
        loop {
            debug!(stage = %stage, tokens = tokens.len(), "t-sql stage");
            let mut stage_notes = Vec::new();
            tokens = match stage {
                Stage::Lexing => tokens,
                Stage::Protecting => protect(tokens),
                Stage::StatementCleanup => {
                    for hook in &self.overrides {
                        tokens = hook.apply(tokens, &mut stage_notes);
                    }
                    let tokens = statements::cleanup(tokens, &mut stage_notes);
                    info = StatementInfo::analyze(&tokens);
                    tokens
                }
                Stage::TypeRewrite
                | Stage::FunctionRewrite
                | Stage::IdentifierRewrite
                | Stage::ConstraintDemotion => {
                    let ctx = RuleContext {
                        catalog: &self.context.default_catalog,
                        schema: &self.context.default_schema,
                        dialect: self.dialect,
                        statement: &info,
                    };
                    match stage.rule() {
                        Some(rule) => {
                            let (tokens, rule_notes) = apply_rules(tokens, rule, &ctx);
                            stage_notes = rule_notes;
                            tokens
                        }
                        None => tokens,
                    }
                }
                Stage::Emit => return render(&tokens),
            };
            notes.extend(stage_notes);
            stage = stage.next();
        }
    }
}

/// Comments and string literals are never rewritten.
fn protect(mut tokens: Vec<Token>) -> Vec<Token> {
    for tok in &mut tokens {
        if matches!(tok.kind, TokenKind::Comment | TokenKind::QuotedString) {
            tok.protected = true;
        }
    }
    tokens
}

/// Rewrite T-SQL source with the default Databricks dialect.
pub fn rewrite(
    source: &str,
    context: &ConversionContext,
    notes: &mut NoteCollector<'_>,
) -> ConvertResult<String> {
    TsqlRewriter::new(context).rewrite(source, notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::notes::NoteCode;

    fn convert(sql: &str) -> (String, Vec<Note>) {
        let context = ConversionContext::new("cat", "dbo");
        let mut notes = NoteCollector::new(sql);
        let out = rewrite(sql, &context, &mut notes).unwrap();
        (out, notes.into_notes())
    }

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Lexing;
        let mut seen = vec![stage];
        while stage != Stage::Emit {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(Stage::Emit.next(), Stage::Emit);
    }

    #[test]
    fn test_full_select() {
        let (sql, notes) = convert(
            "SELECT TOP 5 [c].[Name], ISNULL(c.Region, 'n/a') AS Region\n\
             FROM [dbo].[Customer] c WITH (NOLOCK)\n\
             WHERE c.CreatedAt > DATEADD(day, -7, GETDATE())\n\
             ORDER BY c.Name;",
        );
        assert_eq!(
            sql,
            "SELECT c.Name, COALESCE(c.Region, 'n/a') AS Region\n\
             FROM cat.dbo.Customer c\n\
             WHERE c.CreatedAt > CURRENT_TIMESTAMP() - INTERVAL 7 DAYS\n\
             ORDER BY c.Name LIMIT 5;"
        );
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].code, NoteCode::HintRemoved);
    }

    #[test]
    fn test_comments_and_strings_protected() {
        let source = "-- GETDATE() in a comment\nSELECT 'ISNULL(a, b)' AS s /* [dbo].[x] */";
        let (sql, notes) = convert(source);
        assert_eq!(sql, source);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_nested_comment_is_not_rewritten() {
        let (sql, notes) = convert("SELECT a /* x /* GETDATE() */ ISNULL(a,b) */ FROM t");
        assert_eq!(sql, "SELECT a /* x /* GETDATE() */ ISNULL(a,b) */ FROM cat.dbo.t");
        assert!(notes.is_empty());
    }

    #[test]
    fn test_fatal_lexer_error_aborts() {
        let context = ConversionContext::default();
        let mut notes = NoteCollector::new("SELECT [oops");
        let err = rewrite("SELECT [oops", &context, &mut notes).unwrap_err();
        assert_eq!(err, ConvertError::UnterminatedBracket { offset: 7 });
    }

    #[test]
    fn test_note_positions_are_file_relative() {
        let (_, notes) = convert("SELECT 1;\nSELECT ISNULL(a) FROM t;");
        assert_eq!(notes.len(), 1);
        let pos = notes[0].position.unwrap();
        assert_eq!((pos.line, pos.column), (2, 8));
    }
}
