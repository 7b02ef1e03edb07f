//! Target SQL dialect definitions and formatting rules.
//!
//! Every piece of generated SQL, whether produced by the T-SQL rewriter as
//! replacement text or by the M compiler as a whole statement, is rendered
//! through a `SqlDialect`:
//!
//! - Identifier quoting: backticks, applied only when a name needs it
//! - Boolean, NULL, date and interval literals
//! - Identity columns and table format clauses
//! - Current date function spelling
//!
//! # Usage
//!
//! ```ignore
//! use lakeshift::sql::dialect::{Databricks, SqlDialect};
//!
//! let quoted = Databricks.render_identifier("Order");  // `Order`
//! let plain = Databricks.render_identifier("Customer"); // Customer
//! ```

mod databricks;
pub mod helpers;

pub use databricks::Databricks;

use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug + Sync {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier unconditionally.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Whether `word` is reserved and must be quoted when used as a name.
    fn is_reserved(&self, word: &str) -> bool;

    /// Whether an identifier must be quoted to round-trip.
    fn needs_quoting(&self, ident: &str) -> bool {
        !helpers::is_plain_identifier(ident) || self.is_reserved(ident)
    }

    /// Render an identifier, quoting only when required.
    fn render_identifier(&self, ident: &str) -> String {
        if self.needs_quoting(ident) {
            self.quote_identifier(ident)
        } else {
            ident.to_string()
        }
    }

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    // =========================================================================
    // Date/Time
    // =========================================================================

    /// Format a date literal: `DATE 'YYYY-MM-DD'`.
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE '{}'", date)
    }

    /// Format an interval literal, e.g. `INTERVAL 7 DAYS`.
    fn format_interval(&self, amount: &str, unit: &str) -> String {
        format!("INTERVAL {} {}", amount, unit)
    }

    /// Current date expression.
    fn current_date(&self) -> &'static str {
        "CURRENT_DATE()"
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit a LIMIT clause.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(limit as i64));
        ts
    }

    // =========================================================================
    // DDL Support
    // =========================================================================

    /// Emit identity/auto-increment syntax.
    fn emit_identity(&self, start: i64, increment: i64) -> TokenStream;

    /// Storage format clause appended to CREATE TABLE, if any.
    fn table_format_clause(&self) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_identifier_quotes_only_when_needed() {
        assert_eq!(Databricks.render_identifier("Customer"), "Customer");
        assert_eq!(Databricks.render_identifier("Order"), "`Order`");
        assert_eq!(Databricks.render_identifier("Order Date"), "`Order Date`");
        assert_eq!(Databricks.render_identifier("2024_sales"), "`2024_sales`");
    }

    #[test]
    fn test_literals() {
        assert_eq!(Databricks.format_bool(true), "true");
        assert_eq!(Databricks.quote_string("it's"), "'it''s'");
        assert_eq!(Databricks.format_date_literal("2024-01-31"), "DATE '2024-01-31'");
        assert_eq!(Databricks.format_interval("7", "DAYS"), "INTERVAL 7 DAYS");
    }

    #[test]
    fn test_identity() {
        let sql = Databricks.emit_identity(1, 1).serialize(&Databricks);
        assert_eq!(
            sql,
            "GENERATED ALWAYS AS IDENTITY (START WITH 1 INCREMENT BY 1)"
        );
    }

    #[test]
    fn test_limit() {
        assert_eq!(Databricks.emit_limit(10).serialize(&Databricks), "LIMIT 10");
    }
}
