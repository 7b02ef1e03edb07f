//! Databricks (Spark SQL) dialect.
//!
//! Databricks features:
//! - Backtick identifier quoting
//! - Delta Lake table format
//! - Unity Catalog three-level names
//! - `GENERATED ALWAYS AS IDENTITY` columns

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;

/// Databricks (Spark SQL) dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Databricks;

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn is_reserved(&self, word: &str) -> bool {
        helpers::is_reserved_databricks(word)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn emit_identity(&self, start: i64, increment: i64) -> TokenStream {
        helpers::emit_identity_generated(start, increment)
    }

    fn table_format_clause(&self) -> Option<&'static str> {
        Some("USING DELTA")
    }
}
