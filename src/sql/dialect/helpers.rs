//! Shared helper functions for SQL dialect implementations.
//!
//! Small building blocks the `SqlDialect` implementations compose, kept free
//! functions so the identifier normalizer and the constraint rewriter can
//! reach them without a dialect value in hand.

use std::collections::HashSet;
use std::sync::LazyLock;

use super::super::token::{Token, TokenStream};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with backticks.
/// Used by: Spark/Databricks
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// True when the identifier only contains `[A-Za-z0-9_]` and does not start
/// with a digit.
pub fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// =============================================================================
// Reserved Words
// =============================================================================

/// Databricks SQL reserved words (ANSI mode).
const DATABRICKS_RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "ANY", "ARRAY", "AS", "AUTHORIZATION", "BETWEEN", "BOTH", "BY",
    "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "CUBE",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "DELETE",
    "DESCRIBE", "DISTINCT", "DROP", "ELSE", "END", "ESCAPE", "EXCEPT", "EXISTS", "FALSE",
    "FETCH", "FILTER", "FOR", "FOREIGN", "FROM", "FULL", "FUNCTION", "GLOBAL", "GRANT", "GROUP",
    "GROUPING", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTERVAL", "INTO", "IS", "JOIN",
    "LATERAL", "LEADING", "LEFT", "LIKE", "LIMIT", "LOCAL", "NATURAL", "NOT", "NULL", "OF", "ON",
    "ONLY", "OR", "ORDER", "OUTER", "OVERLAPS", "PARTITION", "POSITION", "PRIMARY", "RANGE",
    "REFERENCES", "REVOKE", "RIGHT", "ROLLUP", "ROW", "ROWS", "SELECT", "SESSION_USER", "SET",
    "SOME", "START", "TABLE", "TABLESAMPLE", "THEN", "TIME", "TO", "TRAILING", "TRUE",
    "TRUNCATE", "UNION", "UNIQUE", "UNKNOWN", "UPDATE", "USER", "USING", "VALUES", "WHEN",
    "WHERE", "WINDOW", "WITH",
];

static DATABRICKS_RESERVED_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| DATABRICKS_RESERVED.iter().copied().collect());

/// Case-insensitive reserved word check for Databricks.
pub fn is_reserved_databricks(word: &str) -> bool {
    DATABRICKS_RESERVED_SET.contains(word.to_ascii_uppercase().as_str())
}

// =============================================================================
// Identity / Auto-Increment
// =============================================================================

/// Emit identity for Delta tables (GENERATED ALWAYS AS IDENTITY with seed).
pub fn emit_identity_generated(start: i64, increment: i64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Raw(format!(
        "GENERATED ALWAYS AS IDENTITY (START WITH {} INCREMENT BY {})",
        start, increment
    )));
    ts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("Customer"));
        assert!(is_plain_identifier("_tmp1"));
        assert!(!is_plain_identifier("1st"));
        assert!(!is_plain_identifier("Order Date"));
        assert!(!is_plain_identifier(""));
    }

    #[test]
    fn test_reserved_case_insensitive() {
        assert!(is_reserved_databricks("order"));
        assert!(is_reserved_databricks("Select"));
        assert!(!is_reserved_databricks("Customer"));
    }

    #[test]
    fn test_quote_backtick_escapes() {
        assert_eq!(quote_backtick("a`b"), "`a``b`");
    }
}
