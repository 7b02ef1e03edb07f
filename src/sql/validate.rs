//! Pluggable validation of converted SQL.
//!
//! Conversion never depends on a validator. Callers may run one afterwards to
//! check a candidate statement: the offline [`SyntaxValidator`] parses it with
//! sqlparser-rs, a live warehouse check would implement the same trait.

use serde::Serialize;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::dialect::SqlDialect;

/// Outcome of validating one candidate statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum ValidationOutcome {
    Passed,
    Failed(String),
    Skipped(String),
}

impl ValidationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ValidationOutcome::Failed(_))
    }
}

/// Validates candidate SQL for a target dialect.
pub trait Validator {
    fn validate(&self, candidate_sql: &str, dialect: &dyn SqlDialect) -> ValidationOutcome;
}

/// Offline syntax check backed by sqlparser-rs.
///
/// sqlparser has no Databricks dialect, so the generic dialect is used.
/// Statements that use Databricks-only syntax it cannot parse are reported as
/// skipped rather than failed when `lenient` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxValidator {
    pub lenient: bool,
}

impl SyntaxValidator {
    pub fn lenient() -> Self {
        Self { lenient: true }
    }
}

/// Constructs the generic parser cannot read even when they are valid Databricks SQL.
const DATABRICKS_ONLY_MARKERS: &[&str] = &[
    "USING DELTA",
    "GENERATED ALWAYS AS IDENTITY",
    "* EXCEPT",
    "TIMESTAMPADD",
    "TIMESTAMPDIFF",
];

impl Validator for SyntaxValidator {
    fn validate(&self, candidate_sql: &str, dialect: &dyn SqlDialect) -> ValidationOutcome {
        if candidate_sql.trim().is_empty() {
            return ValidationOutcome::Skipped("empty statement".into());
        }

        match Parser::parse_sql(&GenericDialect {}, candidate_sql) {
            Ok(_) => ValidationOutcome::Passed,
            Err(e) => {
                let upper = candidate_sql.to_uppercase();
                if self.lenient && DATABRICKS_ONLY_MARKERS.iter().any(|m| upper.contains(m)) {
                    ValidationOutcome::Skipped(format!(
                        "{}-specific syntax not checked offline: {}",
                        dialect.name(),
                        e
                    ))
                } else {
                    ValidationOutcome::Failed(format!("Invalid SQL for {}: {}", dialect.name(), e))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::Databricks;

    #[test]
    fn test_validate_valid_sql() {
        let outcome = SyntaxValidator::default().validate("SELECT * FROM cat.dbo.users", &Databricks);
        assert_eq!(outcome, ValidationOutcome::Passed);
    }

    #[test]
    fn test_validate_invalid_sql() {
        let outcome = SyntaxValidator::default().validate("SELEC * FORM users", &Databricks);
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_validate_empty_is_skipped() {
        let outcome = SyntaxValidator::default().validate("  ", &Databricks);
        assert!(matches!(outcome, ValidationOutcome::Skipped(_)));
    }
}
