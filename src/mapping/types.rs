//! SQL Server type names to Databricks type names.
//!
//! Lookup is case-insensitive on the base type name. Parameters such as
//! `(10,2)` or `(MAX)` are handled by the entry's [`ParameterPolicy`].
//! Target spellings are themselves keys, so re-mapping converted text is a
//! no-op. The one exception is `FLOAT`: it is both the target of `REAL` and a
//! source type that widens to `DOUBLE`.

use std::collections::HashMap;
use std::sync::LazyLock;

/// What happens to a source type's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterPolicy {
    /// Parameters are discarded (`NVARCHAR(50)` → `STRING`).
    Drop,
    /// Parameters are copied verbatim (`DECIMAL(10,2)` → `DECIMAL(10,2)`).
    Preserve,
    /// A fixed substitute replaces the whole type (`MONEY` → `DECIMAL(19,4)`).
    Rescale(&'static str),
}

/// One row of the type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub policy: ParameterPolicy,
}

const fn plain(source: &'static str, target: &'static str) -> TypeMapping {
    TypeMapping {
        source,
        target,
        policy: ParameterPolicy::Drop,
    }
}

const fn preserve(source: &'static str, target: &'static str) -> TypeMapping {
    TypeMapping {
        source,
        target,
        policy: ParameterPolicy::Preserve,
    }
}

const fn rescale(source: &'static str, fixed: &'static str) -> TypeMapping {
    TypeMapping {
        source,
        target: fixed,
        policy: ParameterPolicy::Rescale(fixed),
    }
}

pub static TYPE_MAPPINGS: &[TypeMapping] = &[
    // Exact numerics
    plain("BIGINT", "BIGINT"),
    plain("INT", "INT"),
    plain("INTEGER", "INT"),
    plain("SMALLINT", "SMALLINT"),
    plain("TINYINT", "TINYINT"),
    plain("BIT", "BOOLEAN"),
    preserve("DECIMAL", "DECIMAL"),
    preserve("NUMERIC", "DECIMAL"),
    preserve("DEC", "DECIMAL"),
    rescale("MONEY", "DECIMAL(19,4)"),
    rescale("SMALLMONEY", "DECIMAL(10,4)"),
    // Approximate numerics
    plain("FLOAT", "DOUBLE"),
    plain("REAL", "FLOAT"),
    plain("DOUBLE", "DOUBLE"),
    // Date and time
    plain("DATE", "DATE"),
    plain("DATETIME", "TIMESTAMP"),
    plain("DATETIME2", "TIMESTAMP"),
    plain("SMALLDATETIME", "TIMESTAMP"),
    plain("DATETIMEOFFSET", "TIMESTAMP"),
    plain("TIME", "STRING"),
    plain("TIMESTAMP", "TIMESTAMP"),
    plain("TIMESTAMP_NTZ", "TIMESTAMP_NTZ"),
    // Character strings
    plain("CHAR", "STRING"),
    plain("VARCHAR", "STRING"),
    plain("TEXT", "STRING"),
    plain("NCHAR", "STRING"),
    plain("NVARCHAR", "STRING"),
    plain("NTEXT", "STRING"),
    plain("SYSNAME", "STRING"),
    plain("STRING", "STRING"),
    // Binary
    plain("BINARY", "BINARY"),
    plain("VARBINARY", "BINARY"),
    plain("IMAGE", "BINARY"),
    // Other
    plain("UNIQUEIDENTIFIER", "STRING"),
    plain("XML", "STRING"),
    plain("JSON", "STRING"),
    plain("BOOLEAN", "BOOLEAN"),
];

static TYPE_INDEX: LazyLock<HashMap<&'static str, &'static TypeMapping>> =
    LazyLock::new(|| TYPE_MAPPINGS.iter().map(|m| (m.source, m)).collect());

/// Find the mapping for a base type name, ignoring case.
pub fn lookup_type(base: &str) -> Option<&'static TypeMapping> {
    TYPE_INDEX.get(base.to_ascii_uppercase().as_str()).copied()
}

impl TypeMapping {
    /// Render the target type for a source occurrence.
    ///
    /// `params` is the text between the parentheses, if the source had any.
    pub fn render(&self, params: Option<&str>) -> String {
        match (self.policy, params) {
            (ParameterPolicy::Preserve, Some(p)) => {
                format!("{}({})", self.target, normalize_params(p))
            }
            (ParameterPolicy::Rescale(fixed), _) => fixed.to_string(),
            _ => self.target.to_string(),
        }
    }
}

/// Map a source type, or `None` when it is unmapped.
pub fn map_type(base: &str, params: Option<&str>) -> Option<String> {
    lookup_type(base).map(|m| m.render(params))
}

/// Map a full type string like `decimal(10, 2)` or `NVARCHAR(MAX)`.
pub fn map_type_str(type_text: &str) -> Option<String> {
    let type_text = type_text.trim();
    match type_text.find('(') {
        Some(open) => {
            let base = type_text[..open].trim();
            let params = type_text[open + 1..].trim_end().strip_suffix(')')?;
            map_type(base, Some(params))
        }
        None => map_type(type_text, None),
    }
}

fn normalize_params(params: &str) -> String {
    params
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_mappings() {
        let cases = [
            ("INT", "INT"),
            ("bigint", "BIGINT"),
            ("SmallInt", "SMALLINT"),
            ("BIT", "BOOLEAN"),
            ("MONEY", "DECIMAL(19,4)"),
            ("SMALLMONEY", "DECIMAL(10,4)"),
            ("FLOAT", "DOUBLE"),
            ("REAL", "FLOAT"),
            ("DATETIME", "TIMESTAMP"),
            ("DATETIME2(7)", "TIMESTAMP"),
            ("DATE", "DATE"),
            ("VARCHAR(100)", "STRING"),
            ("NVARCHAR(MAX)", "STRING"),
            ("TEXT", "STRING"),
            ("NTEXT", "STRING"),
            ("UNIQUEIDENTIFIER", "STRING"),
            ("XML", "STRING"),
            ("BINARY(16)", "BINARY"),
            ("VARBINARY(MAX)", "BINARY"),
        ];
        for (source, expected) in cases {
            assert_eq!(map_type_str(source).as_deref(), Some(expected), "{}", source);
        }
    }

    #[test]
    fn test_preserve_parameters() {
        assert_eq!(map_type("decimal", Some("10, 2")).as_deref(), Some("DECIMAL(10,2)"));
        assert_eq!(map_type("NUMERIC", Some("18,0")).as_deref(), Some("DECIMAL(18,0)"));
        assert_eq!(map_type("DECIMAL", None).as_deref(), Some("DECIMAL"));
    }

    #[test]
    fn test_rescale_ignores_source_parameters() {
        assert_eq!(map_type("MONEY", Some("1,1")).as_deref(), Some("DECIMAL(19,4)"));
    }

    #[test]
    fn test_total_and_non_empty() {
        for mapping in TYPE_MAPPINGS {
            assert!(!mapping.render(None).is_empty(), "{}", mapping.source);
        }
    }

    #[test]
    fn test_idempotent_on_targets() {
        // Every target base name maps to itself, except the FLOAT/REAL chain
        // where FLOAT is both a source (→ DOUBLE) and the target of REAL.
        for mapping in TYPE_MAPPINGS {
            let once = mapping.render(Some("10,2"));
            if mapping.source == "REAL" {
                continue;
            }
            let twice = map_type_str(&once);
            assert_eq!(twice.as_deref(), Some(once.as_str()), "{}", mapping.source);
        }
    }

    #[test]
    fn test_unmapped() {
        assert!(map_type("GEOGRAPHY", None).is_none());
        assert!(lookup_type("HIERARCHYID").is_none());
    }
}
