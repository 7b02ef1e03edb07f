//! Power Query M type names to Databricks type names.
//!
//! M spells types two ways: `type number` and `Int64.Type`. Both normalize to
//! a primitive key (`number`, `int64`) before lookup.

use std::collections::HashMap;
use std::sync::LazyLock;

pub static M_TYPE_MAPPINGS: &[(&str, &str)] = &[
    ("text", "STRING"),
    ("number", "DOUBLE"),
    ("decimal", "DOUBLE"),
    ("double", "DOUBLE"),
    ("single", "FLOAT"),
    ("percentage", "DOUBLE"),
    ("currency", "DECIMAL(19,4)"),
    ("int64", "BIGINT"),
    ("int32", "INT"),
    ("int16", "SMALLINT"),
    ("int8", "TINYINT"),
    ("byte", "TINYINT"),
    ("date", "DATE"),
    ("datetime", "TIMESTAMP"),
    ("datetimezone", "TIMESTAMP"),
    ("time", "STRING"),
    ("duration", "STRING"),
    ("logical", "BOOLEAN"),
    ("binary", "BINARY"),
];

static M_TYPE_INDEX: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| M_TYPE_MAPPINGS.iter().copied().collect());

/// Reduce `type text`, `Text.Type` or `Int64.Type` to its primitive key.
pub fn primitive_key(m_type: &str) -> String {
    let lower = m_type.trim().to_ascii_lowercase();
    let lower = lower.strip_prefix("type ").unwrap_or(&lower).trim();
    let lower = lower.strip_suffix(".type").unwrap_or(lower);
    lower.to_string()
}

/// Map an M type, or `None` for `any` and unknown names.
pub fn map_m_type(m_type: &str) -> Option<&'static str> {
    M_TYPE_INDEX.get(primitive_key(m_type).as_str()).copied()
}
