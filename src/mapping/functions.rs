//! T-SQL function calls to Databricks function calls.
//!
//! Each entry names the source function, the argument counts it accepts and
//! a closed [`FunctionTransform`] describing the target shape. The rewriter
//! in [`crate::tsql::functions`] interprets the transform; this module holds
//! no behaviour beyond lookup.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    Variadic { min: usize },
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exact(k) => n == k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::Variadic { min } => n >= min,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Arity::Exact(k) => format!("{}", k),
            Arity::Range(lo, hi) => format!("{} to {}", lo, hi),
            Arity::Variadic { min } => format!("at least {}", min),
        }
    }
}

/// Target shape of a mapped call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionTransform {
    /// Same arguments, new name.
    Rename(&'static str),
    /// Niladic call replaced by fixed text.
    Constant(&'static str),
    /// `DATEADD(unit, n, d)` → interval arithmetic.
    DateAdd,
    /// `DATEDIFF(unit, a, b)` → `DATEDIFF(b, a)` or `TIMESTAMPDIFF(UNIT, a, b)`.
    DateDiff,
    /// `DATEPART(unit, d)` → `EXTRACT(FIELD FROM d)`.
    DatePart,
    /// `CONVERT(type, expr[, style])` → `CAST(expr AS type)`; `TRY_` variant → `TRY_CAST`.
    Convert { try_cast: bool },
    /// `STUFF(s, start, len, r)` → `OVERLAY(s PLACING r FROM start FOR len)`.
    Stuff,
    /// Valid as-is; only the argument count is checked.
    Keep,
}

/// One row of the function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionMapping {
    pub source: &'static str,
    pub arity: Arity,
    pub transform: FunctionTransform,
}

const fn entry(source: &'static str, arity: Arity, transform: FunctionTransform) -> FunctionMapping {
    FunctionMapping {
        source,
        arity,
        transform,
    }
}

pub static FUNCTION_MAPPINGS: &[FunctionMapping] = &[
    // Current date/time
    entry("GETDATE", Arity::Exact(0), FunctionTransform::Constant("CURRENT_TIMESTAMP()")),
    entry("GETUTCDATE", Arity::Exact(0), FunctionTransform::Constant("CURRENT_TIMESTAMP()")),
    entry("SYSDATETIME", Arity::Exact(0), FunctionTransform::Constant("CURRENT_TIMESTAMP()")),
    entry("SYSUTCDATETIME", Arity::Exact(0), FunctionTransform::Constant("CURRENT_TIMESTAMP()")),
    entry("SYSDATETIMEOFFSET", Arity::Exact(0), FunctionTransform::Constant("CURRENT_TIMESTAMP()")),
    // Identifiers
    entry("NEWID", Arity::Exact(0), FunctionTransform::Constant("UUID()")),
    entry("NEWSEQUENTIALID", Arity::Exact(0), FunctionTransform::Constant("UUID()")),
    // Null handling
    entry("ISNULL", Arity::Exact(2), FunctionTransform::Rename("COALESCE")),
    entry("COALESCE", Arity::Variadic { min: 1 }, FunctionTransform::Keep),
    entry("NULLIF", Arity::Exact(2), FunctionTransform::Keep),
    entry("IIF", Arity::Exact(3), FunctionTransform::Rename("IF")),
    // Strings
    entry("LEN", Arity::Exact(1), FunctionTransform::Rename("LENGTH")),
    entry("CHARINDEX", Arity::Range(2, 3), FunctionTransform::Rename("LOCATE")),
    entry("STUFF", Arity::Exact(4), FunctionTransform::Stuff),
    entry("SUBSTRING", Arity::Exact(3), FunctionTransform::Keep),
    entry("REPLACE", Arity::Exact(3), FunctionTransform::Keep),
    entry("UPPER", Arity::Exact(1), FunctionTransform::Keep),
    entry("LOWER", Arity::Exact(1), FunctionTransform::Keep),
    entry("LTRIM", Arity::Exact(1), FunctionTransform::Keep),
    entry("RTRIM", Arity::Exact(1), FunctionTransform::Keep),
    entry("CONCAT", Arity::Variadic { min: 2 }, FunctionTransform::Keep),
    // Numbers
    entry("ROUND", Arity::Range(2, 3), FunctionTransform::Keep),
    entry("ABS", Arity::Exact(1), FunctionTransform::Keep),
    // Dates
    entry("DATEADD", Arity::Exact(3), FunctionTransform::DateAdd),
    entry("DATEDIFF", Arity::Exact(3), FunctionTransform::DateDiff),
    entry("DATEPART", Arity::Exact(2), FunctionTransform::DatePart),
    // Conversion
    entry("CONVERT", Arity::Range(2, 3), FunctionTransform::Convert { try_cast: false }),
    entry("TRY_CONVERT", Arity::Range(2, 3), FunctionTransform::Convert { try_cast: true }),
];

static FUNCTION_INDEX: LazyLock<HashMap<&'static str, &'static FunctionMapping>> =
    LazyLock::new(|| FUNCTION_MAPPINGS.iter().map(|m| (m.source, m)).collect());

/// Find the mapping for a function name, ignoring case.
pub fn lookup_function(name: &str) -> Option<&'static FunctionMapping> {
    FUNCTION_INDEX.get(name.to_ascii_uppercase().as_str()).copied()
}

// =============================================================================
// Date units
// =============================================================================

/// A T-SQL datepart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Quarter,
    Month,
    DayOfYear,
    Day,
    Week,
    Weekday,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
}

impl DateUnit {
    /// Parse a datepart name or abbreviation, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        let unit = match s.to_ascii_lowercase().as_str() {
            "year" | "yy" | "yyyy" => DateUnit::Year,
            "quarter" | "qq" | "q" => DateUnit::Quarter,
            "month" | "mm" | "m" => DateUnit::Month,
            "dayofyear" | "dy" | "y" => DateUnit::DayOfYear,
            "day" | "dd" | "d" => DateUnit::Day,
            "week" | "wk" | "ww" => DateUnit::Week,
            "weekday" | "dw" | "w" => DateUnit::Weekday,
            "hour" | "hh" => DateUnit::Hour,
            "minute" | "mi" | "n" => DateUnit::Minute,
            "second" | "ss" | "s" => DateUnit::Second,
            "millisecond" | "ms" => DateUnit::Millisecond,
            "microsecond" | "mcs" => DateUnit::Microsecond,
            _ => return None,
        };
        Some(unit)
    }

    /// Interval keyword and multiplier for date arithmetic.
    ///
    /// Quarters become months; day-of-year and weekday step by days.
    pub fn interval(self) -> (&'static str, i64) {
        match self {
            DateUnit::Year => ("YEARS", 1),
            DateUnit::Quarter => ("MONTHS", 3),
            DateUnit::Month => ("MONTHS", 1),
            DateUnit::DayOfYear | DateUnit::Day | DateUnit::Weekday => ("DAYS", 1),
            DateUnit::Week => ("WEEKS", 1),
            DateUnit::Hour => ("HOURS", 1),
            DateUnit::Minute => ("MINUTES", 1),
            DateUnit::Second => ("SECONDS", 1),
            DateUnit::Millisecond => ("MILLISECONDS", 1),
            DateUnit::Microsecond => ("MICROSECONDS", 1),
        }
    }

    /// Unit keyword for `TIMESTAMPADD` / `TIMESTAMPDIFF`.
    pub fn timestamp_unit(self) -> &'static str {
        match self {
            DateUnit::Year => "YEAR",
            DateUnit::Quarter => "QUARTER",
            DateUnit::Month => "MONTH",
            DateUnit::DayOfYear | DateUnit::Day | DateUnit::Weekday => "DAY",
            DateUnit::Week => "WEEK",
            DateUnit::Hour => "HOUR",
            DateUnit::Minute => "MINUTE",
            DateUnit::Second => "SECOND",
            DateUnit::Millisecond => "MILLISECOND",
            DateUnit::Microsecond => "MICROSECOND",
        }
    }

    /// Field name for `EXTRACT(field FROM d)`.
    pub fn extract_field(self) -> &'static str {
        match self {
            DateUnit::Year => "YEAR",
            DateUnit::Quarter => "QUARTER",
            DateUnit::Month => "MONTH",
            DateUnit::DayOfYear => "DOY",
            DateUnit::Day => "DAY",
            DateUnit::Week => "WEEK",
            DateUnit::Weekday => "DOW",
            DateUnit::Hour => "HOUR",
            DateUnit::Minute => "MINUTE",
            DateUnit::Second => "SECOND",
            DateUnit::Millisecond => "MILLISECOND",
            DateUnit::Microsecond => "MICROSECOND",
        }
    }
}
