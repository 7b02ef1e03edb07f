//! # lakeshift
//!
//! Converts T-SQL, Fabric Datamart SQL and Power Query M into Databricks SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │    T-SQL     │   │    Fabric    │   │    Power Query M     │
//! └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘
//!        │                  │ [override hook]      │ [parser]
//!        │                  ▼                      ▼
//!        │           ┌──────────────┐   ┌──────────────────────┐
//!        └──────────▶│ tsql rewriter│   │  step graph (DAG)    │
//!                    │ type → func  │   └──────────┬───────────┘
//!                    │ → ident →    │              │ [compiler]
//!                    │ constraint   │              ▼
//!                    └──────┬───────┘   ┌──────────────────────┐
//!                           │           │  sql::Query builder  │
//!                           │           └──────────┬───────────┘
//!                           ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │       ConversionResult { output_sql, notes, incomplete }    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conversion is a pure function of source text, dialect and a
//! [`ConversionContext`]. Mapping tables are immutable statics shared by all
//! conversions.

pub mod config;
pub mod convert;
pub mod error;
pub mod fabric;
pub mod mapping;
pub mod notes;
pub mod powerquery;
pub mod sql;
pub mod tsql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{Settings, SettingsError};
    pub use crate::convert::{
        convert, convert_batch, ConversionContext, ConversionResult, SourceDialect,
    };
    pub use crate::error::{ConvertError, ConvertResult};
    pub use crate::notes::{Note, NoteCode, NoteCollector, Severity, SourcePosition};
    pub use crate::sql::{Databricks, SyntaxValidator, ValidationOutcome, Validator};
}

// Also export at crate root for convenience
pub use convert::{convert, convert_batch, ConversionContext, ConversionResult, SourceDialect};
pub use error::{ConvertError, ConvertResult};
pub use notes::{Note, NoteCode, Severity, SourcePosition};
