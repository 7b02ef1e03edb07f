//! Static, read-only mapping tables.
//!
//! Tables are plain `static` slices indexed lazily on first use, so any number
//! of concurrent conversions can share them.

pub mod functions;
pub mod m_types;
pub mod types;

pub use functions::{lookup_function, Arity, DateUnit, FunctionMapping, FunctionTransform};
pub use m_types::map_m_type;
pub use types::{lookup_type, map_type, map_type_str, ParameterPolicy, TypeMapping};
