//! Databricks SQL generation.
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder helpers
//! - [`token`] - Output token types
//! - [`dialect`] - Target dialect rendering rules
//! - [`validate`] - Optional post-conversion validation

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;
pub mod validate;

pub use dialect::{Databricks, SqlDialect};
pub use expr::{
    and_all, avg, cast, col, count, count_star, func, interval, lit_bool, lit_date, lit_float,
    lit_int, lit_null, lit_str, max, min, star, star_except, sum, BinaryOperator, Expr,
    ExprExt, Literal, UnaryOperator,
};
pub use query::{FromItem, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
pub use validate::{SyntaxValidator, ValidationOutcome, Validator};
