//! SQL query manipulation toolkit.
//! Parses SQL into a typed AST, transforms the tree, and re-emits SQL.
//!
//! The pipeline:
//! ```ascii
//!        SQL text
//!
//!   (tokenize) │
//!     lexer    │
//!              ▼
//!           tokens
//!              │
//!    (parse)   │ parse_select / parse_insert / …
//!              ▼
//!             AST ◄──────► JSON (json_of_query / query_of_json)
//!              │
//! (transform)  │ ParamInjector, SortInjector, PaginationInjector,
//!              │ JoinAggregationDecomposer, renamers, converters, …
//!              ▼
//!             AST
//!              │
//!    (format)  │ format / format_statement
//!              ▼
//!     SQL text + parameter map
//! ```
//!
//! Everything is a pure in-memory operation: no I/O, no global mutable
//! state, one owned AST per call.

pub mod ast;
mod error;
pub mod format;
pub mod keywords;
pub mod lexer;
pub mod parser;
#[cfg(test)]
mod test;
pub mod transform;

pub use error::{Error, ErrorKind, ErrorMessage, ErrorMessages, SourceLocation, Span};
pub use format::{FormatOptions, FormatResult};

use crate::ast::{CreateTableQuery, Expr, InsertQuery, Query, Statement, UpdateQuery, ValuesQuery};

/// Parse a SELECT-shaped statement (set operations, WITH and VALUES roots
/// included).
pub fn parse_select(sql: &str) -> Result<Query, ErrorMessages> {
    parser::parse_select(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

pub fn parse_insert(sql: &str) -> Result<InsertQuery, ErrorMessages> {
    parser::parse_insert(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

pub fn parse_update(sql: &str) -> Result<UpdateQuery, ErrorMessages> {
    parser::parse_update(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

pub fn parse_create_table(sql: &str) -> Result<CreateTableQuery, ErrorMessages> {
    parser::parse_create_table(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

pub fn parse_values(sql: &str) -> Result<ValuesQuery, ErrorMessages> {
    parser::parse_values(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

/// Parse a single value expression, e.g. a column default.
pub fn parse_value(sql: &str) -> Result<Expr, ErrorMessages> {
    parser::parse_value(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

/// Parse any supported root statement.
pub fn parse_statement(sql: &str) -> Result<Statement, ErrorMessages> {
    parser::parse_statement(sql)
        .map_err(error::downcast)
        .map_err(|e| e.composed("", sql, false))
}

/// Format a query; the result carries the SQL text and the parameter map.
pub fn format(query: &Query, options: &FormatOptions) -> FormatResult {
    format::format(query, options)
}

/// JSON serialization
pub fn json_of_query(query: &Query) -> Result<String, ErrorMessages> {
    serde_json::to_string(query).map_err(|e| error::downcast(anyhow::anyhow!(e)))
}

/// JSON deserialization
pub fn query_of_json(json: &str) -> Result<Query, ErrorMessages> {
    serde_json::from_str(json).map_err(|e| error::downcast(anyhow::anyhow!(e)))
}
