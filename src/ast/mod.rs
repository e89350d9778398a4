//! The SQL abstract syntax tree.
//!
//! Every category is a tagged variant: [Query] for query shapes,
//! [ExprKind] for value expressions, [SourceKind] for FROM sources and
//! [Statement] for the parseable roots. Nodes own their children; comments
//! ride on the node they belong to as [PositionedComment]s.

mod comment;
mod ddl;
mod expr;
pub mod fold;
mod query;
pub mod visitor;

pub use comment::*;
pub use ddl::*;
pub use expr::*;
pub use query::*;

pub use crate::error::Span;
