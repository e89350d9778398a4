//! Tree-rewriting passes over the SQL AST.
//!
//! Every transformer takes an owned AST and hands back an equivalent owned
//! AST; collectors ([collect]) provide the read-only scaffolding they
//! share.

pub mod collect;
mod cte_graph;
mod decompose;
mod ddl_diff;
mod dynamic;
mod fixture;
mod insert_convert;
mod pagination;
mod param_injector;
mod rename;
mod sort_injector;

pub use collect::{
    collect_column_refs, collect_cte_names, collect_parameter_names, collect_select_values,
    collect_tables, TableColumnResolver, TableScan,
};
pub use cte_graph::{
    ColumnTrace, CteColumnTracer, CteDependencyAnalyzer, CteDependencyGraph, MAIN_QUERY,
};
pub use decompose::JoinAggregationDecomposer;
pub use ddl_diff::{DdlDiffGenerator, DdlDiffOptions};
pub use dynamic::{DynamicQueryBuilder, DynamicQueryOptions, JsonSerialize, Paging};
pub use fixture::{render_literal, FixtureColumn, FixtureCteBuilder, FixtureTable};
pub use insert_convert::{
    FixtureStrategy, InsertResultSelectConverter, InsertSelectValuesConverter, INSERTED_ROWS_CTE,
};
pub use pagination::{PaginationInjector, LIMIT_PARAMETER, MAX_PAGE_SIZE, OFFSET_PARAMETER};
pub use param_injector::{FilterCondition, FilterState, FilterValue, ParamInjector};
pub use rename::{AliasRenamer, CteRenamer, RenameOptions, SmartRenamer, SqlIdentifierRenamer};
pub use sort_injector::{SortInjector, SortSpec, SortState};
