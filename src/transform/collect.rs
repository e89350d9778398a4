//! Read-only collectors over the AST, built on [crate::ast::visitor].

use std::collections::HashSet;

use anyhow::Result;

use crate::ast::visitor::{self, Visitor};
use crate::ast::*;
use crate::error::Error;

/// User-supplied callback mapping a real table name to its ordered column
/// list. Receives real table names, never aliases. `None` means the table
/// is unknown.
pub type TableColumnResolver<'a> = dyn Fn(&str) -> Option<Vec<String>> + 'a;

/// Case-insensitive name comparison for unquoted SQL identifiers.
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || a.eq_ignore_ascii_case(b)
}

// --- column references --------------------------------------------------

#[derive(Default)]
pub struct ColumnReferenceCollector {
    pub columns: Vec<ColumnRef>,
}

impl Visitor for ColumnReferenceCollector {
    fn visit_column_ref(&mut self, column: &ColumnRef) {
        self.columns.push(column.clone());
    }
}

pub fn collect_column_refs(query: &Query) -> Vec<ColumnRef> {
    let mut collector = ColumnReferenceCollector::default();
    collector.visit_query(query);
    collector.columns
}

pub fn collect_column_refs_in_expr(expr: &Expr) -> Vec<ColumnRef> {
    let mut collector = ColumnReferenceCollector::default();
    collector.visit_expr(expr);
    collector.columns
}

// --- parameters ---------------------------------------------------------

#[derive(Default)]
pub struct ParameterCollector {
    pub names: Vec<String>,
}

impl Visitor for ParameterCollector {
    fn visit_parameter(&mut self, parameter: &Parameter) {
        if !self.names.iter().any(|n| n == &parameter.name) {
            self.names.push(parameter.name.clone());
        }
    }
}

pub fn collect_parameter_names(query: &Query) -> Vec<String> {
    let mut collector = ParameterCollector::default();
    collector.visit_query(query);
    collector.names
}

// --- CTE names ----------------------------------------------------------

#[derive(Default)]
pub struct CteNameCollector {
    pub names: Vec<String>,
}

impl Visitor for CteNameCollector {
    fn visit_common_table(&mut self, cte: &CommonTable) {
        if !self.names.iter().any(|n| names_match(n, &cte.name.value)) {
            self.names.push(cte.name.value.clone());
        }
        visitor::walk_common_table(self, cte);
    }
}

pub fn collect_cte_names(query: &Query) -> Vec<String> {
    let mut collector = CteNameCollector::default();
    collector.visit_query(query);
    collector.names
}

// --- table sources ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableScan {
    /// Only the outermost query's FROM clause.
    SelectableOnly,
    /// The whole tree: subqueries, CTE bodies, function-argument
    /// subqueries. CTE-defined names are excluded from the result.
    Full,
}

struct FullTableCollector {
    tables: Vec<TableRef>,
    seen: HashSet<String>,
}

impl Visitor for FullTableCollector {
    fn visit_table_ref(&mut self, table: &TableRef) {
        if self.seen.insert(table.path().to_ascii_lowercase()) {
            self.tables.push(table.clone());
        }
    }
}

/// Collect the real tables a query touches, deduplicated.
pub fn collect_tables(query: &Query, scan: TableScan) -> Vec<TableRef> {
    match scan {
        TableScan::SelectableOnly => {
            let mut tables = Vec::new();
            let mut seen = HashSet::new();
            if let Some(select) = query.leftmost_select() {
                if let Some(from) = &select.from {
                    collect_from_tables(from, &mut tables, &mut seen);
                }
            }
            tables
        }
        TableScan::Full => {
            let cte_names = collect_cte_names(query);
            let mut collector = FullTableCollector {
                tables: Vec::new(),
                seen: HashSet::new(),
            };
            collector.visit_query(query);
            collector
                .tables
                .into_iter()
                .filter(|t| {
                    // a bare name that matches a CTE is not a real table
                    !t.namespaces.is_empty()
                        || !cte_names.iter().any(|n| names_match(n, &t.name.value))
                })
                .collect()
        }
    }
}

fn collect_from_tables(from: &FromClause, tables: &mut Vec<TableRef>, seen: &mut HashSet<String>) {
    for source in from.sources() {
        collect_source_tables(source, tables, seen);
    }
}

fn collect_source_tables(
    source: &SourceExpr,
    tables: &mut Vec<TableRef>,
    seen: &mut HashSet<String>,
) {
    match &source.kind {
        SourceKind::Table(table) => {
            if seen.insert(table.path().to_ascii_lowercase()) {
                tables.push(table.clone());
            }
        }
        SourceKind::Paren(inner) => collect_from_tables(inner, tables, seen),
        _ => {}
    }
}

/// Binding name (alias or bare table name) → real table, for every plain
/// table in the outermost FROM.
pub fn from_bindings(from: &FromClause) -> Vec<(String, TableRef)> {
    let mut out = Vec::new();
    for source in from.sources() {
        collect_bindings(source, &mut out);
    }
    out
}

fn collect_bindings(source: &SourceExpr, out: &mut Vec<(String, TableRef)>) {
    match &source.kind {
        SourceKind::Table(table) => {
            let binding = source
                .alias
                .as_ref()
                .map(|a| a.name.value.clone())
                .unwrap_or_else(|| table.name.value.clone());
            out.push((binding, table.clone()));
        }
        SourceKind::Paren(inner) => {
            for s in inner.sources() {
                collect_bindings(s, out);
            }
        }
        _ => {}
    }
}

// --- projected select values --------------------------------------------

/// The projected output of a SELECT: output name → defining expression.
/// Wildcards are expanded through the resolver.
pub fn collect_select_values(
    query: &SelectQuery,
    resolver: Option<&TableColumnResolver>,
    allow_wildcard_without_resolver: bool,
) -> Result<Vec<(String, Expr)>> {
    let mut entries: Vec<(String, Expr)> = Vec::new();
    let bindings = query.from.as_ref().map(from_bindings).unwrap_or_default();

    for item in &query.select.items {
        match &item.expr.kind {
            ExprKind::Wildcard { namespaces } if item.alias.is_none() => {
                let targets: Vec<&(String, TableRef)> = if namespaces.is_empty() {
                    bindings.iter().collect()
                } else {
                    let qualifier = &namespaces[0].value;
                    bindings
                        .iter()
                        .filter(|(binding, _)| names_match(binding, qualifier))
                        .collect()
                };
                if targets.is_empty() && !namespaces.is_empty() {
                    return Err(Error::schema(format!(
                        "Wildcard qualifier `{}` does not match any source",
                        namespaces[0].value
                    ))
                    .into());
                }
                for (binding, table) in targets {
                    let columns = resolver.and_then(|r| r(&table.name.value));
                    match columns {
                        Some(columns) if !columns.is_empty() => {
                            for column in columns {
                                entries.push((
                                    column.clone(),
                                    Expr::qualified_column(binding.clone(), column),
                                ));
                            }
                        }
                        _ => {
                            if !allow_wildcard_without_resolver {
                                return Err(Error::schema(format!(
                                    "Cannot expand wildcard for table `{}` without a column resolver",
                                    table.name.value
                                ))
                                .into());
                            }
                        }
                    }
                }
            }
            _ => {
                if let Some(name) = item.output_name() {
                    entries.push((name.to_string(), item.expr.clone()));
                }
            }
        }
    }
    Ok(entries)
}
