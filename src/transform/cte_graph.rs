//! CTE dependency analysis.
//!
//! Builds a directed graph whose nodes are the statement's CTEs plus a
//! synthetic `MAIN_QUERY` node, with edges meaning "uses". On top of it:
//! topological ordering, independent-CTE detection and column tracing.

use indexmap::IndexMap;

use anyhow::Result;

use crate::ast::visitor::Visitor;
use crate::ast::*;
use crate::error::Error;

use super::collect::names_match;

pub const MAIN_QUERY: &str = "MAIN_QUERY";

pub struct CteDependencyAnalyzer;

#[derive(Debug, Clone)]
pub struct CteDependencyGraph {
    /// Node name → the CTE names it references, in declaration order;
    /// `MAIN_QUERY` is always the last node.
    deps: IndexMap<String, Vec<String>>,
}

impl CteDependencyAnalyzer {
    pub fn analyze(query: &Query) -> CteDependencyGraph {
        let mut ctes: Vec<(String, Query)> = Vec::new();
        let mut main = query.clone();
        if let Some(select) = main.leftmost_select_mut() {
            if let Some(with) = select.with_clause.take() {
                for cte in with.tables {
                    ctes.push((cte.name.value.clone(), cte.query));
                }
            }
        }
        let names: Vec<String> = ctes.iter().map(|(n, _)| n.clone()).collect();

        let mut deps = IndexMap::new();
        for (name, body) in &ctes {
            deps.insert(name.clone(), referenced_ctes(body, &names));
        }
        deps.insert(MAIN_QUERY.to_string(), referenced_ctes(&main, &names));

        CteDependencyGraph { deps }
    }
}

/// Bare table names in `query` that match a CTE name, deduplicated, with
/// self-references (recursive CTEs) skipped.
fn referenced_ctes(query: &Query, cte_names: &[String]) -> Vec<String> {
    struct Refs<'a> {
        cte_names: &'a [String],
        found: Vec<String>,
    }
    impl Visitor for Refs<'_> {
        fn visit_table_ref(&mut self, table: &TableRef) {
            if !table.namespaces.is_empty() {
                return;
            }
            if let Some(name) = self
                .cte_names
                .iter()
                .find(|n| names_match(n, &table.name.value))
            {
                if !self.found.iter().any(|f| names_match(f, name)) {
                    self.found.push(name.clone());
                }
            }
        }
    }
    let mut refs = Refs {
        cte_names,
        found: Vec::new(),
    };
    refs.visit_query(query);
    refs.found
}

impl CteDependencyGraph {
    /// All nodes, CTEs in declaration order, `MAIN_QUERY` last.
    pub fn nodes(&self) -> Vec<&str> {
        self.deps.keys().map(|k| k.as_str()).collect()
    }

    pub fn cte_names(&self) -> Vec<&str> {
        self.deps
            .keys()
            .filter(|k| *k != MAIN_QUERY)
            .map(|k| k.as_str())
            .collect()
    }

    /// The CTEs a node directly uses.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.deps
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    /// The nodes that directly use a CTE.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.deps
            .iter()
            .filter(|(_, uses)| uses.iter().any(|u| names_match(u, name)))
            .map(|(node, _)| node.as_str())
            .collect()
    }

    /// CTEs that reference no other CTE.
    pub fn independent_ctes(&self) -> Vec<&str> {
        self.deps
            .iter()
            .filter(|(name, uses)| *name != MAIN_QUERY && uses.iter().all(|u| names_match(u, name)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Dependency-first order over all nodes; `MAIN_QUERY` comes out last.
    /// Mutually recursive CTEs make this fail.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut order: Vec<String> = Vec::new();
        let mut pending: Vec<&String> = self
            .deps
            .keys()
            .filter(|k| k.as_str() != MAIN_QUERY)
            .collect();
        while !pending.is_empty() {
            let mut progressed = false;
            let mut blocked = Vec::new();
            for name in pending {
                let ready = self
                    .dependencies_of(name)
                    .iter()
                    // recursive self-edges do not block
                    .filter(|u| !names_match(u, name))
                    .all(|u| order.iter().any(|o| names_match(o, u)));
                if ready {
                    order.push(name.clone());
                    progressed = true;
                } else {
                    blocked.push(name);
                }
            }
            if !progressed {
                return Err(Error::transform("CTE dependency cycle detected").into());
            }
            pending = blocked;
        }
        order.push(MAIN_QUERY.to_string());
        Ok(order)
    }
}

// --- column tracing -----------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ColumnTrace {
    /// CTEs (or `MAIN_QUERY`) where the column first appears: it is
    /// projected there, and none of the node's dependencies projects it.
    pub appears_in: Vec<String>,
    /// Nodes whose dependencies project the column but whose own
    /// projection drops it.
    pub dropped_in: Vec<String>,
}

pub struct CteColumnTracer;

impl CteColumnTracer {
    pub fn trace(query: &Query, column: &str) -> ColumnTrace {
        let graph = CteDependencyAnalyzer::analyze(query);

        // per-node projection lookup
        let mut ctes: IndexMap<String, Query> = IndexMap::new();
        let mut main = query.clone();
        if let Some(select) = main.leftmost_select_mut() {
            if let Some(with) = select.with_clause.take() {
                for cte in with.tables {
                    ctes.insert(cte.name.value.clone(), cte.query);
                }
            }
        }

        let projects = |name: &str| -> bool {
            let body = if name == MAIN_QUERY {
                &main
            } else {
                match ctes.get(name) {
                    Some(q) => q,
                    None => return false,
                }
            };
            query_projects_column(body, column)
        };

        let mut trace = ColumnTrace::default();
        for node in graph.nodes() {
            let here = projects(node);
            let upstream = graph
                .dependencies_of(node)
                .iter()
                .any(|dep| projects(dep));
            if here && !upstream {
                trace.appears_in.push(node.to_string());
            }
            if !here && upstream {
                trace.dropped_in.push(node.to_string());
            }
        }
        trace
    }
}

/// Does the query's projection contain the column name? A wildcard is
/// treated as projecting everything, which errs on the side of "present".
fn query_projects_column(query: &Query, column: &str) -> bool {
    match query {
        Query::Select(select) => select.select.items.iter().any(|item| {
            if matches!(item.expr.kind, ExprKind::Wildcard { .. }) && item.alias.is_none() {
                return true;
            }
            item.output_name()
                .map(|name| names_match(name, column))
                .unwrap_or(false)
        }),
        Query::Binary(binary) => query_projects_column(&binary.left, column),
        Query::Values(_) => false,
    }
}
