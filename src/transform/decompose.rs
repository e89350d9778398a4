//! Join/aggregation decomposition.
//!
//! Splits a `SELECT … agg(…) FROM a JOIN b GROUP BY …` into a detail CTE
//! holding the joined raw rows and an outer aggregation over it, so the
//! join logic and the aggregation can be inspected (and tested)
//! separately.

use anyhow::Result;

use crate::ast::fold::AstFold;
use crate::ast::visitor::{self, Visitor};
use crate::ast::*;
use crate::error::Error;

const AGGREGATE_FUNCTIONS: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "string_agg",
    "array_agg",
    "bool_and",
    "bool_or",
    "every",
    "json_agg",
    "jsonb_agg",
];

pub struct JoinAggregationDecomposer {
    pub cte_name: String,
}

impl Default for JoinAggregationDecomposer {
    fn default() -> Self {
        JoinAggregationDecomposer {
            cte_name: "detail_data".into(),
        }
    }
}

impl JoinAggregationDecomposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cte_name(mut self, name: impl Into<String>) -> Self {
        self.cte_name = name.into();
        self
    }

    /// Check decomposability without rewriting. Shares its acceptance
    /// criteria with [Self::decompose].
    pub fn analyze(&self, query: &Query) -> Result<()> {
        let select = query
            .leftmost_select()
            .ok_or_else(|| Error::transform("Query must be a SELECT statement"))?;
        if query.as_binary().is_some() {
            return Err(Error::transform("Set operation queries cannot be decomposed").into());
        }

        let has_joins = select
            .from
            .as_ref()
            .map(|f| !f.joins.is_empty())
            .unwrap_or(false);
        if !has_joins {
            return Err(Error::transform("Query does not contain JOINs").into());
        }

        let mut scan = FunctionScan::default();
        scan.visit_select_query(select);
        if scan.has_window {
            return Err(Error::transform("Window functions are not fully supported").into());
        }
        if !scan.has_aggregate && select.group_by.is_none() {
            return Err(Error::transform("Query does not contain aggregation").into());
        }
        Ok(())
    }

    /// Rewrite into `WITH <cte_name> AS (raw joined rows) SELECT
    /// aggregates FROM <cte_name>`.
    ///
    /// DISTINCT aggregations and aggregations over complex expressions are
    /// passed through conservatively: columns buried inside them are
    /// extracted only when they are plain references, so exotic shapes may
    /// need manual review.
    pub fn decompose(&self, query: Query) -> Result<Query> {
        self.analyze(&query)?;
        let select = *query.into_select().expect("analyze checked the shape");

        log::debug!("decomposing into CTE `{}`", self.cte_name);

        // every plain column the outer query touches becomes a CTE output
        let mut detail_columns: Vec<ColumnRef> = Vec::new();
        let mut push_refs = |exprs: &[ColumnRef]| {
            for column in exprs {
                if !detail_columns
                    .iter()
                    .any(|c| c.name.value.eq_ignore_ascii_case(&column.name.value))
                {
                    detail_columns.push(column.clone());
                }
            }
        };
        for item in &select.select.items {
            push_refs(&super::collect::collect_column_refs_in_expr(&item.expr));
        }
        if let Some(group_by) = &select.group_by {
            if let GroupingKind::Plain(exprs) = &group_by.grouping {
                for expr in exprs {
                    push_refs(&super::collect::collect_column_refs_in_expr(expr));
                }
            }
        }
        if let Some(having) = &select.having {
            push_refs(&super::collect::collect_column_refs_in_expr(&having.condition));
        }
        if detail_columns.is_empty() {
            return Err(Error::transform("No columns available for decomposition").into());
        }

        let detail_query = SelectQuery {
            select: SelectClause {
                distinct: None,
                items: detail_columns
                    .iter()
                    .map(|c| SelectItem::new(Expr::new(ExprKind::ColumnRef(c.clone()))))
                    .collect(),
                comments: Vec::new(),
            },
            from: select.from.clone(),
            where_clause: select.where_clause.clone(),
            ..Default::default()
        };

        // the outer query refers to the CTE's bare output names
        let mut stripper = QualifierStripper;
        let outer_items = select
            .select
            .items
            .into_iter()
            .map(|i| stripper.fold_select_item(i))
            .collect::<Result<Vec<_>>>()?;
        let outer_group_by = select
            .group_by
            .map(|g| fold::fold_group_by(&mut stripper, g))
            .transpose()?;
        let outer_having = select
            .having
            .map(|h| {
                Ok::<_, anyhow::Error>(HavingClause {
                    condition: stripper.fold_expr(h.condition)?,
                    comments: h.comments,
                })
            })
            .transpose()?;
        let outer_order_by = select
            .order_by
            .map(|o| fold::fold_order_by(&mut stripper, o))
            .transpose()?;

        let mut with = select.with_clause.unwrap_or(WithClause {
            recursive: false,
            tables: Vec::new(),
            comments: Vec::new(),
        });
        with.tables.push(CommonTable::new(
            self.cte_name.clone(),
            Query::Select(Box::new(detail_query)),
        ));

        let outer = SelectQuery {
            with_clause: Some(with),
            select: SelectClause {
                distinct: None,
                items: outer_items,
                comments: Vec::new(),
            },
            from: Some(FromClause::new(SourceExpr::table(self.cte_name.clone()))),
            group_by: outer_group_by,
            having: outer_having,
            order_by: outer_order_by,
            limit: select.limit,
            offset: select.offset,
            fetch: select.fetch,
            for_clause: select.for_clause,
            comments: select.comments,
            ..Default::default()
        };

        Ok(Query::Select(Box::new(outer)))
    }
}

#[derive(Default)]
struct FunctionScan {
    has_aggregate: bool,
    has_window: bool,
}

impl Visitor for FunctionScan {
    fn visit_function_call(&mut self, call: &FunctionCall) {
        if call.over.is_some() {
            self.has_window = true;
        }
        let name = call.name_path().to_ascii_lowercase();
        if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
            self.has_aggregate = true;
        }
        visitor::walk_function_call(self, call);
    }
}

/// Rewrites `t.col` to `col` so outer references hit the CTE projection.
struct QualifierStripper;

impl AstFold for QualifierStripper {
    fn fold_expr_kind(&mut self, kind: ExprKind) -> Result<ExprKind> {
        match kind {
            ExprKind::ColumnRef(mut column) => {
                column.namespaces.clear();
                Ok(ExprKind::ColumnRef(column))
            }
            other => fold::fold_expr_kind(self, other),
        }
    }
}
