//! Dynamic ORDER BY injection.

use indexmap::IndexMap;

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;

use super::collect::{collect_select_values, names_match, TableColumnResolver};

pub type SortState = IndexMap<String, SortSpec>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SortSpec {
    pub asc: bool,
    pub desc: bool,
    pub nulls_first: bool,
    pub nulls_last: bool,
}

impl SortSpec {
    pub fn asc() -> Self {
        SortSpec {
            asc: true,
            ..Default::default()
        }
    }

    pub fn desc() -> Self {
        SortSpec {
            desc: true,
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        !self.asc && !self.desc && !self.nulls_first && !self.nulls_last
    }
}

#[derive(Default)]
pub struct SortInjector<'a> {
    resolver: Option<&'a TableColumnResolver<'a>>,
}

impl<'a> SortInjector<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: &'a TableColumnResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Append the given entries to the query's ORDER BY clause. Entries
    /// must name projected columns (or columns the resolver can supply);
    /// conflicting or empty specs are rejected.
    pub fn inject(&self, query: Query, sort: &SortState) -> Result<Query> {
        let mut select = match query {
            Query::Select(s) => *s,
            _ => {
                return Err(
                    Error::transform("Sort injection requires a simple SELECT query").into(),
                )
            }
        };

        let projection = collect_select_values(&select, self.resolver, true)?;

        let mut order_by = select.order_by.take().unwrap_or_default();
        for (column, spec) in sort {
            if spec.is_empty() {
                return Err(
                    Error::transform(format!("Empty sort specification for column `{column}`"))
                        .into(),
                );
            }
            if spec.asc && spec.desc {
                return Err(Error::transform(format!(
                    "Conflicting sort directions for column `{column}`"
                ))
                .into());
            }
            if spec.nulls_first && spec.nulls_last {
                return Err(Error::transform(format!(
                    "Conflicting null placements for column `{column}`"
                ))
                .into());
            }
            let expr = projection
                .iter()
                .find(|(name, _)| names_match(name, column))
                .map(|(_, expr)| Expr::column(sort_reference(expr, column)))
                .ok_or_else(|| {
                    Error::schema(format!("Column `{column}` not found in query projection"))
                })?;

            order_by.items.push(OrderItem {
                expr,
                direction: if spec.asc {
                    SortDirection::Asc
                } else if spec.desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Default
                },
                nulls: if spec.nulls_first {
                    NullsOrder::First
                } else if spec.nulls_last {
                    NullsOrder::Last
                } else {
                    NullsOrder::Default
                },
                comments: Vec::new(),
            });
        }

        select.order_by = Some(order_by);
        Ok(Query::Select(Box::new(select)))
    }

    /// Strip the ORDER BY clause; comments attached to it go with it.
    pub fn remove_order_by(query: Query) -> Query {
        match query {
            Query::Select(mut s) => {
                s.order_by = None;
                Query::Select(s)
            }
            other => other,
        }
    }
}

/// ORDER BY references the output column name, so sorting by an aliased
/// expression stays valid.
fn sort_reference(expr: &Expr, column: &str) -> String {
    match &expr.kind {
        ExprKind::ColumnRef(c) => c.name.value.clone(),
        _ => column.to_string(),
    }
}
