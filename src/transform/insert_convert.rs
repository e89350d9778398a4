//! INSERT shape conversions.
//!
//! `VALUES ↔ SELECT … UNION ALL` rewrites, plus the post-insert result
//! simulation that turns an INSERT into a SELECT over a `__inserted_rows`
//! CTE with fixture CTEs standing in for real tables.

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;

use super::collect::{collect_tables, names_match, TableScan};
use super::fixture::{render_literal, FixtureTable};

pub const INSERTED_ROWS_CTE: &str = "__inserted_rows";

pub struct InsertSelectValuesConverter;

impl InsertSelectValuesConverter {
    /// `INSERT … VALUES (…),(…)` → `INSERT … SELECT … UNION ALL SELECT …`
    /// with every value aliased to its target column.
    pub fn to_select_union(insert: InsertQuery) -> Result<InsertQuery> {
        if insert.columns.is_empty() {
            return Err(Error::transform("INSERT requires an explicit column list").into());
        }
        let values = match &insert.source {
            Query::Values(v) => v,
            _ => {
                return Err(
                    Error::transform("INSERT source is not a VALUES clause").into(),
                )
            }
        };

        let mut chain: Option<Query> = None;
        for tuple in &values.tuples {
            if tuple.len() != insert.columns.len() {
                return Err(
                    Error::transform("Tuple value count does not match column count").into(),
                );
            }
            let items = insert
                .columns
                .iter()
                .zip(tuple)
                .map(|(column, value)| SelectItem::aliased(value.clone(), column.value.clone()))
                .collect();
            let select = Query::Select(Box::new(SelectQuery::new(SelectClause {
                distinct: None,
                items,
                comments: Vec::new(),
            })));
            chain = Some(match chain {
                None => select,
                Some(left) => Query::Binary(Box::new(BinaryQuery {
                    op: SetOperator::UnionAll,
                    left,
                    right: select,
                    comments: Vec::new(),
                })),
            });
        }
        let source =
            chain.ok_or_else(|| Error::transform("VALUES clause contains no tuples"))?;

        Ok(InsertQuery { source, ..insert })
    }

    /// The inverse: fold a `SELECT … UNION ALL …` source back into VALUES
    /// tuples, matching items to target columns by alias.
    pub fn to_values(insert: InsertQuery) -> Result<InsertQuery> {
        if insert.columns.is_empty() {
            return Err(Error::transform("INSERT requires an explicit column list").into());
        }
        let mut selects = Vec::new();
        flatten_union_all(&insert.source, &mut selects)?;

        let mut tuples = Vec::new();
        for select in selects {
            if select.from.is_some() || select.where_clause.is_some() {
                return Err(Error::transform(
                    "SELECT queries with FROM or WHERE clauses cannot be converted to VALUES",
                )
                .into());
            }
            if select.select.items.len() != insert.columns.len() {
                return Err(Error::transform(
                    "Each SELECT item must have an alias matching target columns",
                )
                .into());
            }
            let tuple = insert
                .columns
                .iter()
                .map(|column| {
                    select
                        .select
                        .items
                        .iter()
                        .find(|item| {
                            item.output_name()
                                .map(|name| names_match(name, &column.value))
                                .unwrap_or(false)
                        })
                        .map(|item| strip_alias_expr(&item.expr))
                        .ok_or_else(|| {
                            Error::transform(
                                "Each SELECT item must have an alias matching target columns",
                            )
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            tuples.push(tuple);
        }

        Ok(InsertQuery {
            source: Query::Values(Box::new(ValuesQuery {
                tuples,
                comments: Vec::new(),
            })),
            ..insert
        })
    }
}

fn flatten_union_all<'a>(query: &'a Query, out: &mut Vec<&'a SelectQuery>) -> Result<()> {
    match query {
        Query::Select(s) => {
            out.push(s);
            Ok(())
        }
        Query::Binary(b) if b.op == SetOperator::UnionAll => {
            flatten_union_all(&b.left, out)?;
            flatten_union_all(&b.right, out)
        }
        _ => Err(Error::transform(
            "Only UNION ALL chains of SELECT queries can be converted to VALUES",
        )
        .into()),
    }
}

fn strip_alias_expr(expr: &Expr) -> Expr {
    let mut stripped = expr.clone();
    stripped.comments = Vec::new();
    stripped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixtureStrategy {
    /// Every real table referenced by the INSERT source must have a
    /// fixture.
    #[default]
    Strict,
    /// Unknown tables are read as-is.
    Passthrough,
}

/// Builds a SELECT that simulates the post-insert row set of an INSERT,
/// using the target table's DDL for column types, defaults and serials.
pub struct InsertResultSelectConverter {
    tables: Vec<CreateTableQuery>,
    fixtures: Vec<FixtureTable>,
    strategy: FixtureStrategy,
}

impl InsertResultSelectConverter {
    pub fn new(tables: Vec<CreateTableQuery>) -> Self {
        InsertResultSelectConverter {
            tables,
            fixtures: Vec::new(),
            strategy: FixtureStrategy::Strict,
        }
    }

    pub fn with_fixtures(mut self, fixtures: Vec<FixtureTable>) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_strategy(mut self, strategy: FixtureStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn to_select_query(&self, insert: &InsertQuery) -> Result<Query> {
        let table = self
            .tables
            .iter()
            .find(|t| names_match(&t.name.name.value, &insert.target.name.value))
            .ok_or_else(|| {
                Error::schema(format!("Unknown table `{}`", insert.target.name.value))
            })?;

        let insert_columns: Vec<String> = if insert.columns.is_empty() {
            table.columns().iter().map(|c| c.name.value.clone()).collect()
        } else {
            insert.columns.iter().map(|c| c.value.clone()).collect()
        };

        for column in table.columns() {
            let provided = insert_columns
                .iter()
                .any(|c| names_match(c, &column.name.value));
            if !provided && column.not_null() && column.default_expr().is_none()
                && !column.is_serial()
            {
                return Err(Error::transform(format!(
                    "Required column '{}' is missing from INSERT",
                    column.name.value
                ))
                .into());
            }
        }

        let inserted_rows = self.inserted_rows_query(insert, table, &insert_columns)?;

        let mut ctes = self.fixture_ctes(&insert.source)?;
        ctes.push(CommonTable::new(INSERTED_ROWS_CTE, inserted_rows));

        let outer_items = match &insert.returning {
            Some(returning) => returning.clone(),
            None => vec![SelectItem::aliased(
                Expr::function(FunctionCall::simple(
                    "count",
                    vec![Expr::new(ExprKind::Wildcard {
                        namespaces: Vec::new(),
                    })],
                )),
                "count",
            )],
        };

        let outer = SelectQuery {
            with_clause: Some(WithClause {
                recursive: false,
                tables: ctes,
                comments: Vec::new(),
            }),
            select: SelectClause {
                distinct: None,
                items: outer_items,
                comments: Vec::new(),
            },
            from: Some(FromClause::new(SourceExpr::table(INSERTED_ROWS_CTE))),
            ..Default::default()
        };
        Ok(Query::Select(Box::new(outer)))
    }

    /// Fixture CTEs for every real table the INSERT source reads.
    fn fixture_ctes(&self, source: &Query) -> Result<Vec<CommonTable>> {
        let mut ctes = Vec::new();
        for table in collect_tables(source, TableScan::Full) {
            let fixture = self
                .fixtures
                .iter()
                .find(|f| names_match(&f.name, &table.name.value));
            match fixture {
                Some(fixture) => ctes.push(fixture.to_common_table()?),
                None => {
                    if self.strategy == FixtureStrategy::Strict {
                        return Err(Error::transform(format!(
                            "fixture coverage: {}",
                            table.name.value
                        ))
                        .into());
                    }
                }
            }
        }
        Ok(ctes)
    }

    fn inserted_rows_query(
        &self,
        insert: &InsertQuery,
        table: &CreateTableQuery,
        insert_columns: &[String],
    ) -> Result<Query> {
        match &insert.source {
            Query::Values(values) => {
                let mut chain: Option<Query> = None;
                for tuple in &values.tuples {
                    if tuple.len() != insert_columns.len() {
                        return Err(Error::transform(
                            "Tuple value count does not match column count",
                        )
                        .into());
                    }
                    let items = self.row_items(table, |column| {
                        insert_columns
                            .iter()
                            .position(|c| names_match(c, &column.name.value))
                            .map(|i| tuple[i].clone())
                    })?;
                    let select = Query::Select(Box::new(SelectQuery::new(SelectClause {
                        distinct: None,
                        items,
                        comments: Vec::new(),
                    })));
                    chain = Some(match chain {
                        None => select,
                        Some(left) => Query::Binary(Box::new(BinaryQuery {
                            op: SetOperator::UnionAll,
                            left,
                            right: select,
                            comments: Vec::new(),
                        })),
                    });
                }
                chain
                    .ok_or_else(|| Error::transform("VALUES clause contains no tuples").into())
            }
            source => {
                // wrap the source and address its outputs positionally
                let alias_columns: Vec<Ident> =
                    insert_columns.iter().map(Ident::new).collect();
                let src = SourceExpr {
                    kind: SourceKind::Subquery(source.clone()),
                    alias: Some(SourceAlias {
                        name: Ident::new("src"),
                        columns: Some(alias_columns),
                    }),
                    comments: Vec::new(),
                };
                let items = self.row_items(table, |column| {
                    insert_columns
                        .iter()
                        .find(|c| names_match(c, &column.name.value))
                        .map(|c| Expr::qualified_column("src", c.clone()))
                })?;
                let select = SelectQuery {
                    select: SelectClause {
                        distinct: None,
                        items,
                        comments: Vec::new(),
                    },
                    from: Some(FromClause::new(src)),
                    ..Default::default()
                };
                Ok(Query::Select(Box::new(select)))
            }
        }
    }

    /// One output item per table column: the inserted value cast to the
    /// column type, or the substituted default. Serial defaults become
    /// `row_number() over ()`.
    fn row_items(
        &self,
        table: &CreateTableQuery,
        provided: impl Fn(&ColumnDef) -> Option<Expr>,
    ) -> Result<Vec<SelectItem>> {
        table
            .columns()
            .iter()
            .map(|column| {
                let expr = match provided(column) {
                    Some(value) => cast_to(value, &column.data_type),
                    None => {
                        if column.is_serial() {
                            Expr::function(FunctionCall {
                                name: vec![Ident::new("row_number")],
                                distinct: false,
                                args: Vec::new(),
                                order_by: None,
                                filter: None,
                                over: Some(WindowSpec::default()),
                                within_group: None,
                            })
                        } else if let Some(default) = column.default_expr() {
                            default.clone()
                        } else {
                            cast_to(
                                render_literal(&ParamValue::Null)?,
                                &column.data_type,
                            )
                        }
                    }
                };
                Ok(SelectItem::aliased(expr, column.name.value.clone()))
            })
            .collect()
    }
}

fn cast_to(expr: Expr, ty: &TypeName) -> Expr {
    Expr::new(ExprKind::Cast {
        expr: Box::new(expr),
        ty: ty.clone(),
        operator_form: false,
    })
}
