/// A trait to "fold" the SQL AST (similar to a visitor), so we can
/// transitively apply some logic to a whole tree by just defining how we
/// want to handle each type.
use anyhow::Result;
use itertools::Itertools;

use super::*;

// Fold pattern:
// - https://rust-unofficial.github.io/patterns/patterns/creational/fold.html
//
// For some functions, we want to call a default impl, because copying &
// pasting everything apart from a specific match is lots of repetition. So
// we define a function outside the trait, by default call it, and let
// implementors override the default while calling the function directly for
// some cases.
pub trait AstFold {
    fn fold_statement(&mut self, statement: Statement) -> Result<Statement> {
        fold_statement(self, statement)
    }
    fn fold_query(&mut self, query: Query) -> Result<Query> {
        fold_query(self, query)
    }
    fn fold_select_query(&mut self, query: SelectQuery) -> Result<SelectQuery> {
        fold_select_query(self, query)
    }
    fn fold_with_clause(&mut self, with: WithClause) -> Result<WithClause> {
        fold_with_clause(self, with)
    }
    fn fold_common_table(&mut self, cte: CommonTable) -> Result<CommonTable> {
        fold_common_table(self, cte)
    }
    fn fold_select_item(&mut self, item: SelectItem) -> Result<SelectItem> {
        fold_select_item(self, item)
    }
    fn fold_source(&mut self, source: SourceExpr) -> Result<SourceExpr> {
        fold_source(self, source)
    }
    fn fold_join(&mut self, join: JoinClause) -> Result<JoinClause> {
        fold_join(self, join)
    }
    fn fold_order_item(&mut self, item: OrderItem) -> Result<OrderItem> {
        fold_order_item(self, item)
    }
    fn fold_expr(&mut self, mut expr: Expr) -> Result<Expr> {
        expr.kind = self.fold_expr_kind(expr.kind)?;
        Ok(expr)
    }
    fn fold_expr_kind(&mut self, kind: ExprKind) -> Result<ExprKind> {
        fold_expr_kind(self, kind)
    }
    fn fold_exprs(&mut self, exprs: Vec<Expr>) -> Result<Vec<Expr>> {
        exprs.into_iter().map(|e| self.fold_expr(e)).collect()
    }
    fn fold_function_call(&mut self, call: FunctionCall) -> Result<FunctionCall> {
        fold_function_call(self, call)
    }
    fn fold_parameter(&mut self, parameter: Parameter) -> Result<Parameter> {
        Ok(parameter)
    }
    fn fold_insert(&mut self, insert: InsertQuery) -> Result<InsertQuery> {
        fold_insert(self, insert)
    }
    fn fold_update(&mut self, update: UpdateQuery) -> Result<UpdateQuery> {
        fold_update(self, update)
    }
}

pub fn fold_statement<F: ?Sized + AstFold>(fold: &mut F, statement: Statement) -> Result<Statement> {
    Ok(match statement {
        Statement::Query(q) => Statement::Query(fold.fold_query(q)?),
        Statement::Insert(i) => Statement::Insert(fold.fold_insert(i)?),
        Statement::Update(u) => Statement::Update(fold.fold_update(u)?),
        // DDL nodes carry no rewritable value expressions we care about.
        Statement::CreateTable(_) | Statement::CreateIndex(_) => statement,
    })
}

pub fn fold_query<F: ?Sized + AstFold>(fold: &mut F, query: Query) -> Result<Query> {
    Ok(match query {
        Query::Select(s) => Query::Select(Box::new(fold.fold_select_query(*s)?)),
        Query::Binary(b) => Query::Binary(Box::new(BinaryQuery {
            op: b.op,
            left: fold.fold_query(b.left)?,
            right: fold.fold_query(b.right)?,
            comments: b.comments,
        })),
        Query::Values(v) => Query::Values(Box::new(fold_values(fold, *v)?)),
    })
}

pub fn fold_values<F: ?Sized + AstFold>(fold: &mut F, values: ValuesQuery) -> Result<ValuesQuery> {
    Ok(ValuesQuery {
        tuples: values
            .tuples
            .into_iter()
            .map(|t| fold.fold_exprs(t))
            .try_collect()?,
        comments: values.comments,
    })
}

pub fn fold_select_query<F: ?Sized + AstFold>(
    fold: &mut F,
    query: SelectQuery,
) -> Result<SelectQuery> {
    Ok(SelectQuery {
        with_clause: query
            .with_clause
            .map(|w| fold.fold_with_clause(w))
            .transpose()?,
        select: SelectClause {
            distinct: match query.select.distinct {
                Some(Distinct::DistinctOn(exprs)) => {
                    Some(Distinct::DistinctOn(fold.fold_exprs(exprs)?))
                }
                other => other,
            },
            items: query
                .select
                .items
                .into_iter()
                .map(|i| fold.fold_select_item(i))
                .try_collect()?,
            comments: query.select.comments,
        },
        from: query.from.map(|f| fold_from(fold, f)).transpose()?,
        where_clause: query
            .where_clause
            .map(|w| {
                Ok::<_, anyhow::Error>(WhereClause {
                    condition: fold.fold_expr(w.condition)?,
                    comments: w.comments,
                })
            })
            .transpose()?,
        group_by: query
            .group_by
            .map(|g| fold_group_by(fold, g))
            .transpose()?,
        having: query
            .having
            .map(|h| {
                Ok::<_, anyhow::Error>(HavingClause {
                    condition: fold.fold_expr(h.condition)?,
                    comments: h.comments,
                })
            })
            .transpose()?,
        order_by: query
            .order_by
            .map(|o| fold_order_by(fold, o))
            .transpose()?,
        limit: query
            .limit
            .map(|l| {
                Ok::<_, anyhow::Error>(LimitClause {
                    value: fold.fold_expr(l.value)?,
                    comments: l.comments,
                })
            })
            .transpose()?,
        offset: query
            .offset
            .map(|o| {
                Ok::<_, anyhow::Error>(OffsetClause {
                    value: fold.fold_expr(o.value)?,
                    comments: o.comments,
                })
            })
            .transpose()?,
        fetch: query
            .fetch
            .map(|f| {
                Ok::<_, anyhow::Error>(FetchClause {
                    first: f.first,
                    count: fold.fold_expr(f.count)?,
                    comments: f.comments,
                })
            })
            .transpose()?,
        for_clause: query.for_clause,
        comments: query.comments,
    })
}

pub fn fold_with_clause<F: ?Sized + AstFold>(fold: &mut F, with: WithClause) -> Result<WithClause> {
    Ok(WithClause {
        recursive: with.recursive,
        tables: with
            .tables
            .into_iter()
            .map(|t| fold.fold_common_table(t))
            .try_collect()?,
        comments: with.comments,
    })
}

pub fn fold_common_table<F: ?Sized + AstFold>(fold: &mut F, cte: CommonTable) -> Result<CommonTable> {
    Ok(CommonTable {
        name: cte.name,
        columns: cte.columns,
        materialized: cte.materialized,
        query: fold.fold_query(cte.query)?,
        comments: cte.comments,
    })
}

pub fn fold_select_item<F: ?Sized + AstFold>(fold: &mut F, item: SelectItem) -> Result<SelectItem> {
    Ok(SelectItem {
        expr: fold.fold_expr(item.expr)?,
        alias: item.alias,
        comments: item.comments,
    })
}

pub fn fold_from<F: ?Sized + AstFold>(fold: &mut F, from: FromClause) -> Result<FromClause> {
    Ok(FromClause {
        source: fold.fold_source(from.source)?,
        joins: from
            .joins
            .into_iter()
            .map(|j| fold.fold_join(j))
            .try_collect()?,
        comments: from.comments,
    })
}

pub fn fold_source<F: ?Sized + AstFold>(fold: &mut F, source: SourceExpr) -> Result<SourceExpr> {
    Ok(SourceExpr {
        kind: match source.kind {
            SourceKind::Table(t) => SourceKind::Table(t),
            SourceKind::Subquery(q) => SourceKind::Subquery(fold.fold_query(q)?),
            SourceKind::Function(f) => SourceKind::Function(fold.fold_function_call(f)?),
            SourceKind::Values(v) => SourceKind::Values(fold_values(fold, v)?),
            SourceKind::Paren(inner) => SourceKind::Paren(Box::new(fold_from(fold, *inner)?)),
        },
        alias: source.alias,
        comments: source.comments,
    })
}

pub fn fold_join<F: ?Sized + AstFold>(fold: &mut F, join: JoinClause) -> Result<JoinClause> {
    Ok(JoinClause {
        kind: join.kind,
        lateral: join.lateral,
        source: fold.fold_source(join.source)?,
        condition: match join.condition {
            Some(JoinCondition::On(expr)) => Some(JoinCondition::On(fold.fold_expr(expr)?)),
            other => other,
        },
        comments: join.comments,
    })
}

pub fn fold_group_by<F: ?Sized + AstFold>(fold: &mut F, group: GroupByClause) -> Result<GroupByClause> {
    Ok(GroupByClause {
        grouping: match group.grouping {
            GroupingKind::Plain(exprs) => GroupingKind::Plain(fold.fold_exprs(exprs)?),
            GroupingKind::Rollup(exprs) => GroupingKind::Rollup(fold.fold_exprs(exprs)?),
            GroupingKind::Cube(exprs) => GroupingKind::Cube(fold.fold_exprs(exprs)?),
            GroupingKind::Sets(sets) => GroupingKind::Sets(
                sets.into_iter()
                    .map(|s| fold.fold_exprs(s))
                    .try_collect()?,
            ),
        },
        comments: group.comments,
    })
}

pub fn fold_order_by<F: ?Sized + AstFold>(fold: &mut F, order: OrderByClause) -> Result<OrderByClause> {
    Ok(OrderByClause {
        items: order
            .items
            .into_iter()
            .map(|i| fold.fold_order_item(i))
            .try_collect()?,
        comments: order.comments,
    })
}

pub fn fold_order_item<F: ?Sized + AstFold>(fold: &mut F, item: OrderItem) -> Result<OrderItem> {
    Ok(OrderItem {
        expr: fold.fold_expr(item.expr)?,
        direction: item.direction,
        nulls: item.nulls,
        comments: item.comments,
    })
}

pub fn fold_expr_kind<F: ?Sized + AstFold>(fold: &mut F, kind: ExprKind) -> Result<ExprKind> {
    use ExprKind::*;
    Ok(match kind {
        Literal(_) | ColumnRef(_) | Wildcard { .. } | TypedString { .. } => kind,
        Parameter(p) => Parameter(fold.fold_parameter(p)?),
        Binary { left, op, right } => Binary {
            left: Box::new(fold.fold_expr(*left)?),
            op,
            right: Box::new(fold.fold_expr(*right)?),
        },
        Unary { op, expr } => Unary {
            op,
            expr: Box::new(fold.fold_expr(*expr)?),
        },
        Function(call) => Function(Box::new(fold.fold_function_call(*call)?)),
        Case(case) => {
            let case = *case;
            Case(Box::new(CaseExpr {
                operand: case.operand.map(|o| fold.fold_expr(o)).transpose()?,
                branches: case
                    .branches
                    .into_iter()
                    .map(|b| {
                        Ok::<_, anyhow::Error>(CaseBranch {
                            condition: fold.fold_expr(b.condition)?,
                            result: fold.fold_expr(b.result)?,
                        })
                    })
                    .try_collect()?,
                else_expr: case.else_expr.map(|e| fold.fold_expr(e)).transpose()?,
            }))
        }
        Cast {
            expr,
            ty,
            operator_form,
        } => Cast {
            expr: Box::new(fold.fold_expr(*expr)?),
            ty,
            operator_form,
        },
        InList {
            expr,
            list,
            negated,
        } => InList {
            expr: Box::new(fold.fold_expr(*expr)?),
            list: fold.fold_exprs(list)?,
            negated,
        },
        InSubquery {
            expr,
            query,
            negated,
        } => InSubquery {
            expr: Box::new(fold.fold_expr(*expr)?),
            query: Box::new(fold.fold_query(*query)?),
            negated,
        },
        Between {
            expr,
            low,
            high,
            negated,
        } => Between {
            expr: Box::new(fold.fold_expr(*expr)?),
            low: Box::new(fold.fold_expr(*low)?),
            high: Box::new(fold.fold_expr(*high)?),
            negated,
        },
        Exists { query, negated } => Exists {
            query: Box::new(fold.fold_query(*query)?),
            negated,
        },
        Like {
            expr,
            pattern,
            escape,
            negated,
            case_insensitive,
        } => Like {
            expr: Box::new(fold.fold_expr(*expr)?),
            pattern: Box::new(fold.fold_expr(*pattern)?),
            escape: escape
                .map(|e| fold.fold_expr(*e).map(Box::new))
                .transpose()?,
            negated,
            case_insensitive,
        },
        Tuple(exprs) => Tuple(fold.fold_exprs(exprs)?),
        Array(exprs) => Array(fold.fold_exprs(exprs)?),
        Subquery(q) => Subquery(Box::new(fold.fold_query(*q)?)),
        Paren(inner) => Paren(Box::new(fold.fold_expr(*inner)?)),
    })
}

pub fn fold_function_call<F: ?Sized + AstFold>(
    fold: &mut F,
    call: FunctionCall,
) -> Result<FunctionCall> {
    Ok(FunctionCall {
        name: call.name,
        distinct: call.distinct,
        args: fold.fold_exprs(call.args)?,
        order_by: call.order_by.map(|o| fold_order_by(fold, o)).transpose()?,
        filter: call
            .filter
            .map(|f| fold.fold_expr(*f).map(Box::new))
            .transpose()?,
        over: call
            .over
            .map(|w| {
                Ok::<_, anyhow::Error>(WindowSpec {
                    partition_by: fold.fold_exprs(w.partition_by)?,
                    order_by: w.order_by.map(|o| fold_order_by(fold, o)).transpose()?,
                    frame: w.frame,
                })
            })
            .transpose()?,
        within_group: call
            .within_group
            .map(|o| fold_order_by(fold, o))
            .transpose()?,
    })
}

pub fn fold_insert<F: ?Sized + AstFold>(fold: &mut F, insert: InsertQuery) -> Result<InsertQuery> {
    Ok(InsertQuery {
        target: insert.target,
        columns: insert.columns,
        source: fold.fold_query(insert.source)?,
        on_conflict: insert
            .on_conflict
            .map(|c| {
                Ok::<_, anyhow::Error>(OnConflictClause {
                    target: c.target,
                    action: match c.action {
                        OnConflictAction::DoNothing => OnConflictAction::DoNothing,
                        OnConflictAction::DoUpdate {
                            set_items,
                            where_clause,
                        } => OnConflictAction::DoUpdate {
                            set_items: fold_set_items(fold, set_items)?,
                            where_clause: where_clause.map(|w| fold.fold_expr(w)).transpose()?,
                        },
                    },
                })
            })
            .transpose()?,
        returning: insert
            .returning
            .map(|items| {
                items
                    .into_iter()
                    .map(|i| fold.fold_select_item(i))
                    .try_collect()
            })
            .transpose()?,
        comments: insert.comments,
    })
}

pub fn fold_update<F: ?Sized + AstFold>(fold: &mut F, update: UpdateQuery) -> Result<UpdateQuery> {
    Ok(UpdateQuery {
        with_clause: update
            .with_clause
            .map(|w| fold.fold_with_clause(w))
            .transpose()?,
        target: fold.fold_source(update.target)?,
        set_items: fold_set_items(fold, update.set_items)?,
        from: update.from.map(|f| fold_from(fold, f)).transpose()?,
        where_clause: update
            .where_clause
            .map(|w| {
                Ok::<_, anyhow::Error>(WhereClause {
                    condition: fold.fold_expr(w.condition)?,
                    comments: w.comments,
                })
            })
            .transpose()?,
        returning: update
            .returning
            .map(|items| {
                items
                    .into_iter()
                    .map(|i| fold.fold_select_item(i))
                    .try_collect()
            })
            .transpose()?,
        comments: update.comments,
    })
}

fn fold_set_items<F: ?Sized + AstFold>(fold: &mut F, items: Vec<SetItem>) -> Result<Vec<SetItem>> {
    items
        .into_iter()
        .map(|s| {
            Ok(SetItem {
                column: s.column,
                value: fold.fold_expr(s.value)?,
            })
        })
        .try_collect()
}
