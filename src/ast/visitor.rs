//! Read-only traversal. Collectors implement [Visitor] and override the
//! node types they care about; defaults recurse in pre-order. The
//! complementary owned-rewrite traversal lives in [super::fold].

use super::*;

pub trait Visitor {
    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement)
    }
    fn visit_query(&mut self, query: &Query) {
        walk_query(self, query)
    }
    fn visit_select_query(&mut self, query: &SelectQuery) {
        walk_select_query(self, query)
    }
    fn visit_with_clause(&mut self, with: &WithClause) {
        walk_with_clause(self, with)
    }
    fn visit_common_table(&mut self, cte: &CommonTable) {
        walk_common_table(self, cte)
    }
    fn visit_select_item(&mut self, item: &SelectItem) {
        walk_select_item(self, item)
    }
    fn visit_from(&mut self, from: &FromClause) {
        walk_from(self, from)
    }
    fn visit_source(&mut self, source: &SourceExpr) {
        walk_source(self, source)
    }
    fn visit_join(&mut self, join: &JoinClause) {
        walk_join(self, join)
    }
    fn visit_order_item(&mut self, item: &OrderItem) {
        walk_order_item(self, item)
    }
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr)
    }
    fn visit_function_call(&mut self, call: &FunctionCall) {
        walk_function_call(self, call)
    }
    fn visit_column_ref(&mut self, _column: &ColumnRef) {}
    fn visit_parameter(&mut self, _parameter: &Parameter) {}
    fn visit_table_ref(&mut self, _table: &TableRef) {}
}

pub fn walk_statement<V: ?Sized + Visitor>(v: &mut V, statement: &Statement) {
    match statement {
        Statement::Query(q) => v.visit_query(q),
        Statement::Insert(i) => {
            v.visit_table_ref(&i.target);
            v.visit_query(&i.source);
            if let Some(returning) = &i.returning {
                for item in returning {
                    v.visit_select_item(item);
                }
            }
        }
        Statement::Update(u) => {
            v.visit_source(&u.target);
            if let Some(w) = &u.with_clause {
                v.visit_with_clause(w);
            }
            for item in &u.set_items {
                v.visit_column_ref(&item.column);
                v.visit_expr(&item.value);
            }
            if let Some(f) = &u.from {
                v.visit_from(f);
            }
            if let Some(w) = &u.where_clause {
                v.visit_expr(&w.condition);
            }
            if let Some(returning) = &u.returning {
                for item in returning {
                    v.visit_select_item(item);
                }
            }
        }
        Statement::CreateTable(c) => {
            v.visit_table_ref(&c.name);
            if let CreateTableBody::AsSelect(q) = &c.body {
                v.visit_query(q);
            }
        }
        Statement::CreateIndex(c) => {
            v.visit_table_ref(&c.table);
        }
    }
}

pub fn walk_query<V: ?Sized + Visitor>(v: &mut V, query: &Query) {
    match query {
        Query::Select(s) => v.visit_select_query(s),
        Query::Binary(b) => {
            v.visit_query(&b.left);
            v.visit_query(&b.right);
        }
        Query::Values(values) => {
            for tuple in &values.tuples {
                for expr in tuple {
                    v.visit_expr(expr);
                }
            }
        }
    }
}

pub fn walk_select_query<V: ?Sized + Visitor>(v: &mut V, query: &SelectQuery) {
    if let Some(with) = &query.with_clause {
        v.visit_with_clause(with);
    }
    if let Some(Distinct::DistinctOn(exprs)) = &query.select.distinct {
        for expr in exprs {
            v.visit_expr(expr);
        }
    }
    for item in &query.select.items {
        v.visit_select_item(item);
    }
    if let Some(from) = &query.from {
        v.visit_from(from);
    }
    if let Some(w) = &query.where_clause {
        v.visit_expr(&w.condition);
    }
    if let Some(group) = &query.group_by {
        match &group.grouping {
            GroupingKind::Plain(exprs) | GroupingKind::Rollup(exprs) | GroupingKind::Cube(exprs) => {
                for expr in exprs {
                    v.visit_expr(expr);
                }
            }
            GroupingKind::Sets(sets) => {
                for set in sets {
                    for expr in set {
                        v.visit_expr(expr);
                    }
                }
            }
        }
    }
    if let Some(h) = &query.having {
        v.visit_expr(&h.condition);
    }
    if let Some(order) = &query.order_by {
        for item in &order.items {
            v.visit_order_item(item);
        }
    }
    if let Some(l) = &query.limit {
        v.visit_expr(&l.value);
    }
    if let Some(o) = &query.offset {
        v.visit_expr(&o.value);
    }
    if let Some(f) = &query.fetch {
        v.visit_expr(&f.count);
    }
}

pub fn walk_with_clause<V: ?Sized + Visitor>(v: &mut V, with: &WithClause) {
    for cte in &with.tables {
        v.visit_common_table(cte);
    }
}

pub fn walk_common_table<V: ?Sized + Visitor>(v: &mut V, cte: &CommonTable) {
    v.visit_query(&cte.query);
}

pub fn walk_select_item<V: ?Sized + Visitor>(v: &mut V, item: &SelectItem) {
    v.visit_expr(&item.expr);
}

pub fn walk_from<V: ?Sized + Visitor>(v: &mut V, from: &FromClause) {
    v.visit_source(&from.source);
    for join in &from.joins {
        v.visit_join(join);
    }
}

pub fn walk_source<V: ?Sized + Visitor>(v: &mut V, source: &SourceExpr) {
    match &source.kind {
        SourceKind::Table(t) => v.visit_table_ref(t),
        SourceKind::Subquery(q) => v.visit_query(q),
        SourceKind::Function(f) => v.visit_function_call(f),
        SourceKind::Values(values) => {
            for tuple in &values.tuples {
                for expr in tuple {
                    v.visit_expr(expr);
                }
            }
        }
        SourceKind::Paren(inner) => v.visit_from(inner),
    }
}

pub fn walk_join<V: ?Sized + Visitor>(v: &mut V, join: &JoinClause) {
    v.visit_source(&join.source);
    if let Some(JoinCondition::On(expr)) = &join.condition {
        v.visit_expr(expr);
    }
}

pub fn walk_order_item<V: ?Sized + Visitor>(v: &mut V, item: &OrderItem) {
    v.visit_expr(&item.expr);
}

pub fn walk_expr<V: ?Sized + Visitor>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Wildcard { .. } | ExprKind::TypedString { .. } => {}
        ExprKind::ColumnRef(c) => v.visit_column_ref(c),
        ExprKind::Parameter(p) => v.visit_parameter(p),
        ExprKind::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::Unary { expr, .. } => v.visit_expr(expr),
        ExprKind::Function(call) => v.visit_function_call(call),
        ExprKind::Case(case) => {
            if let Some(operand) = &case.operand {
                v.visit_expr(operand);
            }
            for branch in &case.branches {
                v.visit_expr(&branch.condition);
                v.visit_expr(&branch.result);
            }
            if let Some(else_expr) = &case.else_expr {
                v.visit_expr(else_expr);
            }
        }
        ExprKind::Cast { expr, .. } => v.visit_expr(expr),
        ExprKind::InList { expr, list, .. } => {
            v.visit_expr(expr);
            for item in list {
                v.visit_expr(item);
            }
        }
        ExprKind::InSubquery { expr, query, .. } => {
            v.visit_expr(expr);
            v.visit_query(query);
        }
        ExprKind::Between {
            expr, low, high, ..
        } => {
            v.visit_expr(expr);
            v.visit_expr(low);
            v.visit_expr(high);
        }
        ExprKind::Exists { query, .. } => v.visit_query(query),
        ExprKind::Like {
            expr,
            pattern,
            escape,
            ..
        } => {
            v.visit_expr(expr);
            v.visit_expr(pattern);
            if let Some(escape) = escape {
                v.visit_expr(escape);
            }
        }
        ExprKind::Tuple(exprs) | ExprKind::Array(exprs) => {
            for e in exprs {
                v.visit_expr(e);
            }
        }
        ExprKind::Subquery(q) => v.visit_query(q),
        ExprKind::Paren(inner) => v.visit_expr(inner),
    }
}

pub fn walk_function_call<V: ?Sized + Visitor>(v: &mut V, call: &FunctionCall) {
    for arg in &call.args {
        v.visit_expr(arg);
    }
    if let Some(order) = &call.order_by {
        for item in &order.items {
            v.visit_order_item(item);
        }
    }
    if let Some(filter) = &call.filter {
        v.visit_expr(filter);
    }
    if let Some(over) = &call.over {
        for expr in &over.partition_by {
            v.visit_expr(expr);
        }
        if let Some(order) = &over.order_by {
            for item in &order.items {
                v.visit_order_item(item);
            }
        }
    }
    if let Some(within) = &call.within_group {
        for item in &within.items {
            v.visit_order_item(item);
        }
    }
}
