//! Statement, query and clause emission.

use crate::ast::*;

use super::gen_expr::{
    format_column_ref, format_expr, format_expr_list, format_expr_parts, format_function_call,
    format_subquery,
};
use super::writer::SqlWriter;
use super::{ListBreak, WithClauseStyle};

pub fn format_root(w: &mut SqlWriter, statement: &Statement) {
    match statement {
        Statement::Query(q) => format_query(w, q),
        Statement::Insert(i) => format_insert(w, i),
        Statement::Update(u) => format_update(w, u),
        Statement::CreateTable(c) => format_create_table(w, c),
        Statement::CreateIndex(c) => format_create_index(w, c),
    }
}

pub fn format_query(w: &mut SqlWriter, query: &Query) {
    match query {
        Query::Select(s) => format_select_query(w, s),
        Query::Binary(b) => {
            w.comments_at(&b.comments, CommentPosition::Before);
            format_query(w, &b.left);
            if w.multiline() {
                w.newline();
            }
            w.kws(b.op.words());
            if w.multiline() {
                w.newline();
            }
            format_query(w, &b.right);
            w.comments_at(&b.comments, CommentPosition::After);
        }
        Query::Values(v) => format_values(w, v),
    }
}

fn clause_break(w: &mut SqlWriter) {
    if w.multiline() {
        w.newline();
    }
}

pub fn format_select_query(w: &mut SqlWriter, query: &SelectQuery) {
    w.comments_at(&query.comments, CommentPosition::Before);

    if let Some(with) = &query.with_clause {
        format_with_clause(w, with);
        clause_break(w);
    }

    w.kw("select");
    match &query.select.distinct {
        Some(Distinct::Distinct) => w.kw("distinct"),
        Some(Distinct::DistinctOn(exprs)) => {
            w.kws(&["distinct", "on"]);
            w.atom("(");
            format_expr_list(w, exprs);
            w.glue(")");
        }
        None => {}
    }
    w.comments_at(&query.select.comments, CommentPosition::Before);

    let mode = w.opts.comma_break;
    let broken = w.multiline() && mode != ListBreak::None;
    if broken {
        w.indent();
        w.newline();
    }
    format_select_items(w, &query.select.items, mode);
    if broken {
        w.dedent();
    }

    if let Some(from) = &query.from {
        clause_break(w);
        format_from_clause(w, from);
    }
    if let Some(where_clause) = &query.where_clause {
        clause_break(w);
        w.comments_at(&where_clause.comments, CommentPosition::Before);
        w.kw("where");
        format_expr(w, &where_clause.condition);
        w.comments_at(&where_clause.comments, CommentPosition::After);
    }
    if let Some(group_by) = &query.group_by {
        clause_break(w);
        format_group_by(w, group_by);
    }
    if let Some(having) = &query.having {
        clause_break(w);
        w.comments_at(&having.comments, CommentPosition::Before);
        w.kw("having");
        format_expr(w, &having.condition);
    }
    if let Some(order_by) = &query.order_by {
        clause_break(w);
        format_order_by(w, order_by);
    }
    if let Some(limit) = &query.limit {
        clause_break(w);
        w.comments_at(&limit.comments, CommentPosition::Before);
        w.kw("limit");
        format_expr(w, &limit.value);
    }
    if let Some(offset) = &query.offset {
        clause_break(w);
        w.comments_at(&offset.comments, CommentPosition::Before);
        w.kw("offset");
        format_expr(w, &offset.value);
    }
    if let Some(fetch) = &query.fetch {
        clause_break(w);
        w.comments_at(&fetch.comments, CommentPosition::Before);
        w.kw("fetch");
        w.kw(if fetch.first { "first" } else { "next" });
        format_expr(w, &fetch.count);
        w.kw("rows");
        w.kw("only");
    }
    if let Some(for_clause) = &query.for_clause {
        clause_break(w);
        w.kw("for");
        match for_clause.mode {
            LockMode::Update => w.kw("update"),
            LockMode::Share => w.kw("share"),
        }
    }

    w.comments_at(&query.comments, CommentPosition::After);
}

fn format_select_items(w: &mut SqlWriter, items: &[SelectItem], mode: ListBreak) {
    let last = items.len().saturating_sub(1);
    for (i, item) in items.iter().enumerate() {
        if i > 0 && mode == ListBreak::Before {
            // After/None emit the comma at the end of the previous item
            if w.multiline() {
                w.newline();
                w.glue(", ");
            } else {
                w.glue(",");
            }
        }

        w.comments_at(&item.comments, CommentPosition::Before);
        format_expr_parts(w, &item.expr, false);
        if let Some(alias) = &item.alias {
            w.kw("as");
            w.ident(alias);
        }

        let trailing_line_ok = w.multiline();
        match mode {
            ListBreak::Before => {
                format_item_after_comments(w, item, trailing_line_ok && i != last);
            }
            ListBreak::After => {
                if i != last {
                    w.glue(",");
                }
                format_item_after_comments(w, item, trailing_line_ok);
                if i != last && w.multiline() {
                    w.newline();
                }
            }
            ListBreak::None => {
                if i != last {
                    w.glue(",");
                }
                format_item_after_comments(w, item, false);
            }
        }
    }
}

fn format_item_after_comments(w: &mut SqlWriter, item: &SelectItem, allow_line: bool) {
    w.comments_at_ext(&item.expr.comments, CommentPosition::After, allow_line);
    w.comments_at_ext(&item.comments, CommentPosition::After, allow_line);
}

pub fn format_with_clause(w: &mut SqlWriter, with: &WithClause) {
    let style = w.opts.effective_with_style();
    if style == WithClauseStyle::FullOneline {
        w.begin_oneline();
    }
    w.comments_at(&with.comments, CommentPosition::Before);
    w.kw("with");
    if with.recursive {
        w.kw("recursive");
    }
    for (i, cte) in with.tables.iter().enumerate() {
        if i > 0 {
            w.comma_sep(w.opts.cte_comma_break);
        }
        format_common_table(w, cte, style);
    }
    if style == WithClauseStyle::FullOneline {
        w.end_oneline();
    }
}

fn format_common_table(w: &mut SqlWriter, cte: &CommonTable, style: WithClauseStyle) {
    w.comments_at(&cte.comments, CommentPosition::Before);
    w.ident(&cte.name);
    if let Some(columns) = &cte.columns {
        w.glue("(");
        format_ident_list(w, columns);
        w.glue(")");
    }
    w.kw("as");
    if let Some(materialized) = cte.materialized {
        if !materialized {
            w.kw("not");
        }
        w.kw("materialized");
    }
    w.atom("(");
    if style == WithClauseStyle::CteOneline {
        w.begin_oneline();
    }
    if w.multiline() {
        w.indent();
        w.newline();
    }
    format_query(w, &cte.query);
    if w.multiline() {
        w.dedent();
        w.newline();
    }
    if style == WithClauseStyle::CteOneline {
        w.end_oneline();
    }
    w.glue(")");
    w.comments_at_ext(&cte.comments, CommentPosition::After, w.multiline());
}

pub fn format_values(w: &mut SqlWriter, values: &ValuesQuery) {
    if w.opts.values_one_line {
        w.begin_oneline();
    }
    w.comments_at(&values.comments, CommentPosition::Before);
    w.kw("values");
    for (i, tuple) in values.tuples.iter().enumerate() {
        if i > 0 {
            w.comma_sep(w.opts.values_comma_break);
        }
        w.atom("(");
        format_expr_list(w, tuple);
        w.glue(")");
    }
    if w.opts.values_one_line {
        w.end_oneline();
    }
}

fn format_from_clause(w: &mut SqlWriter, from: &FromClause) {
    w.comments_at(&from.comments, CommentPosition::Before);
    w.kw("from");

    // declaration order of binding names, for ON-condition normalization
    let declared: Vec<String> = from
        .sources()
        .iter()
        .filter_map(|s| s.binding_name().map(|n| n.to_ascii_lowercase()))
        .collect();

    format_source(w, &from.source);
    for join in &from.joins {
        format_join(w, join, &declared);
    }
}

fn format_join(w: &mut SqlWriter, join: &JoinClause, declared: &[String]) {
    w.comments_at(&join.comments, CommentPosition::Before);
    match join.kind {
        JoinKind::Comma => {
            w.glue(",");
        }
        _ => {
            if w.multiline() && !w.opts.join_one_line {
                w.newline();
            }
            match join.kind {
                JoinKind::Inner => w.kws(&["inner", "join"]),
                JoinKind::Left => w.kws(&["left", "join"]),
                JoinKind::Right => w.kws(&["right", "join"]),
                JoinKind::Full => w.kws(&["full", "join"]),
                JoinKind::Cross => w.kws(&["cross", "join"]),
                JoinKind::Comma => unreachable!(),
            }
        }
    }
    if join.lateral {
        w.kw("lateral");
    }
    format_source(w, &join.source);
    match &join.condition {
        Some(JoinCondition::On(condition)) => {
            w.kw("on");
            let normalized = normalize_on_condition(condition, declared, w);
            match &normalized {
                Some(swapped) => format_expr(w, swapped),
                None => format_expr(w, condition),
            }
        }
        Some(JoinCondition::Using(columns)) => {
            w.kw("using");
            w.atom("(");
            format_ident_list(w, columns);
            w.glue(")");
        }
        None => {}
    }
}

/// With `join_condition_order_by_declaration`, `ON b.x = a.y` becomes
/// `ON a.y = b.x` when `a` is declared before `b` in FROM.
fn normalize_on_condition(
    condition: &Expr,
    declared: &[String],
    w: &SqlWriter,
) -> Option<Expr> {
    if !w.opts.join_condition_order_by_declaration {
        return None;
    }
    let ExprKind::Binary { left, op, right } = &condition.kind else {
        return None;
    };
    if *op != BinaryOp::Eq {
        return None;
    }
    let (ExprKind::ColumnRef(l), ExprKind::ColumnRef(r)) = (&left.kind, &right.kind) else {
        return None;
    };
    let position = |c: &ColumnRef| {
        c.namespaces
            .first()
            .and_then(|ns| declared.iter().position(|d| *d == ns.value.to_ascii_lowercase()))
    };
    let (lp, rp) = (position(l)?, position(r)?);
    if rp < lp {
        Some(Expr::binary((**right).clone(), BinaryOp::Eq, (**left).clone()))
    } else {
        None
    }
}

pub fn format_source(w: &mut SqlWriter, source: &SourceExpr) {
    w.comments_at(&source.comments, CommentPosition::Before);
    match &source.kind {
        SourceKind::Table(table) => format_table_ref(w, table),
        SourceKind::Subquery(query) => {
            w.atom("(");
            format_subquery(w, query);
            w.glue(")");
        }
        SourceKind::Function(call) => format_function_call(w, call),
        SourceKind::Values(values) => format_values(w, values),
        SourceKind::Paren(inner) => {
            w.atom("(");
            format_source(w, &inner.source);
            let declared: Vec<String> = inner
                .sources()
                .iter()
                .filter_map(|s| s.binding_name().map(|n| n.to_ascii_lowercase()))
                .collect();
            for join in &inner.joins {
                format_join(w, join, &declared);
            }
            w.glue(")");
        }
    }
    if let Some(alias) = &source.alias {
        w.kw("as");
        w.ident(&alias.name);
        if let Some(columns) = &alias.columns {
            w.glue("(");
            format_ident_list(w, columns);
            w.glue(")");
        }
    }
    w.comments_at(&source.comments, CommentPosition::After);
}

pub fn format_table_ref(w: &mut SqlWriter, table: &TableRef) {
    for (i, ns) in table.namespaces.iter().enumerate() {
        if i == 0 {
            w.ident(ns);
        } else {
            w.glue(".");
            w.ident_glued(ns);
        }
    }
    if table.namespaces.is_empty() {
        w.ident(&table.name);
    } else {
        w.glue(".");
        w.ident_glued(&table.name);
    }
}

fn format_group_by(w: &mut SqlWriter, group_by: &GroupByClause) {
    w.comments_at(&group_by.comments, CommentPosition::Before);
    w.kws(&["group", "by"]);
    match &group_by.grouping {
        GroupingKind::Plain(exprs) => format_expr_list(w, exprs),
        GroupingKind::Rollup(exprs) => {
            w.kw("rollup");
            w.atom("(");
            format_expr_list(w, exprs);
            w.glue(")");
        }
        GroupingKind::Cube(exprs) => {
            w.kw("cube");
            w.atom("(");
            format_expr_list(w, exprs);
            w.glue(")");
        }
        GroupingKind::Sets(sets) => {
            w.kws(&["grouping", "sets"]);
            w.atom("(");
            for (i, set) in sets.iter().enumerate() {
                if i > 0 {
                    w.glue(",");
                }
                w.atom("(");
                format_expr_list(w, set);
                w.glue(")");
            }
            w.glue(")");
        }
    }
}

pub fn format_order_by(w: &mut SqlWriter, order_by: &OrderByClause) {
    w.comments_at(&order_by.comments, CommentPosition::Before);
    w.kws(&["order", "by"]);
    let last = order_by.items.len().saturating_sub(1);
    for (i, item) in order_by.items.iter().enumerate() {
        w.comments_at(&item.comments, CommentPosition::Before);
        format_expr_parts(w, &item.expr, true);
        match item.direction {
            SortDirection::Asc => w.kw("asc"),
            SortDirection::Desc => w.kw("desc"),
            SortDirection::Default => {}
        }
        match item.nulls {
            NullsOrder::First => w.kws(&["nulls", "first"]),
            NullsOrder::Last => w.kws(&["nulls", "last"]),
            NullsOrder::Default => {}
        }
        if i != last {
            w.glue(",");
        }
        w.comments_at(&item.comments, CommentPosition::After);
    }
}

pub fn format_insert(w: &mut SqlWriter, insert: &InsertQuery) {
    w.comments_at(&insert.comments, CommentPosition::Before);
    w.kws(&["insert", "into"]);
    format_table_ref(w, &insert.target);
    if !insert.columns.is_empty() {
        if w.opts.insert_columns_one_line {
            w.begin_oneline();
        }
        w.glue("(");
        format_ident_list(w, &insert.columns);
        w.glue(")");
        if w.opts.insert_columns_one_line {
            w.end_oneline();
        }
    }
    clause_break(w);
    format_query(w, &insert.source);

    if let Some(on_conflict) = &insert.on_conflict {
        clause_break(w);
        w.kws(&["on", "conflict"]);
        if let Some(target) = &on_conflict.target {
            w.atom("(");
            format_ident_list(w, target);
            w.glue(")");
        }
        match &on_conflict.action {
            OnConflictAction::DoNothing => w.kws(&["do", "nothing"]),
            OnConflictAction::DoUpdate {
                set_items,
                where_clause,
            } => {
                w.kws(&["do", "update", "set"]);
                format_set_items(w, set_items);
                if let Some(predicate) = where_clause {
                    w.kw("where");
                    format_expr(w, predicate);
                }
            }
        }
    }
    if let Some(returning) = &insert.returning {
        clause_break(w);
        format_returning(w, returning);
    }
    w.comments_at(&insert.comments, CommentPosition::After);
}

pub fn format_update(w: &mut SqlWriter, update: &UpdateQuery) {
    w.comments_at(&update.comments, CommentPosition::Before);
    if let Some(with) = &update.with_clause {
        format_with_clause(w, with);
        clause_break(w);
    }
    w.kw("update");
    format_source(w, &update.target);
    w.kw("set");
    format_set_items(w, &update.set_items);
    if let Some(from) = &update.from {
        clause_break(w);
        format_from_clause(w, from);
    }
    if let Some(where_clause) = &update.where_clause {
        clause_break(w);
        w.comments_at(&where_clause.comments, CommentPosition::Before);
        w.kw("where");
        format_expr(w, &where_clause.condition);
    }
    if let Some(returning) = &update.returning {
        clause_break(w);
        format_returning(w, returning);
    }
    w.comments_at(&update.comments, CommentPosition::After);
}

fn format_set_items(w: &mut SqlWriter, items: &[SetItem]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            w.glue(",");
        }
        format_column_ref(w, &item.column);
        w.atom("=");
        format_expr(w, &item.value);
    }
}

fn format_returning(w: &mut SqlWriter, items: &[SelectItem]) {
    w.kw("returning");
    let last = items.len().saturating_sub(1);
    for (i, item) in items.iter().enumerate() {
        format_expr_parts(w, &item.expr, true);
        if let Some(alias) = &item.alias {
            w.kw("as");
            w.ident(alias);
        }
        if i != last {
            w.glue(",");
        }
    }
}

pub fn format_create_table(w: &mut SqlWriter, create: &CreateTableQuery) {
    w.comments_at(&create.comments, CommentPosition::Before);
    w.kw("create");
    if create.temporary {
        w.kw("temporary");
    }
    w.kw("table");
    if create.if_not_exists {
        w.kws(&["if", "not", "exists"]);
    }
    format_table_ref(w, &create.name);
    match &create.body {
        CreateTableBody::AsSelect(query) => {
            w.kw("as");
            clause_break(w);
            format_query(w, query);
        }
        CreateTableBody::Columns {
            columns,
            constraints,
        } => {
            w.atom("(");
            let mut first = true;
            for column in columns {
                if !first {
                    w.glue(",");
                }
                first = false;
                format_column_def(w, column);
            }
            for constraint in constraints {
                if !first {
                    w.glue(",");
                }
                first = false;
                format_table_constraint(w, constraint);
            }
            w.glue(")");
        }
    }
    w.comments_at(&create.comments, CommentPosition::After);
}

fn format_column_def(w: &mut SqlWriter, column: &ColumnDef) {
    w.comments_at(&column.comments, CommentPosition::Before);
    w.ident(&column.name);
    w.atom(&column.data_type.text);
    for constraint in &column.constraints {
        match constraint {
            ColumnConstraint::NotNull => w.kws(&["not", "null"]),
            ColumnConstraint::Null => w.kw("null"),
            ColumnConstraint::Default(expr) => {
                w.kw("default");
                format_expr(w, expr);
            }
            ColumnConstraint::PrimaryKey => w.kws(&["primary", "key"]),
            ColumnConstraint::Unique => w.kw("unique"),
            ColumnConstraint::Check(predicate) => {
                w.kw("check");
                w.atom("(");
                format_expr(w, predicate);
                w.glue(")");
            }
            ColumnConstraint::References { table, columns } => {
                w.kw("references");
                format_table_ref(w, table);
                if !columns.is_empty() {
                    w.atom("(");
                    format_ident_list(w, columns);
                    w.glue(")");
                }
            }
        }
    }
    w.comments_at(&column.comments, CommentPosition::After);
}

fn format_table_constraint(w: &mut SqlWriter, constraint: &TableConstraint) {
    if let Some(name) = &constraint.name {
        w.kw("constraint");
        w.ident(name);
    }
    match &constraint.kind {
        TableConstraintKind::PrimaryKey(columns) => {
            w.kws(&["primary", "key"]);
            w.atom("(");
            format_ident_list(w, columns);
            w.glue(")");
        }
        TableConstraintKind::Unique(columns) => {
            w.kw("unique");
            w.atom("(");
            format_ident_list(w, columns);
            w.glue(")");
        }
        TableConstraintKind::Check(predicate) => {
            w.kw("check");
            w.atom("(");
            format_expr(w, predicate);
            w.glue(")");
        }
        TableConstraintKind::ForeignKey {
            columns,
            ref_table,
            ref_columns,
        } => {
            w.kws(&["foreign", "key"]);
            w.atom("(");
            format_ident_list(w, columns);
            w.glue(")");
            w.kw("references");
            format_table_ref(w, ref_table);
            if !ref_columns.is_empty() {
                w.atom("(");
                format_ident_list(w, ref_columns);
                w.glue(")");
            }
        }
    }
}

pub fn format_create_index(w: &mut SqlWriter, create: &CreateIndexQuery) {
    w.comments_at(&create.comments, CommentPosition::Before);
    w.kw("create");
    if create.unique {
        w.kw("unique");
    }
    w.kw("index");
    w.ident(&create.name);
    w.kw("on");
    format_table_ref(w, &create.table);
    w.atom("(");
    format_ident_list(w, &create.columns);
    w.glue(")");
}

fn format_ident_list(w: &mut SqlWriter, idents: &[Ident]) {
    for (i, ident) in idents.iter().enumerate() {
        if i > 0 {
            w.glue(",");
        }
        w.ident(ident);
    }
}
