//! SQL text → AST.
//!
//! Statements and clauses are recursive-descent; value expressions use
//! precedence climbing ([expr]). Everything here works on the comment-aware
//! token cursor in [stream].

mod ddl;
mod dml;
mod expr;
mod query;
mod stream;

pub use stream::TokenStream;

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;
use crate::lexer;

pub use self::expr::{parse_expr, parse_ident, parse_type_name};
pub use self::query::{parse_order_by_clause, parse_query as parse_query_at, query_follows};

/// Parse a SELECT-shaped statement (including set operations, WITH and
/// VALUES roots).
pub fn parse_select(sql: &str) -> Result<Query> {
    let mut s = tokens(sql)?;
    let mut parsed = query::parse_query(&mut s)?;
    finish(&mut s)?;
    sweep_into(root_comments_mut(&mut parsed), &mut s);
    Ok(parsed)
}

pub fn parse_insert(sql: &str) -> Result<InsertQuery> {
    let mut s = tokens(sql)?;
    let mut parsed = dml::parse_insert_query(&mut s)?;
    finish(&mut s)?;
    sweep_into(&mut parsed.comments, &mut s);
    Ok(parsed)
}

pub fn parse_update(sql: &str) -> Result<UpdateQuery> {
    let mut s = tokens(sql)?;
    let mut parsed = dml::parse_update_query(&mut s)?;
    finish(&mut s)?;
    sweep_into(&mut parsed.comments, &mut s);
    Ok(parsed)
}

pub fn parse_create_table(sql: &str) -> Result<CreateTableQuery> {
    let mut s = tokens(sql)?;
    let mut parsed = ddl::parse_create_table_query(&mut s)?;
    finish(&mut s)?;
    sweep_into(&mut parsed.comments, &mut s);
    Ok(parsed)
}

pub fn parse_values(sql: &str) -> Result<ValuesQuery> {
    let mut s = tokens(sql)?;
    let mut parsed = query::parse_values_query(&mut s)?;
    finish(&mut s)?;
    sweep_into(&mut parsed.comments, &mut s);
    Ok(parsed)
}

/// Parse a single value expression, e.g. a column default.
pub fn parse_value(sql: &str) -> Result<Expr> {
    let mut s = tokens(sql)?;
    let mut parsed = expr::parse_expr(&mut s)?;
    finish(&mut s)?;
    sweep_into(&mut parsed.comments, &mut s);
    Ok(parsed)
}

/// Parse any supported root statement, dispatching on the leading keyword.
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let mut s = tokens(sql)?;
    let mut parsed = parse_statement_at(&mut s)?;
    finish(&mut s)?;
    match &mut parsed {
        Statement::Query(q) => sweep_into(root_comments_mut(q), &mut s),
        Statement::Insert(i) => sweep_into(&mut i.comments, &mut s),
        Statement::Update(u) => sweep_into(&mut u.comments, &mut s),
        Statement::CreateTable(c) => sweep_into(&mut c.comments, &mut s),
        Statement::CreateIndex(c) => sweep_into(&mut c.comments, &mut s),
    }
    Ok(parsed)
}

/// Parse a `;`-separated script of DDL statements (CREATE TABLE and CREATE
/// INDEX), the input shape the DDL differ consumes.
pub fn parse_ddl(sql: &str) -> Result<Vec<Statement>> {
    let raw = lexer::tokenize(sql)?;
    let mut s = TokenStream::new(raw);
    let mut statements = Vec::new();
    loop {
        while s.eat_symbol(";") {}
        if s.at_eof() {
            break;
        }
        statements.push(parse_statement_at(&mut s)?);
    }
    Ok(statements)
}

fn parse_statement_at(s: &mut TokenStream) -> Result<Statement> {
    let statement = if s.peek().is_keyword("insert") {
        Statement::Insert(dml::parse_insert_query(s)?)
    } else if s.peek().is_keyword("update")
        || (s.peek().is_keyword("with") && update_follows_with(s))
    {
        Statement::Update(dml::parse_update_query(s)?)
    } else if s.peek().is_keyword("create") {
        if create_index_follows(s) {
            Statement::CreateIndex(ddl::parse_create_index_query(s)?)
        } else {
            Statement::CreateTable(ddl::parse_create_table_query(s)?)
        }
    } else {
        Statement::Query(query::parse_query(s)?)
    };
    Ok(statement)
}

/// Look past a WITH clause to see whether it introduces an UPDATE. The
/// scan only needs to balance parentheses.
fn update_follows_with(s: &TokenStream) -> bool {
    let mut depth = 0usize;
    let mut i = 0usize;
    loop {
        let t = s.peek_ahead(i);
        if t.is_eof() {
            return false;
        }
        if t.is_symbol("(") {
            depth += 1;
        } else if t.is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_keyword("update") {
            return true;
        } else if depth == 0 && t.is_keyword("select") && i > 0 {
            return false;
        }
        i += 1;
    }
}

fn create_index_follows(s: &TokenStream) -> bool {
    s.peek_ahead(1).is_keyword("index")
        || (s.peek_ahead(1).is_keyword("unique") && s.peek_ahead(2).is_keyword("index"))
}

fn tokens(sql: &str) -> Result<TokenStream> {
    if sql.trim().is_empty() {
        return Err(Error::parse("Empty SQL").into());
    }
    let raw = lexer::tokenize(sql)?;
    Ok(TokenStream::new(raw))
}

fn finish(s: &mut TokenStream) -> Result<()> {
    while s.eat_symbol(";") {}
    if !s.at_eof() {
        return Err(s.unexpected().into());
    }
    Ok(())
}

/// Any comments never claimed during the parse land on the root, so the
/// comment multiset from the lexer is conserved.
fn sweep_into(comments: &mut Comments, s: &mut TokenStream) {
    comments.extend(s.drain_unclaimed());
}

fn root_comments_mut(query: &mut Query) -> &mut Comments {
    match query {
        Query::Select(s) => &mut s.comments,
        Query::Binary(b) => &mut b.comments,
        Query::Values(v) => &mut v.comments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_with_joins_and_groups() {
        let q = parse_select(
            "select c.name, count(p.id) as n from categories c \
             join products p on c.id = p.category_id \
             where p.active = true group by c.name having count(p.id) > 1 \
             order by n desc nulls last limit 10 offset 5",
        )
        .unwrap();
        let q = q.into_select().unwrap();
        assert_eq!(q.select.items.len(), 2);
        let from = q.from.as_ref().unwrap();
        assert_eq!(from.joins.len(), 1);
        assert!(q.group_by.is_some());
        assert!(q.having.is_some());
        assert_eq!(q.order_by.as_ref().unwrap().items.len(), 1);
        assert!(q.limit.is_some() && q.offset.is_some());
    }

    #[test]
    fn set_operation_precedence() {
        // INTERSECT binds tighter than UNION
        let q = parse_select("select 1 union select 2 intersect select 3").unwrap();
        let b = q.into_binary().unwrap();
        assert_eq!(b.op, SetOperator::Union);
        let right = b.right.into_binary().unwrap();
        assert_eq!(right.op, SetOperator::Intersect);
    }

    #[test]
    fn with_clause_and_ctes() {
        let q = parse_select(
            "with recursive t(n) as (select 1 union all select n + 1 from t where n < 5) \
             select n from t",
        )
        .unwrap();
        let q = q.into_select().unwrap();
        let with = q.with_clause.unwrap();
        assert!(with.recursive);
        assert_eq!(with.tables[0].name.value, "t");
        assert_eq!(with.tables[0].columns.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn keyword_as_column_name() {
        let q = parse_select("select user from t").unwrap();
        let q = q.into_select().unwrap();
        assert_eq!(q.select.items[0].output_name(), Some("user"));
    }

    #[test]
    fn window_function_with_filter_and_frame() {
        let q = parse_select(
            "select sum(x) filter (where x > 0) over \
             (partition by g order by y rows between unbounded preceding and current row) \
             from t",
        )
        .unwrap();
        let q = q.into_select().unwrap();
        let call = q.select.items[0].expr.kind.as_function().unwrap();
        assert!(call.filter.is_some());
        let over = call.over.as_ref().unwrap();
        assert_eq!(over.partition_by.len(), 1);
        assert!(over.frame.is_some());
    }

    #[test]
    fn insert_with_values_and_returning() {
        let i =
            parse_insert("insert into t (a, b) values (1, 'x'), (2, 'y') returning a").unwrap();
        assert_eq!(i.columns.len(), 2);
        let values = i.source.as_values().unwrap();
        assert_eq!(values.tuples.len(), 2);
        assert!(i.returning.is_some());
    }

    #[test]
    fn update_with_from() {
        let u = parse_update("update t set a = s.a from s where t.id = s.id").unwrap();
        assert_eq!(u.set_items.len(), 1);
        assert!(u.from.is_some());
        assert!(u.where_clause.is_some());
    }

    #[test]
    fn create_table_with_constraints() {
        let c = parse_create_table(
            "create table users (\
             id serial primary key, \
             email text not null unique, \
             age int check (age >= 0), \
             org_id int references orgs (id), \
             constraint uq_email_org unique (email, org_id))",
        )
        .unwrap();
        assert_eq!(c.columns().len(), 4);
        assert_eq!(c.constraints().len(), 1);
        assert!(c.column("id").unwrap().is_serial());
        assert!(c.column("email").unwrap().not_null());
    }

    #[test]
    fn function_source_with_column_alias() {
        let q = parse_select("select value from generate_series(1, 3) as n(value)").unwrap();
        let q = q.into_select().unwrap();
        let source = &q.from.as_ref().unwrap().source;
        assert!(source.kind.is_function());
        let alias = source.alias.as_ref().unwrap();
        assert_eq!(alias.name.value, "n");
        assert_eq!(alias.columns.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn nested_parenthesized_join() {
        let q = parse_select("select * from (a join b on a.id = b.id) join c using (id)")
            .unwrap();
        let q = q.into_select().unwrap();
        let from = q.from.as_ref().unwrap();
        assert!(from.source.kind.is_paren());
        assert_eq!(from.joins.len(), 1);
    }

    #[test]
    fn unexpected_token_reports_position() {
        let err = parse_select("select from t").unwrap_err();
        let err = crate::error::downcast(err);
        assert!(err.inner[0].reason.contains("expected"));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_select("select 1 2").is_err());
    }

    #[test]
    fn between_and_precedence() {
        let q = parse_select("select * from t where a between 1 and 2 and b = 3").unwrap();
        let q = q.into_select().unwrap();
        let cond = &q.where_clause.as_ref().unwrap().condition;
        // top-level operator must be AND, with BETWEEN on its left
        match &cond.kind {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::And);
                assert!(matches!(left.kind, ExprKind::Between { .. }));
            }
            other => panic!("expected binary AND, got {other:?}"),
        }
    }

    #[test]
    fn ddl_script_splits_statements() {
        let statements = parse_ddl(
            "create table a (id int); create unique index ix_a on a (id);",
        )
        .unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].is_create_table());
        assert!(statements[1].is_create_index());
    }
}
