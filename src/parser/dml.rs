//! INSERT and UPDATE statements.

use crate::ast::*;
use crate::error::{Error, Result};

use super::expr::{parse_expr, parse_ident};
use super::query::{parse_from_clause, parse_query, parse_source, parse_with_clause};
use super::stream::TokenStream;

pub fn parse_insert_query(s: &mut TokenStream) -> Result<InsertQuery, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("insert")?;
    s.expect_keyword("into")?;

    let target = parse_table_ref(s)?;

    let columns = if s.peek().is_symbol("(") {
        s.next();
        let mut cols = vec![parse_ident(s)?];
        while s.eat_symbol(",") {
            cols.push(parse_ident(s)?);
        }
        s.expect_symbol(")")?;
        cols
    } else {
        Vec::new()
    };

    let source = parse_query(s)?;

    let on_conflict = if s.peek().is_keyword("on") && s.peek_ahead(1).is_keyword("conflict") {
        s.next();
        s.next();
        Some(parse_on_conflict(s)?)
    } else {
        None
    };

    let returning = parse_returning(s)?;

    Ok(InsertQuery {
        target,
        columns,
        source,
        on_conflict,
        returning,
        comments,
    })
}

fn parse_on_conflict(s: &mut TokenStream) -> Result<OnConflictClause, Error> {
    let target = if s.peek().is_symbol("(") {
        s.next();
        let mut cols = vec![parse_ident(s)?];
        while s.eat_symbol(",") {
            cols.push(parse_ident(s)?);
        }
        s.expect_symbol(")")?;
        Some(cols)
    } else {
        None
    };
    s.expect_keyword("do")?;
    let action = if s.eat_keyword("nothing") {
        OnConflictAction::DoNothing
    } else {
        s.expect_keyword("update")?;
        s.expect_keyword("set")?;
        let set_items = parse_set_items(s)?;
        let where_clause = if s.eat_keyword("where") {
            Some(parse_expr(s)?)
        } else {
            None
        };
        OnConflictAction::DoUpdate {
            set_items,
            where_clause,
        }
    };
    Ok(OnConflictClause { target, action })
}

pub fn parse_update_query(s: &mut TokenStream) -> Result<UpdateQuery, Error> {
    let with_clause = if s.peek().is_keyword("with") {
        Some(parse_with_clause(s)?)
    } else {
        None
    };
    let comments = s.take_leading(s.index());
    s.expect_keyword("update")?;
    let target = parse_source(s)?;
    s.expect_keyword("set")?;
    let set_items = parse_set_items(s)?;

    let from = if s.peek().is_keyword("from") {
        Some(parse_from_clause(s)?)
    } else {
        None
    };
    let where_clause = if s.peek().is_keyword("where") {
        let clause_comments = s.take_leading(s.index());
        s.next();
        Some(WhereClause {
            condition: parse_expr(s)?,
            comments: clause_comments,
        })
    } else {
        None
    };
    let returning = parse_returning(s)?;

    Ok(UpdateQuery {
        with_clause,
        target,
        set_items,
        from,
        where_clause,
        returning,
        comments,
    })
}

fn parse_set_items(s: &mut TokenStream) -> Result<Vec<SetItem>, Error> {
    let mut items = vec![parse_set_item(s)?];
    while s.eat_symbol(",") {
        items.push(parse_set_item(s)?);
    }
    Ok(items)
}

fn parse_set_item(s: &mut TokenStream) -> Result<SetItem, Error> {
    let mut parts = vec![parse_ident(s)?];
    while s.eat_symbol(".") {
        parts.push(parse_ident(s)?);
    }
    let name = parts.pop().expect("at least one identifier part");
    let column = ColumnRef {
        namespaces: parts,
        name,
    };
    if !s.eat_operator("=") {
        return Err(s.expected("`=`"));
    }
    let value = parse_expr(s)?;
    Ok(SetItem { column, value })
}

fn parse_returning(s: &mut TokenStream) -> Result<Option<Vec<SelectItem>>, Error> {
    if !s.eat_keyword("returning") {
        return Ok(None);
    }
    let mut items = vec![parse_returning_item(s)?];
    while s.eat_symbol(",") {
        items.push(parse_returning_item(s)?);
    }
    Ok(Some(items))
}

fn parse_returning_item(s: &mut TokenStream) -> Result<SelectItem, Error> {
    let expr = parse_expr(s)?;
    let alias = if s.eat_keyword("as") {
        Some(parse_ident(s)?)
    } else {
        None
    };
    Ok(SelectItem {
        expr,
        alias,
        comments: Vec::new(),
    })
}

pub fn parse_table_ref(s: &mut TokenStream) -> Result<TableRef, Error> {
    let mut parts = vec![parse_ident(s)?];
    while s.eat_symbol(".") {
        parts.push(parse_ident(s)?);
    }
    let name = parts.pop().expect("at least one identifier part");
    Ok(TableRef {
        namespaces: parts,
        name,
    })
}
