//! CREATE TABLE and CREATE INDEX.

use crate::ast::*;
use crate::error::{Error, Result};

use super::dml::parse_table_ref;
use super::expr::{parse_expr, parse_ident, parse_type_name};
use super::query::parse_query;
use super::stream::TokenStream;

pub fn parse_create_table_query(s: &mut TokenStream) -> Result<CreateTableQuery, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("create")?;
    let temporary = s.eat_keyword("temporary") || s.eat_keyword("temp");
    s.expect_keyword("table")?;
    let if_not_exists = s.eat_keywords(&["if", "not", "exists"]);
    let name = parse_table_ref(s)?;

    let body = if s.eat_keyword("as") {
        CreateTableBody::AsSelect(parse_query(s)?)
    } else {
        s.expect_symbol("(")?;
        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        loop {
            if table_constraint_follows(s) {
                constraints.push(parse_table_constraint(s)?);
            } else {
                columns.push(parse_column_def(s)?);
            }
            if !s.eat_symbol(",") {
                break;
            }
        }
        s.expect_symbol(")")?;
        CreateTableBody::Columns {
            columns,
            constraints,
        }
    };

    Ok(CreateTableQuery {
        temporary,
        if_not_exists,
        name,
        body,
        comments,
    })
}

fn table_constraint_follows(s: &TokenStream) -> bool {
    let t = s.peek();
    t.is_keyword("constraint")
        || t.is_keyword("primary")
        || t.is_keyword("unique") && s.peek_ahead(1).is_symbol("(")
        || t.is_keyword("check") && s.peek_ahead(1).is_symbol("(")
        || t.is_keyword("foreign")
}

fn parse_column_def(s: &mut TokenStream) -> Result<ColumnDef, Error> {
    let comments = s.take_leading(s.index());
    let name = parse_ident(s)?;
    let data_type = parse_type_name(s)?;
    let mut constraints = Vec::new();
    loop {
        if s.peek().is_keyword("not") && s.peek_ahead(1).is_keyword("null") {
            s.next();
            s.next();
            constraints.push(ColumnConstraint::NotNull);
        } else if s.eat_keyword("null") {
            constraints.push(ColumnConstraint::Null);
        } else if s.eat_keyword("default") {
            constraints.push(ColumnConstraint::Default(parse_expr(s)?));
        } else if s.peek().is_keyword("primary") {
            s.next();
            s.expect_keyword("key")?;
            constraints.push(ColumnConstraint::PrimaryKey);
        } else if s.eat_keyword("unique") {
            constraints.push(ColumnConstraint::Unique);
        } else if s.eat_keyword("check") {
            s.expect_symbol("(")?;
            let predicate = parse_expr(s)?;
            s.expect_symbol(")")?;
            constraints.push(ColumnConstraint::Check(predicate));
        } else if s.eat_keyword("references") {
            let table = parse_table_ref(s)?;
            let columns = if s.eat_symbol("(") {
                let mut cols = vec![parse_ident(s)?];
                while s.eat_symbol(",") {
                    cols.push(parse_ident(s)?);
                }
                s.expect_symbol(")")?;
                cols
            } else {
                Vec::new()
            };
            constraints.push(ColumnConstraint::References { table, columns });
        } else {
            break;
        }
    }
    Ok(ColumnDef {
        name,
        data_type,
        constraints,
        comments,
    })
}

fn parse_table_constraint(s: &mut TokenStream) -> Result<TableConstraint, Error> {
    let name = if s.eat_keyword("constraint") {
        Some(parse_ident(s)?)
    } else {
        None
    };
    let kind = if s.peek().is_keyword("primary") {
        s.next();
        s.expect_keyword("key")?;
        TableConstraintKind::PrimaryKey(parse_ident_list(s)?)
    } else if s.eat_keyword("unique") {
        TableConstraintKind::Unique(parse_ident_list(s)?)
    } else if s.eat_keyword("check") {
        s.expect_symbol("(")?;
        let predicate = parse_expr(s)?;
        s.expect_symbol(")")?;
        TableConstraintKind::Check(predicate)
    } else {
        s.expect_keyword("foreign")?;
        s.expect_keyword("key")?;
        let columns = parse_ident_list(s)?;
        s.expect_keyword("references")?;
        let ref_table = parse_table_ref(s)?;
        let ref_columns = if s.peek().is_symbol("(") {
            parse_ident_list(s)?
        } else {
            Vec::new()
        };
        TableConstraintKind::ForeignKey {
            columns,
            ref_table,
            ref_columns,
        }
    };
    Ok(TableConstraint { name, kind })
}

fn parse_ident_list(s: &mut TokenStream) -> Result<Vec<Ident>, Error> {
    s.expect_symbol("(")?;
    let mut cols = vec![parse_ident(s)?];
    while s.eat_symbol(",") {
        cols.push(parse_ident(s)?);
    }
    s.expect_symbol(")")?;
    Ok(cols)
}

pub fn parse_create_index_query(s: &mut TokenStream) -> Result<CreateIndexQuery, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("create")?;
    let unique = s.eat_keyword("unique");
    s.expect_keyword("index")?;
    s.eat_keywords(&["if", "not", "exists"]);
    let name = parse_ident(s)?;
    s.expect_keyword("on")?;
    let table = parse_table_ref(s)?;
    let columns = parse_ident_list(s)?;
    Ok(CreateIndexQuery {
        unique,
        name,
        table,
        columns,
        comments,
    })
}
