//! Statements and clauses: recursive descent over the token cursor.

use crate::ast::*;
use crate::error::{Error, Result};
use crate::keywords;
use crate::lexer::TokenKind;

use super::expr::{parse_expr, parse_function_call, parse_ident};
use super::stream::TokenStream;

/// Does a query production start at the cursor?
pub fn query_follows(s: &TokenStream) -> bool {
    let t = s.peek();
    t.is_keyword("select") || t.is_keyword("with") || t.is_keyword("values")
}

/// Set operations with `INTERSECT` binding tighter than `UNION`/`EXCEPT`,
/// left-associative.
pub fn parse_query(s: &mut TokenStream) -> Result<Query, Error> {
    parse_set_expr(s, 0)
}

fn parse_set_expr(s: &mut TokenStream, min_prec: u8) -> Result<Query, Error> {
    let mut left = parse_query_operand(s)?;
    loop {
        let (prec, op) = if s.peek().is_keyword("union") {
            (1u8, None)
        } else if s.peek().is_keyword("except") {
            (1, Some(false))
        } else if s.peek().is_keyword("intersect") {
            (2, Some(true))
        } else {
            break;
        };
        if prec < min_prec {
            break;
        }
        let comments = s.take_leading(s.index());
        s.next();
        let all = s.eat_keyword("all");
        let set_op = match (op, all) {
            (None, false) => SetOperator::Union,
            (None, true) => SetOperator::UnionAll,
            (Some(true), false) => SetOperator::Intersect,
            (Some(true), true) => SetOperator::IntersectAll,
            (Some(false), false) => SetOperator::Except,
            (Some(false), true) => SetOperator::ExceptAll,
        };
        let right = parse_set_expr(s, prec + 1)?;
        left = Query::Binary(Box::new(BinaryQuery {
            op: set_op,
            left,
            right,
            comments,
        }));
    }
    Ok(left)
}

fn parse_query_operand(s: &mut TokenStream) -> Result<Query, Error> {
    if s.peek().is_symbol("(") {
        s.next();
        let query = parse_query(s)?;
        s.expect_symbol(")")?;
        return Ok(query);
    }
    if s.peek().is_keyword("with") {
        let with = parse_with_clause(s)?;
        let select = parse_select_query(s, Some(with))?;
        return Ok(Query::Select(Box::new(select)));
    }
    if s.peek().is_keyword("select") {
        let select = parse_select_query(s, None)?;
        return Ok(Query::Select(Box::new(select)));
    }
    if s.peek().is_keyword("values") {
        let values = parse_values_query(s)?;
        return Ok(Query::Values(Box::new(values)));
    }
    Err(s.expected("`SELECT`, `WITH` or `VALUES`"))
}

pub fn parse_values_query(s: &mut TokenStream) -> Result<ValuesQuery, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("values")?;
    let mut tuples = vec![parse_values_tuple(s)?];
    while s.eat_symbol(",") {
        tuples.push(parse_values_tuple(s)?);
    }
    Ok(ValuesQuery { tuples, comments })
}

fn parse_values_tuple(s: &mut TokenStream) -> Result<Vec<Expr>, Error> {
    s.expect_symbol("(")?;
    let mut values = vec![parse_expr(s)?];
    while s.eat_symbol(",") {
        values.push(parse_expr(s)?);
    }
    s.expect_symbol(")")?;
    Ok(values)
}

pub fn parse_with_clause(s: &mut TokenStream) -> Result<WithClause, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("with")?;
    let recursive = s.eat_keyword("recursive");
    let mut tables = vec![parse_common_table(s)?];
    while s.eat_symbol(",") {
        tables.push(parse_common_table(s)?);
    }
    Ok(WithClause {
        recursive,
        tables,
        comments,
    })
}

fn parse_common_table(s: &mut TokenStream) -> Result<CommonTable, Error> {
    let mut comments = s.take_leading(s.index());
    let name = parse_ident(s)?;
    let columns = if s.eat_symbol("(") {
        let mut cols = vec![parse_ident(s)?];
        while s.eat_symbol(",") {
            cols.push(parse_ident(s)?);
        }
        s.expect_symbol(")")?;
        Some(cols)
    } else {
        None
    };
    s.expect_keyword("as")?;
    let materialized = if s.eat_keyword("materialized") {
        Some(true)
    } else if s.peek().is_keyword("not") && s.peek_ahead(1).is_keyword("materialized") {
        s.next();
        s.next();
        Some(false)
    } else {
        None
    };
    s.expect_symbol("(")?;
    let query = parse_query(s)?;
    s.expect_symbol(")")?;
    comments.extend(s.take_trailing_of_last());
    Ok(CommonTable {
        name,
        columns,
        materialized,
        query,
        comments,
    })
}

pub fn parse_select_query(
    s: &mut TokenStream,
    with_clause: Option<WithClause>,
) -> Result<SelectQuery, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("select")?;

    let distinct = if s.eat_keyword("distinct") {
        if s.eat_keyword("on") {
            s.expect_symbol("(")?;
            let mut exprs = vec![parse_expr(s)?];
            while s.eat_symbol(",") {
                exprs.push(parse_expr(s)?);
            }
            s.expect_symbol(")")?;
            Some(Distinct::DistinctOn(exprs))
        } else {
            Some(Distinct::Distinct)
        }
    } else {
        None
    };

    let mut items = vec![parse_select_item(s)?];
    while s.eat_symbol(",") {
        items.push(parse_select_item(s)?);
    }

    let mut query = SelectQuery {
        with_clause,
        select: SelectClause {
            distinct,
            items,
            comments: Vec::new(),
        },
        comments,
        ..Default::default()
    };

    if s.peek().is_keyword("from") {
        query.from = Some(parse_from_clause(s)?);
    }
    if s.peek().is_keyword("where") {
        let clause_comments = s.take_leading(s.index());
        s.next();
        query.where_clause = Some(WhereClause {
            condition: parse_expr(s)?,
            comments: clause_comments,
        });
    }
    if s.peek().is_keyword("group") {
        query.group_by = Some(parse_group_by_clause(s)?);
    }
    if s.peek().is_keyword("having") {
        let clause_comments = s.take_leading(s.index());
        s.next();
        query.having = Some(HavingClause {
            condition: parse_expr(s)?,
            comments: clause_comments,
        });
    }
    if s.peek().is_keyword("order") {
        query.order_by = Some(parse_order_by_clause(s)?);
    }
    if s.peek().is_keyword("limit") {
        let clause_comments = s.take_leading(s.index());
        s.next();
        query.limit = Some(LimitClause {
            value: parse_expr(s)?,
            comments: clause_comments,
        });
    }
    if s.peek().is_keyword("offset") {
        let clause_comments = s.take_leading(s.index());
        s.next();
        let value = parse_expr(s)?;
        // optional ROW/ROWS noise word
        if s.peek().is_keyword("rows") || s.peek().canonical == "row" {
            s.next();
        }
        query.offset = Some(OffsetClause {
            value,
            comments: clause_comments,
        });
    }
    if s.peek().is_keyword("fetch") {
        query.fetch = Some(parse_fetch_clause(s)?);
    }
    if s.peek().is_keyword("for") {
        let clause_comments = s.take_leading(s.index());
        s.next();
        let mode = if s.eat_keyword("update") {
            LockMode::Update
        } else {
            s.expect_keyword("share")?;
            LockMode::Share
        };
        query.for_clause = Some(ForClause {
            mode,
            comments: clause_comments,
        });
    }

    Ok(query)
}

fn parse_select_item(s: &mut TokenStream) -> Result<SelectItem, Error> {
    let expr = parse_expr(s)?;
    let alias = if s.eat_keyword("as") {
        Some(parse_ident(s)?)
    } else if bare_alias_follows(s) {
        Some(parse_ident(s)?)
    } else {
        None
    };
    let comments = s.take_trailing_of_last();
    Ok(SelectItem {
        expr,
        alias,
        comments,
    })
}

/// A bare (AS-less) alias: an identifier-shaped token that does not start
/// the next clause.
fn bare_alias_follows(s: &TokenStream) -> bool {
    let t = s.peek();
    match t.kind {
        TokenKind::Ident | TokenKind::QuotedIdent(_) => true,
        TokenKind::Keyword => !keywords::is_reserved(&t.canonical),
        _ => false,
    }
}

pub fn parse_from_clause(s: &mut TokenStream) -> Result<FromClause, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("from")?;
    let source = parse_source(s)?;
    let joins = parse_joins(s)?;
    Ok(FromClause {
        source,
        joins,
        comments,
    })
}

/// Does a join production start at the cursor? The join-introducing
/// keywords only occur here in FROM position, so a bare keyword test is
/// enough.
fn join_follows(s: &TokenStream) -> bool {
    let t = s.peek();
    t.is_symbol(",")
        || t.is_keyword("join")
        || t.is_keyword("inner")
        || t.is_keyword("left")
        || t.is_keyword("right")
        || t.is_keyword("full")
        || t.is_keyword("cross")
}

fn parse_joins(s: &mut TokenStream) -> Result<Vec<JoinClause>, Error> {
    let mut joins = Vec::new();
    while join_follows(s) {
        let comments = s.take_leading(s.index());
        if s.eat_symbol(",") {
            let lateral = s.eat_keyword("lateral");
            let source = parse_source(s)?;
            joins.push(JoinClause {
                kind: JoinKind::Comma,
                lateral,
                source,
                condition: None,
                comments,
            });
            continue;
        }
        let kind = if s.eat_keyword("join") {
            JoinKind::Inner
        } else if s.eat_keywords(&["inner", "join"]) {
            JoinKind::Inner
        } else if s.peek().is_keyword("left") {
            s.next();
            s.eat_keyword("outer");
            s.expect_keyword("join")?;
            JoinKind::Left
        } else if s.peek().is_keyword("right") {
            s.next();
            s.eat_keyword("outer");
            s.expect_keyword("join")?;
            JoinKind::Right
        } else if s.peek().is_keyword("full") {
            s.next();
            s.eat_keyword("outer");
            s.expect_keyword("join")?;
            JoinKind::Full
        } else if s.eat_keywords(&["cross", "join"]) {
            JoinKind::Cross
        } else {
            break;
        };
        let lateral = s.eat_keyword("lateral");
        let source = parse_source(s)?;
        let condition = if matches!(kind, JoinKind::Cross) {
            None
        } else if s.eat_keyword("on") {
            Some(JoinCondition::On(parse_expr(s)?))
        } else if s.eat_keyword("using") {
            s.expect_symbol("(")?;
            let mut ids = vec![parse_ident(s)?];
            while s.eat_symbol(",") {
                ids.push(parse_ident(s)?);
            }
            s.expect_symbol(")")?;
            Some(JoinCondition::Using(ids))
        } else {
            None
        };
        joins.push(JoinClause {
            kind,
            lateral,
            source,
            condition,
            comments,
        });
    }
    Ok(joins)
}

pub fn parse_source(s: &mut TokenStream) -> Result<SourceExpr, Error> {
    let comments = s.take_leading(s.index());

    let kind = if s.peek().is_symbol("(") {
        s.next();
        if query_follows(s) {
            let query = parse_query(s)?;
            s.expect_symbol(")")?;
            SourceKind::Subquery(query)
        } else {
            // nested parenthesized join tree
            let inner_source = parse_source(s)?;
            let inner_joins = parse_joins(s)?;
            s.expect_symbol(")")?;
            SourceKind::Paren(Box::new(FromClause {
                source: inner_source,
                joins: inner_joins,
                comments: Vec::new(),
            }))
        }
    } else if s.peek().is_keyword("values") {
        SourceKind::Values(parse_values_query(s)?)
    } else {
        let mut parts = vec![parse_ident(s)?];
        while s.peek().is_symbol(".") {
            s.next();
            parts.push(parse_ident(s)?);
        }
        if s.peek().is_symbol("(") {
            SourceKind::Function(parse_function_call(s, parts)?)
        } else {
            let name = parts.pop().expect("at least one identifier part");
            SourceKind::Table(TableRef {
                namespaces: parts,
                name,
            })
        }
    };

    let alias = parse_source_alias(s)?;
    Ok(SourceExpr {
        kind,
        alias,
        comments,
    })
}

fn parse_source_alias(s: &mut TokenStream) -> Result<Option<SourceAlias>, Error> {
    let explicit = s.eat_keyword("as");
    if !explicit && !bare_alias_follows(s) {
        return Ok(None);
    }
    let name = parse_ident(s)?;
    let columns = if s.peek().is_symbol("(") {
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
    Ok(Some(SourceAlias { name, columns }))
}

fn parse_group_by_clause(s: &mut TokenStream) -> Result<GroupByClause, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("group")?;
    s.expect_keyword("by")?;

    let grouping = if s.eat_keyword("rollup") {
        s.expect_symbol("(")?;
        let exprs = parse_expr_list(s)?;
        s.expect_symbol(")")?;
        GroupingKind::Rollup(exprs)
    } else if s.eat_keyword("cube") {
        s.expect_symbol("(")?;
        let exprs = parse_expr_list(s)?;
        s.expect_symbol(")")?;
        GroupingKind::Cube(exprs)
    } else if s.peek().is_keyword("grouping") && s.peek_ahead(1).is_keyword("sets") {
        s.next();
        s.next();
        s.expect_symbol("(")?;
        let mut sets = vec![parse_grouping_set(s)?];
        while s.eat_symbol(",") {
            sets.push(parse_grouping_set(s)?);
        }
        s.expect_symbol(")")?;
        GroupingKind::Sets(sets)
    } else {
        GroupingKind::Plain(parse_expr_list(s)?)
    };

    Ok(GroupByClause { grouping, comments })
}

fn parse_grouping_set(s: &mut TokenStream) -> Result<Vec<Expr>, Error> {
    if s.eat_symbol("(") {
        if s.eat_symbol(")") {
            return Ok(Vec::new());
        }
        let exprs = parse_expr_list(s)?;
        s.expect_symbol(")")?;
        Ok(exprs)
    } else {
        Ok(vec![parse_expr(s)?])
    }
}

fn parse_expr_list(s: &mut TokenStream) -> Result<Vec<Expr>, Error> {
    let mut exprs = vec![parse_expr(s)?];
    while s.eat_symbol(",") {
        exprs.push(parse_expr(s)?);
    }
    Ok(exprs)
}

pub fn parse_order_by_clause(s: &mut TokenStream) -> Result<OrderByClause, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("order")?;
    s.expect_keyword("by")?;
    let mut items = vec![parse_order_item(s)?];
    while s.eat_symbol(",") {
        items.push(parse_order_item(s)?);
    }
    Ok(OrderByClause { items, comments })
}

fn parse_order_item(s: &mut TokenStream) -> Result<OrderItem, Error> {
    let expr = parse_expr(s)?;
    let direction = if s.eat_keyword("asc") {
        SortDirection::Asc
    } else if s.eat_keyword("desc") {
        SortDirection::Desc
    } else {
        SortDirection::Default
    };
    let nulls = if s.eat_keyword("nulls") {
        if s.eat_keyword("first") {
            NullsOrder::First
        } else {
            s.expect_keyword("last")?;
            NullsOrder::Last
        }
    } else {
        NullsOrder::Default
    };
    let comments = s.take_trailing_of_last();
    Ok(OrderItem {
        expr,
        direction,
        nulls,
        comments,
    })
}

fn parse_fetch_clause(s: &mut TokenStream) -> Result<FetchClause, Error> {
    let comments = s.take_leading(s.index());
    s.expect_keyword("fetch")?;
    let first = if s.eat_keyword("first") {
        true
    } else {
        s.expect_keyword("next")?;
        false
    };
    let count = parse_expr(s)?;
    if !s.eat_keyword("rows") {
        let t = s.next();
        if t.canonical != "row" {
            return Err(s.expected("`ROWS`"));
        }
    }
    s.eat_keyword("only");
    Ok(FetchClause {
        first,
        count,
        comments,
    })
}
