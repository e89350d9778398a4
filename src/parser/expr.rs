//! Value expressions: precedence climbing over the token cursor.

use crate::ast::*;
use crate::error::{Error, Result};
use crate::keywords;
use crate::lexer::TokenKind;

use super::query::{parse_order_by_clause, parse_query, query_follows};
use super::stream::TokenStream;

pub const PREC_OR: u8 = 1;
pub const PREC_AND: u8 = 2;
pub const PREC_NOT: u8 = 3;
pub const PREC_CMP: u8 = 4;
pub const PREC_ADD: u8 = 5;
pub const PREC_MUL: u8 = 6;
pub const PREC_EXP: u8 = 7;
pub const PREC_UNARY: u8 = 8;

pub fn parse_expr(s: &mut TokenStream) -> Result<Expr, Error> {
    parse_expr_bp(s, 0)
}

pub fn parse_expr_bp(s: &mut TokenStream, min_bp: u8) -> Result<Expr, Error> {
    let mut lhs = parse_prefix(s)?;

    loop {
        // `::` binds tighter than any infix operator
        if s.peek().is_operator("::") {
            s.next();
            let ty = parse_type_name(s)?;
            lhs = Expr::new(ExprKind::Cast {
                expr: Box::new(lhs),
                ty,
                operator_form: true,
            });
            continue;
        }

        let token = s.peek().clone();
        let (op, bp) = match &token.kind {
            TokenKind::Keyword => match token.canonical.as_str() {
                "or" => (Some(BinaryOp::Or), PREC_OR),
                "and" => (Some(BinaryOp::And), PREC_AND),
                "is" | "in" | "like" | "ilike" | "between" => (None, PREC_CMP),
                "not" => {
                    let ahead = s.peek_ahead(1);
                    if ahead.is_keyword("in")
                        || ahead.is_keyword("like")
                        || ahead.is_keyword("ilike")
                        || ahead.is_keyword("between")
                    {
                        (None, PREC_CMP)
                    } else {
                        break;
                    }
                }
                _ => break,
            },
            TokenKind::Operator => match token.text.as_str() {
                "=" => (Some(BinaryOp::Eq), PREC_CMP),
                "<>" | "!=" => (Some(BinaryOp::NotEq), PREC_CMP),
                "<" => (Some(BinaryOp::Lt), PREC_CMP),
                "<=" => (Some(BinaryOp::LtEq), PREC_CMP),
                ">" => (Some(BinaryOp::Gt), PREC_CMP),
                ">=" => (Some(BinaryOp::GtEq), PREC_CMP),
                "+" => (Some(BinaryOp::Add), PREC_ADD),
                "-" => (Some(BinaryOp::Sub), PREC_ADD),
                "||" => (Some(BinaryOp::Concat), PREC_ADD),
                "*" => (Some(BinaryOp::Mul), PREC_MUL),
                "/" => (Some(BinaryOp::Div), PREC_MUL),
                "%" => (Some(BinaryOp::Mod), PREC_MUL),
                "^" => (Some(BinaryOp::Exp), PREC_EXP),
                "->" => (Some(BinaryOp::JsonArrow), PREC_MUL),
                "->>" => (Some(BinaryOp::JsonArrowText), PREC_MUL),
                _ => break,
            },
            _ => break,
        };

        if bp < min_bp {
            break;
        }

        if let Some(op) = op {
            s.next();
            let rhs = parse_expr_bp(s, bp + 1)?;
            lhs = Expr::binary(lhs, op, rhs);
            continue;
        }

        // keyword-shaped comparisons
        let negated = s.eat_keyword("not");
        if s.eat_keyword("is") {
            let is_not = s.eat_keyword("not");
            let rhs = parse_expr_bp(s, PREC_CMP + 1)?;
            let op = if is_not { BinaryOp::IsNot } else { BinaryOp::Is };
            lhs = Expr::binary(lhs, op, rhs);
        } else if s.eat_keyword("in") {
            lhs = parse_in_rhs(s, lhs, negated)?;
        } else if s.eat_keyword("between") {
            let low = parse_expr_bp(s, PREC_ADD)?;
            s.expect_keyword("and")?;
            let high = parse_expr_bp(s, PREC_ADD)?;
            lhs = Expr::new(ExprKind::Between {
                expr: Box::new(lhs),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        } else if s.peek().is_keyword("like") || s.peek().is_keyword("ilike") {
            let case_insensitive = s.peek().is_keyword("ilike");
            s.next();
            let pattern = parse_expr_bp(s, PREC_ADD)?;
            let escape = if s.eat_keyword("escape") {
                Some(Box::new(parse_expr_bp(s, PREC_ADD)?))
            } else {
                None
            };
            lhs = Expr::new(ExprKind::Like {
                expr: Box::new(lhs),
                pattern: Box::new(pattern),
                escape,
                negated,
                case_insensitive,
            });
        } else {
            return Err(s.expected("IS, IN, LIKE or BETWEEN"));
        }
    }

    Ok(lhs)
}

fn parse_in_rhs(s: &mut TokenStream, lhs: Expr, negated: bool) -> Result<Expr, Error> {
    s.expect_symbol("(")?;
    if query_follows(s) {
        let query = parse_query(s)?;
        s.expect_symbol(")")?;
        return Ok(Expr::new(ExprKind::InSubquery {
            expr: Box::new(lhs),
            query: Box::new(query),
            negated,
        }));
    }
    let mut list = vec![parse_expr(s)?];
    while s.eat_symbol(",") {
        list.push(parse_expr(s)?);
    }
    s.expect_symbol(")")?;
    Ok(Expr::new(ExprKind::InList {
        expr: Box::new(lhs),
        list,
        negated,
    }))
}

fn parse_prefix(s: &mut TokenStream) -> Result<Expr, Error> {
    let start_index = s.index();
    let before = s.take_leading(start_index);
    let mut expr = parse_prefix_inner(s)?;
    let end_index = s.index().saturating_sub(1);
    expr.comments.splice(0..0, before);
    let after = s.take_trailing(end_index);
    expr.comments.extend(after);
    expr.span = Some(s.span_at(start_index) + s.span_at(end_index));
    Ok(expr)
}

fn parse_prefix_inner(s: &mut TokenStream) -> Result<Expr, Error> {
    let token = s.peek().clone();

    match token.kind {
        TokenKind::Number => {
            s.next();
            Ok(Expr::literal(Literal::number(token.text)))
        }
        TokenKind::String => {
            s.next();
            Ok(Expr::literal(Literal {
                text: token.text,
                kind: LiteralKind::String,
            }))
        }
        TokenKind::TypedString => {
            s.next();
            let quote_at = token.text.find('\'').unwrap_or(0);
            Ok(Expr::new(ExprKind::TypedString {
                prefix: token.text[..quote_at].to_string(),
                value: token.text[quote_at..].to_string(),
            }))
        }
        TokenKind::NamedParam | TokenKind::IndexedParam => {
            s.next();
            Ok(Expr::parameter(Parameter::new(token.canonical)))
        }
        TokenKind::Operator if token.text == "-" || token.text == "+" => {
            s.next();
            let op = if token.text == "-" {
                UnaryOp::Minus
            } else {
                UnaryOp::Plus
            };
            let operand = parse_expr_bp(s, PREC_UNARY)?;
            Ok(Expr::new(ExprKind::Unary {
                op,
                expr: Box::new(operand),
            }))
        }
        TokenKind::Operator if token.text == "*" => {
            s.next();
            Ok(Expr::new(ExprKind::Wildcard {
                namespaces: Vec::new(),
            }))
        }
        TokenKind::Symbol if token.text == "(" => {
            s.next();
            if query_follows(s) {
                let query = parse_query(s)?;
                s.expect_symbol(")")?;
                return Ok(Expr::new(ExprKind::Subquery(Box::new(query))));
            }
            let first = parse_expr(s)?;
            if s.eat_symbol(",") {
                let mut values = vec![first];
                loop {
                    values.push(parse_expr(s)?);
                    if !s.eat_symbol(",") {
                        break;
                    }
                }
                s.expect_symbol(")")?;
                return Ok(Expr::new(ExprKind::Tuple(values)));
            }
            // comments alone before the closing paren belong to the group;
            // they ride on the grouped expression so the formatter can
            // emit them ahead of the closing paren
            let inner_comments = s.take_leading_as(s.index(), CommentPosition::Inner);
            s.expect_symbol(")")?;
            let mut grouped = first;
            grouped.comments.extend(inner_comments);
            Ok(Expr::paren(grouped))
        }
        TokenKind::Keyword => match token.canonical.as_str() {
            "not" => {
                s.next();
                let operand = parse_expr_bp(s, PREC_NOT + 1)?;
                Ok(Expr::new(ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand),
                }))
            }
            "true" | "false" => {
                s.next();
                Ok(Expr::literal(Literal {
                    text: token.text,
                    kind: LiteralKind::Boolean,
                }))
            }
            "null" => {
                s.next();
                Ok(Expr::literal(Literal {
                    text: token.text,
                    kind: LiteralKind::Null,
                }))
            }
            "case" => parse_case(s),
            "cast" => {
                s.next();
                s.expect_symbol("(")?;
                let inner = parse_expr(s)?;
                s.expect_keyword("as")?;
                let ty = parse_type_name(s)?;
                s.expect_symbol(")")?;
                Ok(Expr::new(ExprKind::Cast {
                    expr: Box::new(inner),
                    ty,
                    operator_form: false,
                }))
            }
            "exists" => {
                s.next();
                s.expect_symbol("(")?;
                let query = parse_query(s)?;
                s.expect_symbol(")")?;
                Ok(Expr::new(ExprKind::Exists {
                    query: Box::new(query),
                    negated: false,
                }))
            }
            "array" => {
                s.next();
                s.expect_symbol("[")?;
                let mut values = Vec::new();
                if !s.peek().is_symbol("]") {
                    values.push(parse_expr(s)?);
                    while s.eat_symbol(",") {
                        values.push(parse_expr(s)?);
                    }
                }
                s.expect_symbol("]")?;
                Ok(Expr::new(ExprKind::Array(values)))
            }
            _ if !keywords::is_reserved(&token.canonical) => parse_name_expr(s),
            _ => Err(s.unexpected()),
        },
        TokenKind::Ident | TokenKind::QuotedIdent(_) => parse_name_expr(s),
        _ => Err(s.unexpected()),
    }
}

fn parse_case(s: &mut TokenStream) -> Result<Expr, Error> {
    s.expect_keyword("case")?;
    let operand = if s.peek().is_keyword("when") {
        None
    } else {
        Some(parse_expr(s)?)
    };
    let mut branches = Vec::new();
    while s.eat_keyword("when") {
        let condition = parse_expr(s)?;
        s.expect_keyword("then")?;
        let result = parse_expr(s)?;
        branches.push(CaseBranch { condition, result });
    }
    if branches.is_empty() {
        return Err(s.expected("`WHEN`"));
    }
    let else_expr = if s.eat_keyword("else") {
        Some(parse_expr(s)?)
    } else {
        None
    };
    s.expect_keyword("end")?;
    Ok(Expr::new(ExprKind::Case(Box::new(CaseExpr {
        operand,
        branches,
        else_expr,
    }))))
}

/// Identifier-led expression: qualified column, qualified wildcard, or a
/// function call.
fn parse_name_expr(s: &mut TokenStream) -> Result<Expr, Error> {
    let mut parts = vec![parse_ident(s)?];
    loop {
        if s.peek().is_symbol(".") {
            if s.peek_ahead(1).is_operator("*") {
                s.next();
                s.next();
                return Ok(Expr::new(ExprKind::Wildcard { namespaces: parts }));
            }
            s.next();
            parts.push(parse_ident(s)?);
        } else {
            break;
        }
    }
    if s.peek().is_symbol("(") {
        let call = parse_function_call(s, parts)?;
        return Ok(Expr::function(call));
    }
    let name = parts.pop().expect("at least one identifier part");
    Ok(Expr::new(ExprKind::ColumnRef(ColumnRef {
        namespaces: parts,
        name,
    })))
}

/// The argument list and trailers of a function call; `name` is already
/// consumed and the cursor sits on `(`.
pub fn parse_function_call(s: &mut TokenStream, name: Vec<Ident>) -> Result<FunctionCall, Error> {
    s.expect_symbol("(")?;
    let distinct = s.eat_keyword("distinct");
    let mut args = Vec::new();
    let mut order_by = None;
    if !s.peek().is_symbol(")") {
        args.push(parse_expr(s)?);
        while s.eat_symbol(",") {
            args.push(parse_expr(s)?);
        }
        if s.peek().is_keyword("order") {
            order_by = Some(parse_order_by_clause(s)?);
        }
    }
    s.expect_symbol(")")?;

    let filter = if s.peek().is_keyword("filter") && s.peek_ahead(1).is_symbol("(") {
        s.next();
        s.expect_symbol("(")?;
        s.expect_keyword("where")?;
        let predicate = parse_expr(s)?;
        s.expect_symbol(")")?;
        Some(Box::new(predicate))
    } else {
        None
    };

    let within_group = if s.eat_keywords(&["within", "group"]) {
        s.expect_symbol("(")?;
        let order = parse_order_by_clause(s)?;
        s.expect_symbol(")")?;
        Some(order)
    } else {
        None
    };

    let over = if s.peek().is_keyword("over") && s.peek_ahead(1).is_symbol("(") {
        s.next();
        Some(parse_window_spec(s)?)
    } else {
        None
    };

    Ok(FunctionCall {
        name,
        distinct,
        args,
        order_by,
        filter,
        over,
        within_group,
    })
}

fn parse_window_spec(s: &mut TokenStream) -> Result<WindowSpec, Error> {
    s.expect_symbol("(")?;
    let mut spec = WindowSpec::default();
    if s.eat_keywords(&["partition", "by"]) {
        spec.partition_by.push(parse_expr(s)?);
        while s.eat_symbol(",") {
            spec.partition_by.push(parse_expr(s)?);
        }
    }
    if s.peek().is_keyword("order") {
        spec.order_by = Some(parse_order_by_clause(s)?);
    }
    if s.peek().is_keyword("rows")
        || s.peek().is_keyword("range")
        || s.peek().is_keyword("groups")
    {
        spec.frame = Some(parse_window_frame(s)?);
    }
    s.expect_symbol(")")?;
    Ok(spec)
}

fn parse_window_frame(s: &mut TokenStream) -> Result<WindowFrame, Error> {
    let units = if s.eat_keyword("rows") {
        FrameUnits::Rows
    } else if s.eat_keyword("range") {
        FrameUnits::Range
    } else {
        s.expect_keyword("groups")?;
        FrameUnits::Groups
    };
    if s.eat_keyword("between") {
        let start = parse_frame_bound(s)?;
        s.expect_keyword("and")?;
        let end = parse_frame_bound(s)?;
        Ok(WindowFrame {
            units,
            start,
            end: Some(end),
        })
    } else {
        let start = parse_frame_bound(s)?;
        Ok(WindowFrame {
            units,
            start,
            end: None,
        })
    }
}

fn parse_frame_bound(s: &mut TokenStream) -> Result<FrameBound, Error> {
    if s.eat_keyword("unbounded") {
        return if s.eat_keyword("preceding") {
            Ok(FrameBound::UnboundedPreceding)
        } else {
            s.expect_keyword("following")?;
            Ok(FrameBound::UnboundedFollowing)
        };
    }
    if s.eat_keyword("current") {
        let row = s.next();
        if row.canonical != "row" {
            return Err(s.expected("`ROW`"));
        }
        return Ok(FrameBound::CurrentRow);
    }
    let offset = parse_expr_bp(s, PREC_ADD)?;
    if s.eat_keyword("preceding") {
        Ok(FrameBound::Preceding(Box::new(offset)))
    } else {
        s.expect_keyword("following")?;
        Ok(FrameBound::Following(Box::new(offset)))
    }
}

/// One identifier: plain, quoted, or a non-reserved keyword used as a name
/// (`SELECT user FROM t` keeps working).
pub fn parse_ident(s: &mut TokenStream) -> Result<Ident, Error> {
    let token = s.peek().clone();
    match token.kind {
        TokenKind::Ident => {
            s.next();
            Ok(Ident {
                value: token.text,
                quote: None,
                span: Some(token.span),
            })
        }
        TokenKind::QuotedIdent(q) => {
            s.next();
            Ok(Ident {
                value: token.canonical,
                quote: Some(q),
                span: Some(token.span),
            })
        }
        TokenKind::Keyword if !keywords::is_reserved(&token.canonical) => {
            s.next();
            Ok(Ident {
                value: token.text,
                quote: None,
                span: Some(token.span),
            })
        }
        _ => Err(s.expected("an identifier")),
    }
}

/// A type name, kept as raw text: `int`, `numeric(10, 2)`,
/// `timestamp with time zone`, `text[]`.
pub fn parse_type_name(s: &mut TokenStream) -> Result<TypeName, Error> {
    let first = s.peek().clone();
    if !matches!(
        first.kind,
        TokenKind::Ident | TokenKind::QuotedIdent(_) | TokenKind::Keyword
    ) {
        return Err(s.expected("a type name"));
    }
    s.next();
    let mut text = first.text;

    loop {
        let next = s.peek();
        let word = next.canonical.clone();
        match word.as_str() {
            "precision" | "varying" => {
                s.next();
                text.push(' ');
                text.push_str(&word);
            }
            "with" | "without" if s.peek_ahead(1).canonical == "time" => {
                s.next();
                let time = s.next();
                let zone = s.next();
                text.push(' ');
                text.push_str(&word);
                text.push(' ');
                text.push_str(&time.text);
                text.push(' ');
                text.push_str(&zone.text);
            }
            _ => break,
        }
    }

    if s.eat_symbol("(") {
        text.push('(');
        let mut first_arg = true;
        loop {
            if s.eat_symbol(")") {
                break;
            }
            if s.eat_symbol(",") {
                text.push_str(", ");
                first_arg = true;
                continue;
            }
            if !first_arg {
                text.push(' ');
            }
            text.push_str(&s.next().text);
            first_arg = false;
        }
        text.push(')');
    }

    while s.peek().is_symbol("[") {
        s.next();
        s.expect_symbol("]")?;
        text.push_str("[]");
    }

    Ok(TypeName { text })
}
