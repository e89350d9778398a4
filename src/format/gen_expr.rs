//! Value-expression emission.
//!
//! Parenthesization is driven by binding strength: a child weaker than its
//! context gets wrapped, so transformer-built trees print correctly even
//! though they never carry explicit [ExprKind::Paren] nodes.

use crate::ast::*;

use super::gen_query::{format_order_by, format_query};
use super::writer::SqlWriter;
use super::ListBreak;

const STRENGTH_OR: u8 = 1;
const STRENGTH_AND: u8 = 2;
const STRENGTH_NOT: u8 = 3;
const STRENGTH_CMP: u8 = 4;
const STRENGTH_ADD: u8 = 5;
const STRENGTH_MUL: u8 = 6;
const STRENGTH_EXP: u8 = 7;
const STRENGTH_UNARY: u8 = 8;
const STRENGTH_CAST: u8 = 9;
const STRENGTH_ATOM: u8 = 10;

fn op_strength(op: BinaryOp) -> u8 {
    use BinaryOp::*;
    match op {
        Or => STRENGTH_OR,
        And => STRENGTH_AND,
        Eq | NotEq | Lt | LtEq | Gt | GtEq | Is | IsNot => STRENGTH_CMP,
        Add | Sub | Concat => STRENGTH_ADD,
        Mul | Div | Mod | JsonArrow | JsonArrowText => STRENGTH_MUL,
        Exp => STRENGTH_EXP,
    }
}

fn strength(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Binary { op, .. } => op_strength(*op),
        ExprKind::Unary {
            op: UnaryOp::Not, ..
        } => STRENGTH_NOT,
        ExprKind::Unary { .. } => STRENGTH_UNARY,
        ExprKind::InList { .. }
        | ExprKind::InSubquery { .. }
        | ExprKind::Between { .. }
        | ExprKind::Like { .. } => STRENGTH_CMP,
        ExprKind::Cast {
            operator_form: true,
            ..
        } => STRENGTH_CAST,
        _ => STRENGTH_ATOM,
    }
}

pub fn format_expr(w: &mut SqlWriter, expr: &Expr) {
    format_expr_parts(w, expr, true);
}

/// `emit_after = false` lets list formatting place the trailing comments
/// after the comma instead of before it.
pub fn format_expr_parts(w: &mut SqlWriter, expr: &Expr, emit_after: bool) {
    w.comments_at(&expr.comments, CommentPosition::Before);
    format_expr_kind(w, &expr.kind);
    if emit_after {
        w.comments_at(&expr.comments, CommentPosition::After);
    }
}

/// Wrap the operand in parentheses when it binds weaker than its context.
fn format_operand(w: &mut SqlWriter, expr: &Expr, min_strength: u8) {
    if strength(expr) < min_strength {
        w.atom("(");
        format_expr(w, expr);
        w.glue(")");
    } else {
        format_expr(w, expr);
    }
}

fn format_expr_kind(w: &mut SqlWriter, kind: &ExprKind) {
    match kind {
        ExprKind::Literal(literal) => match literal.kind {
            LiteralKind::Boolean | LiteralKind::Null => w.raw_keyword(&literal.text),
            _ => w.atom(&literal.text),
        },
        ExprKind::ColumnRef(column) => format_column_ref(w, column),
        ExprKind::Wildcard { namespaces } => {
            if namespaces.is_empty() {
                w.atom("*");
            } else {
                for (i, ns) in namespaces.iter().enumerate() {
                    if i == 0 {
                        w.ident(ns);
                    } else {
                        w.glue(".");
                        w.ident_glued(ns);
                    }
                }
                w.glue(".*");
            }
        }
        ExprKind::Parameter(p) => w.parameter(p),
        ExprKind::Binary { left, op, right } => format_binary(w, left, *op, right),
        ExprKind::Unary { op, expr } => {
            match op {
                UnaryOp::Not => w.kw("not"),
                UnaryOp::Minus => w.atom("-"),
                UnaryOp::Plus => w.atom("+"),
            }
            let min = if *op == UnaryOp::Not {
                STRENGTH_NOT + 1
            } else {
                STRENGTH_UNARY
            };
            if matches!(op, UnaryOp::Minus | UnaryOp::Plus) {
                // fuse sign to the operand: `-1`, not `- 1`
                if strength(expr) < min {
                    w.glue("(");
                    format_expr(w, expr);
                    w.glue(")");
                } else {
                    let before = matches!(expr.kind, ExprKind::Unary { .. });
                    if before {
                        // keep `- -1` apart so it does not lex as a comment
                        format_operand(w, expr, min);
                    } else {
                        format_glued_operand(w, expr);
                    }
                }
            } else {
                format_operand(w, expr, min);
            }
        }
        ExprKind::Function(call) => format_function_call(w, call),
        ExprKind::Case(case) => format_case(w, case),
        ExprKind::Cast {
            expr,
            ty,
            operator_form,
        } => {
            if *operator_form {
                format_operand(w, expr, STRENGTH_CAST);
                w.glue("::");
                w.glue(&ty.text);
            } else {
                w.kw("cast");
                w.glue("(");
                format_expr(w, expr);
                w.kw("as");
                w.atom(&ty.text);
                w.glue(")");
            }
        }
        ExprKind::InList {
            expr,
            list,
            negated,
        } => {
            format_operand(w, expr, STRENGTH_CMP + 1);
            if *negated {
                w.kw("not");
            }
            w.kw("in");
            w.atom("(");
            format_expr_list(w, list);
            w.glue(")");
        }
        ExprKind::InSubquery {
            expr,
            query,
            negated,
        } => {
            format_operand(w, expr, STRENGTH_CMP + 1);
            if *negated {
                w.kw("not");
            }
            w.kw("in");
            w.atom("(");
            format_query(w, query);
            w.glue(")");
        }
        ExprKind::Between {
            expr,
            low,
            high,
            negated,
        } => {
            if w.opts.between_one_line {
                w.begin_oneline();
            }
            format_operand(w, expr, STRENGTH_CMP + 1);
            if *negated {
                w.kw("not");
            }
            w.kw("between");
            format_operand(w, low, STRENGTH_ADD);
            w.kw("and");
            format_operand(w, high, STRENGTH_ADD);
            if w.opts.between_one_line {
                w.end_oneline();
            }
        }
        ExprKind::Exists { query, negated } => {
            if *negated {
                w.kw("not");
            }
            w.kw("exists");
            w.atom("(");
            format_subquery(w, query);
            w.glue(")");
        }
        ExprKind::Like {
            expr,
            pattern,
            escape,
            negated,
            case_insensitive,
        } => {
            format_operand(w, expr, STRENGTH_CMP + 1);
            if *negated {
                w.kw("not");
            }
            w.kw(if *case_insensitive { "ilike" } else { "like" });
            format_operand(w, pattern, STRENGTH_ADD);
            if let Some(escape) = escape {
                w.kw("escape");
                format_operand(w, escape, STRENGTH_ADD);
            }
        }
        ExprKind::Tuple(values) => {
            w.atom("(");
            format_expr_list(w, values);
            w.glue(")");
        }
        ExprKind::Array(values) => {
            w.kw("array");
            w.glue("[");
            format_expr_list(w, values);
            w.glue("]");
        }
        ExprKind::TypedString { prefix, value } => {
            w.atom(&format!("{prefix}{value}"));
        }
        ExprKind::Subquery(query) => {
            w.atom("(");
            format_subquery(w, query);
            w.glue(")");
        }
        ExprKind::Paren(inner) => {
            if w.opts.parentheses_one_line {
                w.begin_oneline();
            }
            w.atom("(");
            format_expr(w, inner);
            w.comments_at(&inner.comments, CommentPosition::Inner);
            w.glue(")");
            if w.opts.parentheses_one_line {
                w.end_oneline();
            }
        }
    }
}

/// A numeric operand fused directly after a sign.
fn format_glued_operand(w: &mut SqlWriter, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(literal) => w.glue(&literal.text),
        _ => format_expr(w, expr),
    }
}

pub fn format_column_ref(w: &mut SqlWriter, column: &ColumnRef) {
    for (i, ns) in column.namespaces.iter().enumerate() {
        if i == 0 {
            w.ident(ns);
        } else {
            w.glue(".");
            w.ident_glued(ns);
        }
    }
    if column.namespaces.is_empty() {
        w.ident(&column.name);
    } else {
        w.glue(".");
        w.ident_glued(&column.name);
    }
}

fn format_binary(w: &mut SqlWriter, left: &Expr, op: BinaryOp, right: &Expr) {
    let prec = op_strength(op);
    format_operand(w, left, prec);

    let break_mode = match op {
        BinaryOp::And => w.opts.and_break,
        BinaryOp::Or => w.opts.or_break,
        _ => ListBreak::None,
    };
    match break_mode {
        ListBreak::Before if w.multiline() => {
            w.newline();
            w.kw(op.as_sql());
        }
        ListBreak::After if w.multiline() => {
            w.kw(op.as_sql());
            w.newline();
        }
        _ => {
            if op.is_keyword_op() {
                w.kw(op.as_sql());
            } else {
                w.atom(op.as_sql());
            }
        }
    }
    format_operand(w, right, prec + 1);
}

fn format_case(w: &mut SqlWriter, case: &CaseExpr) {
    if w.opts.case_one_line {
        w.begin_oneline();
    }
    let broken = w.multiline();
    w.kw("case");
    if let Some(operand) = &case.operand {
        format_expr(w, operand);
    }
    if broken {
        w.indent();
    }
    for branch in &case.branches {
        if broken {
            w.newline();
        }
        w.kw("when");
        format_expr(w, &branch.condition);
        w.kw("then");
        format_expr(w, &branch.result);
    }
    if let Some(else_expr) = &case.else_expr {
        if broken {
            w.newline();
        }
        w.kw("else");
        format_expr(w, else_expr);
    }
    if broken {
        w.dedent();
        w.newline();
    }
    w.kw("end");
    if w.opts.case_one_line {
        w.end_oneline();
    }
}

pub fn format_function_call(w: &mut SqlWriter, call: &FunctionCall) {
    w.function_name(&call.name);
    w.glue("(");
    if call.distinct {
        w.kw("distinct");
    }
    format_expr_list(w, &call.args);
    if let Some(order_by) = &call.order_by {
        format_order_by(w, order_by);
    }
    w.glue(")");

    if let Some(filter) = &call.filter {
        w.kw("filter");
        w.atom("(");
        w.kw("where");
        format_expr(w, filter);
        w.glue(")");
    }
    if let Some(within_group) = &call.within_group {
        w.kws(&["within", "group"]);
        w.atom("(");
        format_order_by(w, within_group);
        w.glue(")");
    }
    if let Some(over) = &call.over {
        w.kw("over");
        w.atom("(");
        if !over.partition_by.is_empty() {
            w.kws(&["partition", "by"]);
            format_expr_list(w, &over.partition_by);
        }
        if let Some(order_by) = &over.order_by {
            format_order_by(w, order_by);
        }
        if let Some(frame) = &over.frame {
            format_window_frame(w, frame);
        }
        w.glue(")");
    }
}

fn format_window_frame(w: &mut SqlWriter, frame: &WindowFrame) {
    match frame.units {
        FrameUnits::Rows => w.kw("rows"),
        FrameUnits::Range => w.kw("range"),
        FrameUnits::Groups => w.kw("groups"),
    }
    match &frame.end {
        Some(end) => {
            w.kw("between");
            format_frame_bound(w, &frame.start);
            w.kw("and");
            format_frame_bound(w, end);
        }
        None => format_frame_bound(w, &frame.start),
    }
}

fn format_frame_bound(w: &mut SqlWriter, bound: &FrameBound) {
    match bound {
        FrameBound::UnboundedPreceding => w.kws(&["unbounded", "preceding"]),
        FrameBound::UnboundedFollowing => w.kws(&["unbounded", "following"]),
        FrameBound::CurrentRow => w.kws(&["current", "row"]),
        FrameBound::Preceding(expr) => {
            format_expr(w, expr);
            w.kw("preceding");
        }
        FrameBound::Following(expr) => {
            format_expr(w, expr);
            w.kw("following");
        }
    }
}

pub fn format_expr_list(w: &mut SqlWriter, exprs: &[Expr]) {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            w.glue(",");
        }
        format_expr(w, expr);
    }
}

/// A query nested inside an expression or source position.
pub fn format_subquery(w: &mut SqlWriter, query: &Query) {
    if w.opts.subquery_one_line {
        w.begin_oneline();
    }
    format_query(w, query);
    if w.opts.subquery_one_line {
        w.end_oneline();
    }
}
