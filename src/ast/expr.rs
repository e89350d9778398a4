use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::comment::Comments;
use super::query::{OrderByClause, Query};
use crate::error::Span;
use crate::lexer::IdentQuote;

/// An identifier as written: value, quoting style, and (when it came from
/// the parser) the span of the original lexeme. Transformer-built idents
/// have no span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub value: String,
    pub quote: Option<IdentQuote>,
    pub span: Option<Span>,
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Ident {
            value: value.into(),
            quote: None,
            span: None,
        }
    }

    pub fn quoted(value: impl Into<String>, quote: IdentQuote) -> Self {
        Ident {
            value: value.into(),
            quote: Some(quote),
            span: None,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A possibly-qualified column reference: `price`, `s.price`,
/// `catalog.s.price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub namespaces: Vec<Ident>,
    pub name: Ident,
}

impl ColumnRef {
    pub fn single(name: impl Into<String>) -> Self {
        ColumnRef {
            namespaces: Vec::new(),
            name: Ident::new(name),
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ColumnRef {
            namespaces: vec![Ident::new(namespace)],
            name: Ident::new(name),
        }
    }

    /// Dotted text form, without quoting.
    pub fn path(&self) -> String {
        let mut parts: Vec<&str> = self.namespaces.iter().map(|n| n.value.as_str()).collect();
        parts.push(&self.name.value);
        parts.join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    String,
    Number,
    Boolean,
    Null,
}

/// A literal with its raw source text preserved. Numeric fidelity matters:
/// `9007199254740993` must survive exactly, so the text is never parsed
/// into a float on the way through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub text: String,
    pub kind: LiteralKind,
}

impl Literal {
    pub fn string(inner: &str) -> Self {
        Literal {
            text: format!("'{}'", inner.replace('\'', "''")),
            kind: LiteralKind::String,
        }
    }

    pub fn number(text: impl Into<String>) -> Self {
        Literal {
            text: text.into(),
            kind: LiteralKind::Number,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Literal {
            text: if value { "true" } else { "false" }.into(),
            kind: LiteralKind::Boolean,
        }
    }

    pub fn null() -> Self {
        Literal {
            text: "null".into(),
            kind: LiteralKind::Null,
        }
    }
}

/// A scalar bound to a parameter slot. Tagged, never an untyped dynamic;
/// `BigInt` keeps digits as text so nothing widens to a float. The tag
/// survives serialization (`{"big_int": "…"}`), so the string-backed
/// variants round-trip through JSON without collapsing into one another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Exact decimal digits beyond i64 range; never widened to a float.
    BigInt(String),
    Bytes(Vec<u8>),
    DateTime(String),
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// A named parameter slot, optionally carrying its bound value. Two
/// parameters with the same name refer to the same runtime value; the
/// formatter emits one map entry per unique name, last binding wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Option<ParamValue>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            value: None,
        }
    }

    pub fn bound(name: impl Into<String>, value: ParamValue) -> Self {
        Parameter {
            name: name.into(),
            value: Some(value),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr,
)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Is,
    IsNot,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Mod,
    Exp,
    JsonArrow,
    JsonArrowText,
}

impl BinaryOp {
    /// Lowercase SQL text; keyword operators get keyword casing in the
    /// formatter, symbol operators are emitted verbatim.
    pub fn as_sql(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Or => "or",
            And => "and",
            Eq => "=",
            NotEq => "<>",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
            Is => "is",
            IsNot => "is not",
            Add => "+",
            Sub => "-",
            Concat => "||",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Exp => "^",
            JsonArrow => "->",
            JsonArrowText => "->>",
        }
    }

    pub fn is_keyword_op(&self) -> bool {
        matches!(
            self,
            BinaryOp::Or | BinaryOp::And | BinaryOp::Is | BinaryOp::IsNot
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

impl UnaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
        }
    }
}

/// A type name kept as raw text (`numeric(10, 2)`, `timestamp with time
/// zone`). Types pass through the formatter verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeName {
    pub text: String,
}

impl TypeName {
    pub fn new(text: impl Into<String>) -> Self {
        TypeName { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: Vec<Ident>,
    pub distinct: bool,
    pub args: Vec<Expr>,
    /// ORDER BY inside the argument list: `string_agg(x order by y)`.
    pub order_by: Option<OrderByClause>,
    pub filter: Option<Box<Expr>>,
    pub over: Option<WindowSpec>,
    pub within_group: Option<OrderByClause>,
}

impl FunctionCall {
    pub fn simple(name: impl Into<String>, args: Vec<Expr>) -> Self {
        FunctionCall {
            name: vec![Ident::new(name)],
            distinct: false,
            args,
            order_by: None,
            filter: None,
            over: None,
            within_group: None,
        }
    }

    pub fn name_path(&self) -> String {
        self.name
            .iter()
            .map(|i| i.value.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Option<OrderByClause>,
    pub frame: Option<WindowFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameUnits {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameBound {
    UnboundedPreceding,
    UnboundedFollowing,
    CurrentRow,
    Preceding(Box<Expr>),
    Following(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: Option<FrameBound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpr {
    /// `CASE x WHEN …` operand; absent for the searched form.
    pub operand: Option<Expr>,
    pub branches: Vec<CaseBranch>,
    pub else_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum ExprKind {
    Literal(Literal),
    ColumnRef(ColumnRef),
    /// `*` or `alias.*`.
    Wildcard { namespaces: Vec<Ident> },
    Parameter(Parameter),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Function(Box<FunctionCall>),
    Case(Box<CaseExpr>),
    Cast {
        expr: Box<Expr>,
        ty: TypeName,
        /// `x::t` rather than `cast(x as t)`.
        operator_form: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        query: Box<Query>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Exists {
        query: Box<Query>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negated: bool,
        case_insensitive: bool,
    },
    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    /// `E'…'` and friends; `value` is the raw quoted literal.
    TypedString {
        prefix: String,
        value: String,
    },
    /// Scalar subquery.
    Subquery(Box<Query>),
    /// Explicit grouping parentheses from the source.
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: None,
            comments: Vec::new(),
        }
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::ColumnRef(ColumnRef::single(name)))
    }

    pub fn qualified_column(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::new(ExprKind::ColumnRef(ColumnRef::qualified(namespace, name)))
    }

    pub fn literal(literal: Literal) -> Self {
        Expr::new(ExprKind::Literal(literal))
    }

    pub fn parameter(parameter: Parameter) -> Self {
        Expr::new(ExprKind::Parameter(parameter))
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::new(ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn paren(inner: Expr) -> Self {
        Expr::new(ExprKind::Paren(Box::new(inner)))
    }

    pub fn function(call: FunctionCall) -> Self {
        Expr::new(ExprKind::Function(Box::new(call)))
    }
}
