use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use super::comment::Comments;
use super::ddl::{CreateIndexQuery, CreateTableQuery};
use super::expr::{Expr, FunctionCall, Ident};

/// A query shape: plain SELECT, set operation, or VALUES rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum Query {
    Select(Box<SelectQuery>),
    Binary(Box<BinaryQuery>),
    Values(Box<ValuesQuery>),
}

impl Query {
    /// The left-most SELECT of a set-operation chain, if any.
    pub fn leftmost_select(&self) -> Option<&SelectQuery> {
        match self {
            Query::Select(s) => Some(s),
            Query::Binary(b) => b.left.leftmost_select(),
            Query::Values(_) => None,
        }
    }

    pub fn leftmost_select_mut(&mut self) -> Option<&mut SelectQuery> {
        match self {
            Query::Select(s) => Some(s),
            Query::Binary(b) => b.left.leftmost_select_mut(),
            Query::Values(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOperator {
    /// Lowercase keyword words, for keyword-cased emission.
    pub fn words(&self) -> &'static [&'static str] {
        match self {
            SetOperator::Union => &["union"],
            SetOperator::UnionAll => &["union", "all"],
            SetOperator::Intersect => &["intersect"],
            SetOperator::IntersectAll => &["intersect", "all"],
            SetOperator::Except => &["except"],
            SetOperator::ExceptAll => &["except", "all"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryQuery {
    pub op: SetOperator,
    pub left: Query,
    pub right: Query,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

/// `VALUES (…), (…)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValuesQuery {
    pub tuples: Vec<Vec<Expr>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectQuery {
    pub with_clause: Option<WithClause>,
    pub select: SelectClause,
    pub from: Option<FromClause>,
    pub where_clause: Option<WhereClause>,
    pub group_by: Option<GroupByClause>,
    pub having: Option<HavingClause>,
    pub order_by: Option<OrderByClause>,
    pub limit: Option<LimitClause>,
    pub offset: Option<OffsetClause>,
    pub fetch: Option<FetchClause>,
    pub for_clause: Option<ForClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl SelectQuery {
    pub fn new(select: SelectClause) -> Self {
        SelectQuery {
            select,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distinct {
    Distinct,
    DistinctOn(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectClause {
    pub distinct: Option<Distinct>,
    pub items: Vec<SelectItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<Ident>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        SelectItem {
            expr,
            alias: None,
            comments: Vec::new(),
        }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        SelectItem {
            expr,
            alias: Some(Ident::new(alias)),
            comments: Vec::new(),
        }
    }

    /// Output column name: the alias, or the trailing name of a plain
    /// column reference.
    pub fn output_name(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(&alias.value);
        }
        match &self.expr.kind {
            super::expr::ExprKind::ColumnRef(c) => Some(&c.name.value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithClause {
    pub recursive: bool,
    pub tables: Vec<CommonTable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonTable {
    pub name: Ident,
    pub columns: Option<Vec<Ident>>,
    pub materialized: Option<bool>,
    pub query: Query,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl CommonTable {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        CommonTable {
            name: Ident::new(name),
            columns: None,
            materialized: None,
            query,
            comments: Vec::new(),
        }
    }
}

/// A real table reference: optional namespaces plus the table name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub namespaces: Vec<Ident>,
    pub name: Ident,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        TableRef {
            namespaces: Vec::new(),
            name: Ident::new(name),
        }
    }

    pub fn path(&self) -> String {
        let mut parts: Vec<&str> = self.namespaces.iter().map(|n| n.value.as_str()).collect();
        parts.push(&self.name.value);
        parts.join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum SourceKind {
    Table(TableRef),
    Subquery(Query),
    Function(FunctionCall),
    Values(ValuesQuery),
    /// A parenthesized join tree: `(a join b on …)`.
    Paren(Box<FromClause>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAlias {
    pub name: Ident,
    pub columns: Option<Vec<Ident>>,
}

impl SourceAlias {
    pub fn new(name: impl Into<String>) -> Self {
        SourceAlias {
            name: Ident::new(name),
            columns: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExpr {
    pub kind: SourceKind,
    pub alias: Option<SourceAlias>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl SourceExpr {
    pub fn table(name: impl Into<String>) -> Self {
        SourceExpr {
            kind: SourceKind::Table(TableRef::new(name)),
            alias: None,
            comments: Vec::new(),
        }
    }

    /// The name this source answers to in column qualifiers: its alias, or
    /// the bare table name.
    pub fn binding_name(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(&alias.name.value);
        }
        match &self.kind {
            SourceKind::Table(t) => Some(&t.name.value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    /// A comma in the FROM list.
    Comma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinCondition {
    On(Expr),
    Using(Vec<Ident>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub lateral: bool,
    pub source: SourceExpr,
    pub condition: Option<JoinCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromClause {
    pub source: SourceExpr,
    pub joins: Vec<JoinClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl FromClause {
    pub fn new(source: SourceExpr) -> Self {
        FromClause {
            source,
            joins: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Sources in declaration order: the head source, then each join's.
    pub fn sources(&self) -> Vec<&SourceExpr> {
        let mut out = vec![&self.source];
        out.extend(self.joins.iter().map(|j| &j.source));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub condition: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupingKind {
    Plain(Vec<Expr>),
    Rollup(Vec<Expr>),
    Cube(Vec<Expr>),
    Sets(Vec<Vec<Expr>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByClause {
    pub grouping: GroupingKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HavingClause {
    pub condition: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Default,
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NullsOrder {
    #[default]
    Default,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: SortDirection,
    pub nulls: NullsOrder,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl OrderItem {
    pub fn new(expr: Expr) -> Self {
        OrderItem {
            expr,
            direction: SortDirection::Default,
            nulls: NullsOrder::Default,
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrderByClause {
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitClause {
    pub value: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetClause {
    pub value: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchClause {
    /// `FETCH FIRST` rather than `FETCH NEXT`.
    pub first: bool,
    pub count: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    Update,
    Share,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForClause {
    pub mode: LockMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

/// `INSERT INTO t (cols) <source> [ON CONFLICT …] [RETURNING …]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertQuery {
    pub target: TableRef,
    pub columns: Vec<Ident>,
    pub source: Query,
    pub on_conflict: Option<OnConflictClause>,
    pub returning: Option<Vec<SelectItem>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OnConflictAction {
    DoNothing,
    DoUpdate {
        set_items: Vec<SetItem>,
        where_clause: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnConflictClause {
    pub target: Option<Vec<Ident>>,
    pub action: OnConflictAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    pub column: super::expr::ColumnRef,
    pub value: Expr,
}

/// `UPDATE t SET … [FROM …] [WHERE …] [RETURNING …]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    pub with_clause: Option<WithClause>,
    pub target: SourceExpr,
    pub set_items: Vec<SetItem>,
    pub from: Option<FromClause>,
    pub where_clause: Option<WhereClause>,
    pub returning: Option<Vec<SelectItem>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

/// Any parseable root, so the formatter and tests can handle them
/// uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum Statement {
    Query(Query),
    Insert(InsertQuery),
    Update(UpdateQuery),
    CreateTable(CreateTableQuery),
    CreateIndex(CreateIndexQuery),
}
