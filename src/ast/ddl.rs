use serde::{Deserialize, Serialize};

use super::comment::Comments;
use super::expr::{Expr, Ident, TypeName};
use super::query::{Query, TableRef};

/// `CREATE [TEMPORARY] TABLE [IF NOT EXISTS] name …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableQuery {
    pub temporary: bool,
    pub if_not_exists: bool,
    pub name: TableRef,
    pub body: CreateTableBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CreateTableBody {
    Columns {
        columns: Vec<ColumnDef>,
        constraints: Vec<TableConstraint>,
    },
    AsSelect(Query),
}

impl CreateTableQuery {
    pub fn columns(&self) -> &[ColumnDef] {
        match &self.body {
            CreateTableBody::Columns { columns, .. } => columns,
            CreateTableBody::AsSelect(_) => &[],
        }
    }

    pub fn constraints(&self) -> &[TableConstraint] {
        match &self.body {
            CreateTableBody::Columns { constraints, .. } => constraints,
            CreateTableBody::AsSelect(_) => &[],
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns().iter().find(|c| c.name.value == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: Ident,
    pub data_type: TypeName,
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}

impl ColumnDef {
    pub fn not_null(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ColumnConstraint::NotNull | ColumnConstraint::PrimaryKey))
    }

    pub fn default_expr(&self) -> Option<&Expr> {
        self.constraints.iter().find_map(|c| match c {
            ColumnConstraint::Default(e) => Some(e),
            _ => None,
        })
    }

    /// serial/bigserial/smallserial columns, and `nextval(…)` defaults.
    pub fn is_serial(&self) -> bool {
        let ty = self.data_type.text.to_ascii_lowercase();
        if matches!(ty.as_str(), "serial" | "bigserial" | "smallserial") {
            return true;
        }
        self.default_expr()
            .map(|e| match &e.kind {
                super::expr::ExprKind::Function(f) => {
                    f.name_path().eq_ignore_ascii_case("nextval")
                }
                _ => false,
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    NotNull,
    Null,
    Default(Expr),
    PrimaryKey,
    Unique,
    Check(Expr),
    References {
        table: TableRef,
        columns: Vec<Ident>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConstraint {
    pub name: Option<Ident>,
    pub kind: TableConstraintKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableConstraintKind {
    PrimaryKey(Vec<Ident>),
    Unique(Vec<Ident>),
    Check(Expr),
    ForeignKey {
        columns: Vec<Ident>,
        ref_table: TableRef,
        ref_columns: Vec<Ident>,
    },
}

/// `CREATE [UNIQUE] INDEX name ON table (cols)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexQuery {
    pub unique: bool,
    pub name: Ident,
    pub table: TableRef,
    pub columns: Vec<Ident>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Comments,
}
