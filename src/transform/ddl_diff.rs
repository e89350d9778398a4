//! Schema diffing over parsed DDL statement sets.
//!
//! Compares a current and an expected set of CREATE TABLE / CREATE INDEX
//! statements and emits the ALTER/CREATE/DROP statements that migrate the
//! former into the latter. Emitted statements use upper-case keywords and
//! double-quoted identifiers; type names pass through as written.

use itertools::Itertools;

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;
use crate::format::{self, FormatOptions, KeywordCase};
use crate::parser;

use super::collect::names_match;

#[derive(Debug, Clone, Copy, Default)]
pub struct DdlDiffOptions {
    /// Compare indexes and unique constraints by name as well as shape.
    /// Primary keys are never name-sensitive.
    pub check_constraint_names: bool,
    pub drop_columns: bool,
    pub drop_constraints: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DdlDiffGenerator {
    pub options: DdlDiffOptions,
}

impl DdlDiffGenerator {
    pub fn new(options: DdlDiffOptions) -> Self {
        DdlDiffGenerator { options }
    }

    /// Parse two DDL scripts and diff them.
    pub fn diff_sql(&self, current: &str, expected: &str) -> Result<Vec<String>> {
        let current = parser::parse_ddl(current)?;
        let expected = parser::parse_ddl(expected)?;
        self.diff(&current, &expected)
    }

    /// Statements that turn `current` into `expected`.
    pub fn diff(&self, current: &[Statement], expected: &[Statement]) -> Result<Vec<String>> {
        let current_tables = tables_of(current)?;
        let expected_tables = tables_of(expected)?;
        let current_indexes = indexes_of(current);
        let expected_indexes = indexes_of(expected);

        let mut out = Vec::new();

        for table in &expected_tables {
            match current_tables
                .iter()
                .find(|t| names_match(&t.name.name.value, &table.name.name.value))
            {
                None => out.push(self.render_create_table(table)),
                Some(existing) => self.diff_table(existing, table, &mut out),
            }
        }

        // indexes, matched by shape (and name when requested)
        for index in &expected_indexes {
            if !current_indexes.iter().any(|i| self.index_matches(i, index)) {
                out.push(self.render_create_index(index));
            }
        }
        if self.options.drop_constraints {
            for index in &current_indexes {
                if !expected_indexes.iter().any(|i| self.index_matches(i, index)) {
                    out.push(format!("DROP INDEX {}", quote(&index.name.value)));
                }
            }
        }

        Ok(out)
    }

    fn diff_table(
        &self,
        current: &CreateTableQuery,
        expected: &CreateTableQuery,
        out: &mut Vec<String>,
    ) {
        let table_name = quote(&expected.name.name.value);

        for column in expected.columns() {
            if current.column(&column.name.value).is_none() {
                out.push(format!(
                    "ALTER TABLE {table_name} ADD COLUMN {}",
                    self.render_column(column)
                ));
            }
        }
        if self.options.drop_columns {
            for column in current.columns() {
                if expected.column(&column.name.value).is_none() {
                    out.push(format!(
                        "ALTER TABLE {table_name} DROP COLUMN {}",
                        quote(&column.name.value)
                    ));
                }
            }
        }

        let current_constraints = normalized_constraints(current);
        let expected_constraints = normalized_constraints(expected);
        for constraint in &expected_constraints {
            if !current_constraints
                .iter()
                .any(|c| self.constraint_matches(c, constraint))
            {
                out.push(format!(
                    "ALTER TABLE {table_name} ADD {}",
                    self.render_constraint(constraint)
                ));
            }
        }
        if self.options.drop_constraints {
            for constraint in &current_constraints {
                if !expected_constraints
                    .iter()
                    .any(|c| self.constraint_matches(c, constraint))
                {
                    if let Some(name) = &constraint.name {
                        out.push(format!(
                            "ALTER TABLE {table_name} DROP CONSTRAINT {}",
                            quote(name)
                        ));
                    }
                }
            }
        }
    }

    fn constraint_matches(&self, a: &NormalizedConstraint, b: &NormalizedConstraint) -> bool {
        if a.shape != b.shape {
            return false;
        }
        // name sensitivity applies to unique constraints, never primary keys
        if self.options.check_constraint_names && a.shape.starts_with("unique") {
            return match (&a.name, &b.name) {
                (Some(x), Some(y)) => names_match(x, y),
                (None, None) => true,
                _ => false,
            };
        }
        true
    }

    fn index_matches(&self, a: &CreateIndexQuery, b: &CreateIndexQuery) -> bool {
        let shape = names_match(&a.table.name.value, &b.table.name.value)
            && a.unique == b.unique
            && a.columns.len() == b.columns.len()
            && a.columns
                .iter()
                .zip(&b.columns)
                .all(|(x, y)| names_match(&x.value, &y.value));
        if !shape {
            return false;
        }
        if self.options.check_constraint_names {
            return names_match(&a.name.value, &b.name.value);
        }
        true
    }

    fn render_create_table(&self, table: &CreateTableQuery) -> String {
        let options = FormatOptions {
            keyword_case: KeywordCase::Upper,
            ..Default::default()
        };
        format::format_statement(&Statement::CreateTable(table.clone()), &options).formatted_sql
    }

    fn render_create_index(&self, index: &CreateIndexQuery) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            quote(&index.name.value),
            quote(&index.table.name.value),
            index.columns.iter().map(|c| quote(&c.value)).join(", ")
        )
    }

    fn render_column(&self, column: &ColumnDef) -> String {
        let mut parts = vec![quote(&column.name.value), column.data_type.text.clone()];
        for constraint in &column.constraints {
            match constraint {
                ColumnConstraint::NotNull => parts.push("NOT NULL".into()),
                ColumnConstraint::Null => parts.push("NULL".into()),
                ColumnConstraint::Default(expr) => {
                    parts.push(format!("DEFAULT {}", render_expr(expr)))
                }
                ColumnConstraint::PrimaryKey => parts.push("PRIMARY KEY".into()),
                ColumnConstraint::Unique => parts.push("UNIQUE".into()),
                ColumnConstraint::Check(expr) => {
                    parts.push(format!("CHECK ({})", render_expr(expr)))
                }
                ColumnConstraint::References { table, columns } => {
                    let mut text = format!("REFERENCES {}", quote(&table.name.value));
                    if !columns.is_empty() {
                        text.push_str(&format!(
                            " ({})",
                            columns.iter().map(|c| quote(&c.value)).join(", ")
                        ));
                    }
                    parts.push(text);
                }
            }
        }
        parts.join(" ")
    }

    fn render_constraint(&self, constraint: &NormalizedConstraint) -> String {
        let mut out = String::new();
        if let Some(name) = &constraint.name {
            out.push_str(&format!("CONSTRAINT {} ", quote(name)));
        }
        out.push_str(&constraint.rendered);
        out
    }
}

fn tables_of(statements: &[Statement]) -> Result<Vec<CreateTableQuery>> {
    statements
        .iter()
        .map(|s| match s {
            Statement::CreateTable(t) => Ok(Some(t.clone())),
            Statement::CreateIndex(_) => Ok(None),
            _ => Err(Error::transform("DDL diff input must contain only CREATE statements").into()),
        })
        .filter_map(Result::transpose)
        .collect()
}

fn indexes_of(statements: &[Statement]) -> Vec<CreateIndexQuery> {
    statements
        .iter()
        .filter_map(|s| match s {
            Statement::CreateIndex(i) => Some(i.clone()),
            _ => None,
        })
        .collect()
}

/// A table constraint in comparable form: column-level PRIMARY KEY /
/// UNIQUE constraints are lifted to table level first.
struct NormalizedConstraint {
    name: Option<String>,
    /// Lowercased comparable shape, e.g. `unique(email,org_id)`.
    shape: String,
    /// Renderable SQL without the CONSTRAINT prefix.
    rendered: String,
}

fn normalized_constraints(table: &CreateTableQuery) -> Vec<NormalizedConstraint> {
    let mut out = Vec::new();
    for column in table.columns() {
        for constraint in &column.constraints {
            match constraint {
                ColumnConstraint::PrimaryKey => out.push(NormalizedConstraint {
                    name: None,
                    shape: format!("pk({})", column.name.value.to_ascii_lowercase()),
                    rendered: format!("PRIMARY KEY ({})", quote(&column.name.value)),
                }),
                ColumnConstraint::Unique => out.push(NormalizedConstraint {
                    name: None,
                    shape: format!("unique({})", column.name.value.to_ascii_lowercase()),
                    rendered: format!("UNIQUE ({})", quote(&column.name.value)),
                }),
                _ => {}
            }
        }
    }
    for constraint in table.constraints() {
        let name = constraint.name.as_ref().map(|n| n.value.clone());
        let (shape, rendered) = match &constraint.kind {
            TableConstraintKind::PrimaryKey(columns) => (
                format!("pk({})", joined_lower(columns)),
                format!("PRIMARY KEY ({})", joined_quoted(columns)),
            ),
            TableConstraintKind::Unique(columns) => (
                format!("unique({})", joined_lower(columns)),
                format!("UNIQUE ({})", joined_quoted(columns)),
            ),
            TableConstraintKind::Check(expr) => {
                let rendered = render_expr(expr);
                (
                    format!("check({})", rendered.to_ascii_lowercase()),
                    format!("CHECK ({rendered})"),
                )
            }
            TableConstraintKind::ForeignKey {
                columns,
                ref_table,
                ref_columns,
            } => {
                let mut rendered = format!(
                    "FOREIGN KEY ({}) REFERENCES {}",
                    joined_quoted(columns),
                    quote(&ref_table.name.value)
                );
                if !ref_columns.is_empty() {
                    rendered.push_str(&format!(" ({})", joined_quoted(ref_columns)));
                }
                (
                    format!(
                        "fk({})->{}({})",
                        joined_lower(columns),
                        ref_table.name.value.to_ascii_lowercase(),
                        joined_lower(ref_columns)
                    ),
                    rendered,
                )
            }
        };
        out.push(NormalizedConstraint {
            name,
            shape,
            rendered,
        });
    }
    out
}

fn joined_lower(columns: &[Ident]) -> String {
    columns
        .iter()
        .map(|c| c.value.to_ascii_lowercase())
        .join(",")
}

fn joined_quoted(columns: &[Ident]) -> String {
    columns.iter().map(|c| quote(&c.value)).join(", ")
}

fn render_expr(expr: &Expr) -> String {
    let options = FormatOptions {
        keyword_case: KeywordCase::Upper,
        ..Default::default()
    };
    format::format_expr_standalone(expr, &options)
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
