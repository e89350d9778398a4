//! AST → SQL text.
//!
//! [FormatOptions] is the flat option record; unknown fields in a
//! deserialized preset are ignored. Formatting never fails for a
//! well-formed AST: [format] returns the text plus the parameter map, one
//! entry per unique parameter name, last-seen binding wins.

mod gen_expr;
mod gen_query;
mod writer;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::ast::{ParamValue, Query, Statement};

pub(crate) use writer::SqlWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCase {
    Upper,
    #[default]
    Lower,
    /// Keeps raw-text keywords (booleans, NULL) as written; generated
    /// keywords fall back to lowercase.
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierEscape {
    #[default]
    Double,
    Backtick,
    Bracket,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParameterStyle {
    #[default]
    Named,
    Indexed,
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListBreak {
    Before,
    After,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WithClauseStyle {
    #[default]
    Standard,
    CteOneline,
    FullOneline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentStyle {
    #[default]
    Block,
    Smart,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub keyword_case: KeywordCase,
    pub identifier_escape: IdentifierEscape,
    /// Prefix for named and indexed parameters: `:`, `$` or `@`.
    pub parameter_symbol: String,
    pub parameter_style: ParameterStyle,
    pub indent_char: char,
    pub indent_size: usize,
    pub newline: String,
    pub comma_break: ListBreak,
    pub values_comma_break: ListBreak,
    pub cte_comma_break: ListBreak,
    pub and_break: ListBreak,
    pub or_break: ListBreak,
    pub join_one_line: bool,
    pub case_one_line: bool,
    pub subquery_one_line: bool,
    pub parentheses_one_line: bool,
    pub between_one_line: bool,
    pub values_one_line: bool,
    pub insert_columns_one_line: bool,
    pub with_clause_style: WithClauseStyle,
    /// Legacy alias for `with_clause_style = cte-oneline`.
    pub cte_oneline: bool,
    pub export_comment: bool,
    pub comment_style: CommentStyle,
    /// Normalize `ON a = b` so the operand from the table declared first
    /// in FROM ends up on the left.
    pub join_condition_order_by_declaration: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            keyword_case: KeywordCase::Lower,
            identifier_escape: IdentifierEscape::Double,
            parameter_symbol: ":".into(),
            parameter_style: ParameterStyle::Named,
            indent_char: ' ',
            indent_size: 4,
            newline: "\n".into(),
            comma_break: ListBreak::None,
            values_comma_break: ListBreak::None,
            cte_comma_break: ListBreak::None,
            and_break: ListBreak::None,
            or_break: ListBreak::None,
            join_one_line: false,
            case_one_line: false,
            subquery_one_line: false,
            parentheses_one_line: false,
            between_one_line: false,
            values_one_line: false,
            insert_columns_one_line: false,
            with_clause_style: WithClauseStyle::Standard,
            cte_oneline: false,
            export_comment: true,
            comment_style: CommentStyle::Block,
            join_condition_order_by_declaration: false,
        }
    }
}

impl FormatOptions {
    /// The style actually in effect, folding in the legacy flag.
    pub(crate) fn effective_with_style(&self) -> WithClauseStyle {
        if self.cte_oneline && self.with_clause_style == WithClauseStyle::Standard {
            WithClauseStyle::CteOneline
        } else {
            self.with_clause_style
        }
    }

    /// Anything that makes the output span multiple lines.
    pub(crate) fn multiline(&self) -> bool {
        self.comma_break != ListBreak::None
            || self.values_comma_break != ListBreak::None
            || self.cte_comma_break != ListBreak::None
            || self.and_break != ListBreak::None
            || self.or_break != ListBreak::None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatResult {
    pub formatted_sql: String,
    pub params: IndexMap<String, ParamValue>,
}

/// Format a query with the given options.
pub fn format(query: &Query, options: &FormatOptions) -> FormatResult {
    let mut w = SqlWriter::new(options);
    gen_query::format_query(&mut w, query);
    w.into_result()
}

/// Format a query with the default compact profile.
pub fn format_default(query: &Query) -> FormatResult {
    format(query, &FormatOptions::default())
}

/// Format any root statement.
pub fn format_statement(statement: &Statement, options: &FormatOptions) -> FormatResult {
    let mut w = SqlWriter::new(options);
    gen_query::format_root(&mut w, statement);
    w.into_result()
}

/// Render a single expression, e.g. a column default in DDL output.
pub fn format_expr_standalone(expr: &crate::ast::Expr, options: &FormatOptions) -> String {
    let mut w = SqlWriter::new(options);
    gen_expr::format_expr(&mut w, expr);
    w.into_result().formatted_sql
}
