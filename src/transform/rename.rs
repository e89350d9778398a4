//! Cursor-driven renaming of CTE names and table aliases.
//!
//! The cursor identifies a lexeme; the parsed AST classifies it (a name
//! introduced in WITH is a CTE, a name introduced after a source is an
//! alias) and provides the rename scope. CTE names have statement-global
//! scope; an alias is scoped to the query level that declares it,
//! including nested subqueries, with inner re-declarations shadowing.
//!
//! Two output paths: splicing the new name into the original text (layout
//! and comments untouched), or rewriting the AST and formatting it.

use once_cell::sync::Lazy;
use regex::Regex;

use anyhow::Result;

use crate::ast::fold::{self, AstFold};
use crate::ast::visitor::Visitor;
use crate::ast::*;
use crate::error::Error;
use crate::format::{self, FormatOptions};
use crate::keywords;
use crate::lexer::{self, IdentQuote, TokenKind};
use crate::parser;

use super::collect::{collect_cte_names, collect_tables, names_match, TableScan};

static IDENT_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid pattern"));

#[derive(Debug, Clone)]
pub struct RenameOptions {
    /// Splice into the original text instead of reformatting.
    pub preserve_formatting: bool,
    pub format: FormatOptions,
}

impl Default for RenameOptions {
    fn default() -> Self {
        RenameOptions {
            preserve_formatting: true,
            format: FormatOptions::default(),
        }
    }
}

/// A renamed identifier occurrence: where it was and how it was quoted.
type Site = (crate::error::Span, Option<IdentQuote>);

/// Classifies the identifier under the cursor and delegates to the CTE or
/// alias path.
pub struct SmartRenamer;

impl SmartRenamer {
    pub fn rename(
        sql: &str,
        line: usize,
        column: usize,
        new_name: &str,
        options: &RenameOptions,
    ) -> Result<String> {
        let (old_name, offset) = identifier_at(sql, line, column)?;
        let query = parser::parse_select(sql)?;

        let cte_names = collect_cte_names(&query);
        if cte_names.iter().any(|n| names_match(n, &old_name)) {
            return CteRenamer::rename_parsed(sql, query, &old_name, new_name, options);
        }
        let aliases = collect_alias_names(&query);
        if aliases.iter().any(|a| names_match(a, &old_name)) {
            return AliasRenamer::rename_parsed(
                sql,
                query,
                &old_name,
                new_name,
                Some(offset),
                options,
            );
        }
        Err(Error::rename(format!(
            "`{old_name}` is neither a CTE name nor a table alias"
        ))
        .into())
    }
}

pub struct CteRenamer;

impl CteRenamer {
    /// Rename a CTE by name, statement-wide.
    pub fn rename(
        sql: &str,
        old_name: &str,
        new_name: &str,
        options: &RenameOptions,
    ) -> Result<String> {
        let query = parser::parse_select(sql)?;
        let cte_names = collect_cte_names(&query);
        if !cte_names.iter().any(|n| names_match(n, old_name)) {
            return Err(Error::rename(format!("CTE `{old_name}` not found")).into());
        }
        Self::rename_parsed(sql, query, old_name, new_name, options)
    }

    fn rename_parsed(
        sql: &str,
        query: Query,
        old_name: &str,
        new_name: &str,
        options: &RenameOptions,
    ) -> Result<String> {
        check_conflicts(&query, old_name, new_name)?;
        let mut fold = CteRenameFold {
            old: old_name,
            new: new_name,
            sites: Vec::new(),
        };
        let renamed = fold.fold_query(query)?;
        emit(sql, fold.sites, &renamed, new_name, options)
    }
}

pub struct AliasRenamer;

impl AliasRenamer {
    /// Rename the table alias at a cursor position.
    pub fn rename_at(
        sql: &str,
        line: usize,
        column: usize,
        new_name: &str,
        options: &RenameOptions,
    ) -> Result<String> {
        let (old_name, offset) = identifier_at(sql, line, column)?;
        let query = parser::parse_select(sql)?;
        let aliases = collect_alias_names(&query);
        if !aliases.iter().any(|a| names_match(a, &old_name)) {
            return Err(Error::rename(format!("`{old_name}` is not a table alias")).into());
        }
        Self::rename_parsed(sql, query, &old_name, new_name, Some(offset), options)
    }

    fn rename_parsed(
        sql: &str,
        query: Query,
        old_name: &str,
        new_name: &str,
        cursor: Option<usize>,
        options: &RenameOptions,
    ) -> Result<String> {
        check_conflicts(&query, old_name, new_name)?;

        // when the alias is declared in several scopes, the cursor decides
        let target_scope = {
            let mut finder = ScopeFinder {
                old: old_name,
                cursor,
                next_id: 0,
                found: None,
                declarations: 0,
            };
            finder.find_in_query(&query);
            if finder.declarations > 1 {
                match finder.found {
                    Some(id) => Some(id),
                    None => {
                        return Err(Error::rename(format!(
                            "Alias `{old_name}` is declared more than once; rename at a specific position"
                        ))
                        .into())
                    }
                }
            } else {
                None
            }
        };

        let mut renamer = AliasRewrite {
            old: old_name,
            new: new_name,
            target_scope,
            next_id: 0,
            sites: Vec::new(),
        };
        let mut renamed = query;
        renamer.rewrite_query(&mut renamed, false);
        emit(sql, renamer.sites, &renamed, new_name, options)
    }
}

/// The low-level engine: splice replacement text over identifier spans in
/// the original SQL, preserving each occurrence's quoting style.
pub struct SqlIdentifierRenamer;

impl SqlIdentifierRenamer {
    pub fn splice(sql: &str, mut sites: Vec<Site>, new_name: &str) -> String {
        sites.sort_by_key(|(span, _)| span.start);
        sites.dedup_by_key(|(span, _)| span.start);
        let mut out = sql.to_string();
        for (span, quote) in sites.into_iter().rev() {
            out.replace_range(span.start..span.end, &requote(new_name, quote));
        }
        out
    }
}

fn requote(name: &str, quote: Option<IdentQuote>) -> String {
    match quote {
        None => name.to_string(),
        Some(IdentQuote::Double) => format!("\"{}\"", name.replace('"', "\"\"")),
        Some(IdentQuote::Backtick) => format!("`{name}`"),
        Some(IdentQuote::Bracket) => format!("[{name}]"),
    }
}

fn emit(
    sql: &str,
    sites: Vec<(Option<crate::error::Span>, Option<IdentQuote>)>,
    renamed: &Query,
    new_name: &str,
    options: &RenameOptions,
) -> Result<String> {
    if sites.is_empty() {
        return Err(Error::rename("No identifier found").into());
    }
    if options.preserve_formatting && sites.iter().all(|(span, _)| span.is_some()) {
        let concrete = sites
            .into_iter()
            .map(|(span, quote)| (span.expect("checked above"), quote))
            .collect();
        return Ok(SqlIdentifierRenamer::splice(sql, concrete, new_name));
    }
    Ok(format::format(renamed, &options.format).formatted_sql)
}

/// Find the identifier token under a 1-based line/column cursor.
fn identifier_at(sql: &str, line: usize, column: usize) -> Result<(String, usize)> {
    if sql.trim().is_empty() {
        return Err(Error::rename("Empty SQL").into());
    }
    let tokens = lexer::tokenize(sql)?;
    let hit = tokens.iter().find(|t| {
        !t.is_eof()
            && (t.start.line, t.start.column) <= (line, column)
            && (line, column) < (t.end.line, t.end.column)
    });
    let Some(token) = hit else {
        return Err(Error::rename("Invalid position").into());
    };
    match token.kind {
        TokenKind::Ident | TokenKind::QuotedIdent(_) => {
            Ok((token.canonical.clone(), token.span.start))
        }
        TokenKind::Keyword if !keywords::is_reserved(&token.canonical) => {
            Ok((token.text.clone(), token.span.start))
        }
        TokenKind::Whitespace | TokenKind::Newline => {
            Err(Error::rename("No identifier found").into())
        }
        _ => Err(Error::rename(format!("`{}` is not an identifier", token.text)).into()),
    }
}

fn check_conflicts(query: &Query, old_name: &str, new_name: &str) -> Result<()> {
    if !IDENT_SHAPE.is_match(new_name) {
        return Err(Error::rename(format!("`{new_name}` is not a valid identifier")).into());
    }
    if keywords::is_reserved(new_name) {
        return Err(Error::rename(format!("`{new_name}` is a reserved keyword")).into());
    }
    if names_match(new_name, old_name) {
        return Err(Error::rename("The new name is identical to the old name").into());
    }
    let cte_names = collect_cte_names(query);
    if cte_names.iter().any(|n| names_match(n, new_name)) {
        return Err(Error::rename(format!("CTE name `{new_name}` already exists")).into());
    }
    let tables = collect_tables(query, TableScan::Full);
    if tables
        .iter()
        .any(|t| t.namespaces.is_empty() && names_match(&t.name.value, new_name))
    {
        return Err(Error::rename(format!(
            "`{new_name}` conflicts with a table name in scope"
        ))
        .into());
    }
    Ok(())
}

fn collect_alias_names(query: &Query) -> Vec<String> {
    #[derive(Default)]
    struct Aliases {
        names: Vec<String>,
    }
    impl Visitor for Aliases {
        fn visit_source(&mut self, source: &SourceExpr) {
            if let Some(alias) = &source.alias {
                if !self.names.iter().any(|n| names_match(n, &alias.name.value)) {
                    self.names.push(alias.name.value.clone());
                }
            }
            crate::ast::visitor::walk_source(self, source);
        }
    }
    let mut collector = Aliases::default();
    collector.visit_query(query);
    collector.names
}

// --- CTE rename (statement-global scope) --------------------------------

struct CteRenameFold<'a> {
    old: &'a str,
    new: &'a str,
    sites: Vec<(Option<crate::error::Span>, Option<IdentQuote>)>,
}

impl CteRenameFold<'_> {
    fn rename_ident(&mut self, ident: &mut Ident) {
        if names_match(&ident.value, self.old) {
            self.sites.push((ident.span, ident.quote));
            ident.value = self.new.to_string();
        }
    }
}

impl AstFold for CteRenameFold<'_> {
    fn fold_common_table(&mut self, mut cte: CommonTable) -> Result<CommonTable> {
        self.rename_ident(&mut cte.name);
        fold::fold_common_table(self, cte)
    }

    fn fold_source(&mut self, mut source: SourceExpr) -> Result<SourceExpr> {
        if let SourceKind::Table(table) = &mut source.kind {
            if table.namespaces.is_empty() {
                self.rename_ident(&mut table.name);
            }
        }
        fold::fold_source(self, source)
    }

    fn fold_expr_kind(&mut self, kind: ExprKind) -> Result<ExprKind> {
        match kind {
            ExprKind::ColumnRef(mut column) => {
                if let Some(first) = column.namespaces.first_mut() {
                    self.rename_ident(first);
                }
                Ok(ExprKind::ColumnRef(column))
            }
            ExprKind::Wildcard { mut namespaces } => {
                if let Some(first) = namespaces.first_mut() {
                    self.rename_ident(first);
                }
                Ok(ExprKind::Wildcard { namespaces })
            }
            other => fold::fold_expr_kind(self, other),
        }
    }
}

// --- alias rename (scoped) ----------------------------------------------

/// First pass: number the scopes that declare the alias (pre-order) and
/// pick the innermost one containing the cursor.
struct ScopeFinder<'a> {
    old: &'a str,
    cursor: Option<usize>,
    next_id: usize,
    found: Option<usize>,
    declarations: usize,
}

impl ScopeFinder<'_> {
    fn find_in_query(&mut self, query: &Query) {
        self.visit_query(query);
    }
}

// The traversal order must mirror [AliasRewrite] exactly so the scope
// numbering of the two passes lines up; both follow the visitor's clause
// order.
impl Visitor for ScopeFinder<'_> {
    fn visit_select_query(&mut self, select: &SelectQuery) {
        let declares = select
            .from
            .as_ref()
            .map(|f| from_declares(f, self.old))
            .unwrap_or(false);
        if declares {
            let id = self.next_id;
            self.next_id += 1;
            self.declarations += 1;
            if let Some(cursor) = self.cursor {
                let (min, max) = select_span_range(select);
                // children are visited later and overwrite: innermost wins
                if min <= cursor && cursor < max {
                    self.found = Some(id);
                }
            }
        }
        crate::ast::visitor::walk_select_query(self, select);
    }
}

fn from_declares(from: &FromClause, alias: &str) -> bool {
    from.sources().iter().any(|s| source_declares(s, alias))
}

fn source_declares(source: &SourceExpr, alias: &str) -> bool {
    if let Some(a) = &source.alias {
        if names_match(&a.name.value, alias) {
            return true;
        }
    }
    if let SourceKind::Paren(inner) = &source.kind {
        return inner.sources().iter().any(|s| source_declares(s, alias));
    }
    false
}

/// Byte range spanned by a SELECT subtree, approximated from the spans the
/// parser recorded on expressions, tables and aliases.
fn select_span_range(select: &SelectQuery) -> (usize, usize) {
    #[derive(Default)]
    struct SpanScan {
        min: Option<usize>,
        max: usize,
    }
    impl SpanScan {
        fn push(&mut self, span: Option<crate::error::Span>) {
            if let Some(span) = span {
                self.min = Some(self.min.map_or(span.start, |m: usize| m.min(span.start)));
                self.max = self.max.max(span.end);
            }
        }
    }
    impl Visitor for SpanScan {
        fn visit_expr(&mut self, expr: &Expr) {
            self.push(expr.span);
            crate::ast::visitor::walk_expr(self, expr);
        }
        fn visit_table_ref(&mut self, table: &TableRef) {
            self.push(table.name.span);
        }
        fn visit_source(&mut self, source: &SourceExpr) {
            if let Some(alias) = &source.alias {
                self.push(alias.name.span);
            }
            crate::ast::visitor::walk_source(self, source);
        }
    }
    let mut scan = SpanScan::default();
    scan.visit_select_query(select);
    (scan.min.unwrap_or(0), scan.max)
}

/// Second pass: the rewrite. Scope numbering mirrors [ScopeFinder] so the
/// chosen target lines up.
struct AliasRewrite<'a> {
    old: &'a str,
    new: &'a str,
    target_scope: Option<usize>,
    next_id: usize,
    sites: Vec<(Option<crate::error::Span>, Option<IdentQuote>)>,
}

impl AliasRewrite<'_> {
    fn rewrite_query(&mut self, query: &mut Query, in_scope: bool) {
        match query {
            Query::Select(s) => self.rewrite_select(s, in_scope),
            Query::Binary(b) => {
                self.rewrite_query(&mut b.left, in_scope);
                self.rewrite_query(&mut b.right, in_scope);
            }
            Query::Values(v) => {
                for tuple in &mut v.tuples {
                    for expr in tuple {
                        self.rewrite_expr(expr, in_scope);
                    }
                }
            }
        }
    }

    fn rewrite_select(&mut self, select: &mut SelectQuery, in_scope: bool) {
        let declares = select
            .from
            .as_ref()
            .map(|f| from_declares(f, self.old))
            .unwrap_or(false);

        let mut now_in_scope = in_scope;
        if declares {
            let id = self.next_id;
            self.next_id += 1;
            let activate = match self.target_scope {
                Some(target) => target == id,
                None => !in_scope,
            };
            if activate {
                if let Some(from) = &mut select.from {
                    self.rename_declarations(from);
                }
                now_in_scope = true;
            } else {
                // an inner re-declaration shadows the outer alias
                now_in_scope = false;
            }
        }

        // CTE bodies cannot see outer aliases
        if let Some(with) = &mut select.with_clause {
            for cte in &mut with.tables {
                self.rewrite_query(&mut cte.query, false);
            }
        }
        if let Some(Distinct::DistinctOn(exprs)) = &mut select.select.distinct {
            for expr in exprs {
                self.rewrite_expr(expr, now_in_scope);
            }
        }
        for item in &mut select.select.items {
            self.rewrite_expr(&mut item.expr, now_in_scope);
        }
        if let Some(from) = &mut select.from {
            self.rewrite_from(from, now_in_scope);
        }
        if let Some(w) = &mut select.where_clause {
            self.rewrite_expr(&mut w.condition, now_in_scope);
        }
        if let Some(group) = &mut select.group_by {
            match &mut group.grouping {
                GroupingKind::Plain(exprs)
                | GroupingKind::Rollup(exprs)
                | GroupingKind::Cube(exprs) => {
                    for expr in exprs {
                        self.rewrite_expr(expr, now_in_scope);
                    }
                }
                GroupingKind::Sets(sets) => {
                    for set in sets {
                        for expr in set {
                            self.rewrite_expr(expr, now_in_scope);
                        }
                    }
                }
            }
        }
        if let Some(h) = &mut select.having {
            self.rewrite_expr(&mut h.condition, now_in_scope);
        }
        if let Some(order) = &mut select.order_by {
            for item in &mut order.items {
                self.rewrite_expr(&mut item.expr, now_in_scope);
            }
        }
        if let Some(l) = &mut select.limit {
            self.rewrite_expr(&mut l.value, now_in_scope);
        }
        if let Some(o) = &mut select.offset {
            self.rewrite_expr(&mut o.value, now_in_scope);
        }
    }

    fn rename_declarations(&mut self, from: &mut FromClause) {
        let old = self.old;
        let mut rename = |source: &mut SourceExpr| {
            if let Some(alias) = &mut source.alias {
                if names_match(&alias.name.value, old) {
                    self.sites.push((alias.name.span, alias.name.quote));
                    alias.name.value = self.new.to_string();
                }
            }
        };
        rename(&mut from.source);
        for join in &mut from.joins {
            rename(&mut join.source);
        }
        // parenthesized join trees
        fn descend(
            this: &mut AliasRewrite,
            source_kind: &mut SourceKind,
        ) {
            if let SourceKind::Paren(inner) = source_kind {
                let mut rename_inner = |source: &mut SourceExpr| {
                    if let Some(alias) = &mut source.alias {
                        if names_match(&alias.name.value, this.old) {
                            this.sites.push((alias.name.span, alias.name.quote));
                            alias.name.value = this.new.to_string();
                        }
                    }
                };
                rename_inner(&mut inner.source);
                for join in &mut inner.joins {
                    rename_inner(&mut join.source);
                }
                descend(this, &mut inner.source.kind);
                for join in &mut inner.joins {
                    descend(this, &mut join.source.kind);
                }
            }
        }
        descend(self, &mut from.source.kind);
        for join in &mut from.joins {
            descend(self, &mut join.source.kind);
        }
    }

    fn rewrite_from(&mut self, from: &mut FromClause, in_scope: bool) {
        self.rewrite_source(&mut from.source, in_scope);
        for join in &mut from.joins {
            self.rewrite_source(&mut join.source, in_scope);
            if let Some(JoinCondition::On(expr)) = &mut join.condition {
                self.rewrite_expr(expr, in_scope);
            }
        }
    }

    fn rewrite_source(&mut self, source: &mut SourceExpr, in_scope: bool) {
        match &mut source.kind {
            SourceKind::Subquery(q) => self.rewrite_query(q, in_scope),
            SourceKind::Function(call) => {
                for arg in &mut call.args {
                    self.rewrite_expr(arg, in_scope);
                }
            }
            SourceKind::Values(v) => {
                for tuple in &mut v.tuples {
                    for expr in tuple {
                        self.rewrite_expr(expr, in_scope);
                    }
                }
            }
            SourceKind::Paren(inner) => {
                self.rewrite_source(&mut inner.source, in_scope);
                for join in &mut inner.joins {
                    self.rewrite_source(&mut join.source, in_scope);
                    if let Some(JoinCondition::On(expr)) = &mut join.condition {
                        self.rewrite_expr(expr, in_scope);
                    }
                }
            }
            SourceKind::Table(_) => {}
        }
    }

    fn rewrite_expr(&mut self, expr: &mut Expr, in_scope: bool) {
        let old = self.old;
        match &mut expr.kind {
            ExprKind::ColumnRef(column) => {
                if in_scope {
                    if let Some(first) = column.namespaces.first_mut() {
                        if names_match(&first.value, old) {
                            self.sites.push((first.span, first.quote));
                            first.value = self.new.to_string();
                        }
                    }
                }
            }
            ExprKind::Wildcard { namespaces } => {
                if in_scope {
                    if let Some(first) = namespaces.first_mut() {
                        if names_match(&first.value, old) {
                            self.sites.push((first.span, first.quote));
                            first.value = self.new.to_string();
                        }
                    }
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.rewrite_expr(left, in_scope);
                self.rewrite_expr(right, in_scope);
            }
            ExprKind::Unary { expr: inner, .. } => self.rewrite_expr(inner, in_scope),
            ExprKind::Function(call) => {
                for arg in &mut call.args {
                    self.rewrite_expr(arg, in_scope);
                }
                if let Some(filter) = &mut call.filter {
                    self.rewrite_expr(filter, in_scope);
                }
                if let Some(over) = &mut call.over {
                    for expr in &mut over.partition_by {
                        self.rewrite_expr(expr, in_scope);
                    }
                    if let Some(order) = &mut over.order_by {
                        for item in &mut order.items {
                            self.rewrite_expr(&mut item.expr, in_scope);
                        }
                    }
                }
                if let Some(order) = &mut call.order_by {
                    for item in &mut order.items {
                        self.rewrite_expr(&mut item.expr, in_scope);
                    }
                }
            }
            ExprKind::Case(case) => {
                if let Some(operand) = &mut case.operand {
                    self.rewrite_expr(operand, in_scope);
                }
                for branch in &mut case.branches {
                    self.rewrite_expr(&mut branch.condition, in_scope);
                    self.rewrite_expr(&mut branch.result, in_scope);
                }
                if let Some(else_expr) = &mut case.else_expr {
                    self.rewrite_expr(else_expr, in_scope);
                }
            }
            ExprKind::Cast { expr: inner, .. } => self.rewrite_expr(inner, in_scope),
            ExprKind::InList { expr: inner, list, .. } => {
                self.rewrite_expr(inner, in_scope);
                for item in list {
                    self.rewrite_expr(item, in_scope);
                }
            }
            ExprKind::InSubquery { expr: inner, query, .. } => {
                self.rewrite_expr(inner, in_scope);
                self.rewrite_query(query, in_scope);
            }
            ExprKind::Between {
                expr: inner,
                low,
                high,
                ..
            } => {
                self.rewrite_expr(inner, in_scope);
                self.rewrite_expr(low, in_scope);
                self.rewrite_expr(high, in_scope);
            }
            ExprKind::Exists { query, .. } => self.rewrite_query(query, in_scope),
            ExprKind::Like {
                expr: inner,
                pattern,
                escape,
                ..
            } => {
                self.rewrite_expr(inner, in_scope);
                self.rewrite_expr(pattern, in_scope);
                if let Some(escape) = escape {
                    self.rewrite_expr(escape, in_scope);
                }
            }
            ExprKind::Tuple(items) | ExprKind::Array(items) => {
                for item in items {
                    self.rewrite_expr(item, in_scope);
                }
            }
            ExprKind::Subquery(query) => self.rewrite_query(query, in_scope),
            ExprKind::Paren(inner) => self.rewrite_expr(inner, in_scope),
            ExprKind::Literal(_) | ExprKind::Parameter(_) | ExprKind::TypedString { .. } => {}
        }
    }
}
