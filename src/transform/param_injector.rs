//! Dynamic WHERE injection.
//!
//! Takes a state map of `column → filter value` and conjoins one predicate
//! per defined entry onto the query's WHERE clause. Filter values bind
//! through named parameters; the formatter later surfaces them in the
//! parameter map.

use indexmap::IndexMap;

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;

use super::collect::{
    collect_select_values, from_bindings, names_match, TableColumnResolver,
};

/// `None` marks an undefined value: the entry is skipped entirely. This is
/// distinct from filtering on NULL, which is a defined
/// [FilterValue::Value] of [ParamValue::Null].
pub type FilterState = IndexMap<String, Option<FilterValue>>;

#[derive(Debug, Clone)]
pub enum FilterValue {
    /// Plain equality.
    Value(ParamValue),
    Condition(FilterCondition),
    /// Parenthesized disjunction of condition branches.
    Or(Vec<FilterCondition>),
}

impl FilterValue {
    pub fn eq(value: impl Into<ParamValue>) -> Option<FilterValue> {
        Some(FilterValue::Value(value.into()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterCondition {
    /// Branch column override inside an `or` group.
    pub column: Option<String>,
    pub eq: Option<ParamValue>,
    pub neq: Option<ParamValue>,
    pub lt: Option<ParamValue>,
    pub lte: Option<ParamValue>,
    pub gt: Option<ParamValue>,
    pub gte: Option<ParamValue>,
    pub min: Option<ParamValue>,
    pub max: Option<ParamValue>,
    pub like: Option<ParamValue>,
    pub ilike: Option<ParamValue>,
    pub in_list: Option<Vec<ParamValue>>,
}

impl FilterCondition {
    fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.neq.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.gt.is_none()
            && self.gte.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.like.is_none()
            && self.ilike.is_none()
            && self.in_list.is_none()
    }
}

#[derive(Default)]
pub struct ParamInjector<'a> {
    resolver: Option<&'a TableColumnResolver<'a>>,
    allow_all_undefined: bool,
}

impl<'a> ParamInjector<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: &'a TableColumnResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn allow_all_undefined(mut self, allow: bool) -> Self {
        self.allow_all_undefined = allow;
        self
    }

    pub fn inject(&self, query: Query, state: &FilterState) -> Result<Query> {
        if state.is_empty() {
            return Ok(query);
        }
        if state.values().all(|v| v.is_none()) {
            if self.allow_all_undefined {
                return Ok(query);
            }
            return Err(Error::transform("All parameters are undefined").into());
        }

        let mut select = match query {
            Query::Select(s) => *s,
            _ => {
                return Err(Error::transform(
                    "Dynamic WHERE injection requires a simple SELECT query",
                )
                .into())
            }
        };

        log::debug!(
            "injecting {} filter entries",
            state.values().filter(|v| v.is_some()).count()
        );

        let projection = collect_select_values(&select, self.resolver, true)?;
        let bindings = select.from.as_ref().map(from_bindings).unwrap_or_default();

        for (key, value) in state {
            let Some(value) = value else { continue };
            let target = self.resolve_target(key, &projection, &bindings)?;
            let predicate = build_predicate(&target, key, value)?;
            let (condition, comments) = match select.where_clause.take() {
                Some(w) => (
                    Expr::binary(w.condition, BinaryOp::And, predicate),
                    w.comments,
                ),
                None => (predicate, Vec::new()),
            };
            select.where_clause = Some(WhereClause { condition, comments });
        }

        Ok(Query::Select(Box::new(select)))
    }

    /// Resolve a state key to the expression its predicates apply to.
    /// Qualified keys must name real tables; alias-qualified keys are
    /// rejected so that cached state survives alias churn.
    fn resolve_target(
        &self,
        key: &str,
        projection: &[(String, Expr)],
        bindings: &[(String, TableRef)],
    ) -> Result<Expr> {
        if let Some((qualifier, column)) = key.split_once('.') {
            if let Some((binding, _)) = bindings
                .iter()
                .find(|(_, table)| names_match(&table.name.value, qualifier))
            {
                return Ok(Expr::qualified_column(binding.clone(), column));
            }
            if bindings.iter().any(|(b, _)| names_match(b, qualifier)) {
                return Err(Error::schema(format!(
                    "Qualified filter keys must use real table names, not aliases: `{key}`"
                ))
                .into());
            }
            return Err(Error::schema(format!("Column `{key}` not found in query")).into());
        }

        if let Some((_, expr)) = projection.iter().find(|(name, _)| names_match(name, key)) {
            return Ok(expr.clone());
        }
        // fall back to the underlying table columns
        if let Some(resolver) = self.resolver {
            for (binding, table) in bindings {
                if let Some(columns) = resolver(&table.name.value) {
                    if columns.iter().any(|c| names_match(c, key)) {
                        return Ok(Expr::qualified_column(binding.clone(), key));
                    }
                }
            }
        }
        Err(Error::schema(format!(
            "Column `{key}` not found in query projection or underlying tables"
        ))
        .into())
    }
}

fn build_predicate(target: &Expr, key: &str, value: &FilterValue) -> Result<Expr> {
    let base = key.rsplit('.').next().unwrap_or(key).to_string();
    match value {
        FilterValue::Value(v) => Ok(comparison(
            target,
            BinaryOp::Eq,
            Parameter::bound(base, v.clone()),
        )),
        FilterValue::Condition(condition) => {
            condition_predicate(target, &base, condition, None)
        }
        FilterValue::Or(branches) => {
            if branches.is_empty() {
                return Err(Error::transform(format!("Empty `or` group for column `{key}`")).into());
            }
            let mut disjunction: Option<Expr> = None;
            for (i, branch) in branches.iter().enumerate() {
                let branch_target = match &branch.column {
                    Some(column) => Expr::column(column.clone()),
                    None => target.clone(),
                };
                let branch_base = branch.column.clone().unwrap_or_else(|| base.clone());
                let prefix = format!("{branch_base}_or_{i}");
                let predicate =
                    condition_predicate(&branch_target, &prefix, branch, Some(&prefix))?;
                disjunction = Some(match disjunction {
                    Some(left) => Expr::binary(left, BinaryOp::Or, predicate),
                    None => predicate,
                });
            }
            Ok(Expr::paren(disjunction.expect("at least one branch")))
        }
    }
}

/// One conjunction of operator predicates. `forced_prefix` is set inside
/// `or` groups, where every parameter gets the `<col>_or_<i>_<op>` name.
fn condition_predicate(
    target: &Expr,
    base: &str,
    condition: &FilterCondition,
    forced_prefix: Option<&str>,
) -> Result<Expr> {
    if condition.is_empty() {
        return Err(Error::transform(format!("Empty condition for column `{base}`")).into());
    }
    let name = |op: &str, plain_eq: bool| -> String {
        match forced_prefix {
            Some(prefix) => format!("{prefix}_{op}"),
            None if plain_eq => base.to_string(),
            None => format!("{base}_{op}"),
        }
    };
    let mut conjunction: Option<Expr> = None;
    let mut push = |expr: Expr| {
        conjunction = Some(match conjunction.take() {
            Some(left) => Expr::binary(left, BinaryOp::And, expr),
            None => expr,
        });
    };

    if let Some(v) = &condition.eq {
        push(comparison(target, BinaryOp::Eq, Parameter::bound(name("eq", true), v.clone())));
    }
    if let Some(v) = &condition.neq {
        push(comparison(target, BinaryOp::NotEq, Parameter::bound(name("neq", false), v.clone())));
    }
    if let Some(v) = &condition.lt {
        push(comparison(target, BinaryOp::Lt, Parameter::bound(name("lt", false), v.clone())));
    }
    if let Some(v) = &condition.lte {
        push(comparison(target, BinaryOp::LtEq, Parameter::bound(name("lte", false), v.clone())));
    }
    if let Some(v) = &condition.gt {
        push(comparison(target, BinaryOp::Gt, Parameter::bound(name("gt", false), v.clone())));
    }
    if let Some(v) = &condition.gte {
        push(comparison(target, BinaryOp::GtEq, Parameter::bound(name("gte", false), v.clone())));
    }
    if let Some(v) = &condition.min {
        push(comparison(target, BinaryOp::GtEq, Parameter::bound(name("min", false), v.clone())));
    }
    if let Some(v) = &condition.max {
        push(comparison(target, BinaryOp::LtEq, Parameter::bound(name("max", false), v.clone())));
    }
    if let Some(v) = &condition.like {
        push(like_predicate(target, name("like", false), v.clone(), false));
    }
    if let Some(v) = &condition.ilike {
        push(like_predicate(target, name("ilike", false), v.clone(), true));
    }
    if let Some(values) = &condition.in_list {
        let params = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Expr::parameter(Parameter::bound(
                    format!("{}_{}", name("in", false), i),
                    v.clone(),
                ))
            })
            .collect();
        push(Expr::new(ExprKind::InList {
            expr: Box::new(target.clone()),
            list: params,
            negated: false,
        }));
    }

    let predicate = conjunction.expect("condition has at least one operator");
    Ok(predicate)
}

fn comparison(target: &Expr, op: BinaryOp, parameter: Parameter) -> Expr {
    Expr::binary(target.clone(), op, Expr::parameter(parameter))
}

fn like_predicate(target: &Expr, name: String, value: ParamValue, case_insensitive: bool) -> Expr {
    Expr::new(ExprKind::Like {
        expr: Box::new(target.clone()),
        pattern: Box::new(Expr::parameter(Parameter::bound(name, value))),
        escape: None,
        negated: false,
        case_insensitive,
    })
}
