//! One-call composition of filtering, sorting, pagination and JSON
//! wrapping.

use anyhow::Result;

use crate::ast::fold::AstFold;
use crate::ast::*;
use crate::error::Error;

use super::collect::{collect_parameter_names, names_match, TableColumnResolver};
use super::pagination::PaginationInjector;
use super::param_injector::{FilterState, FilterValue, ParamInjector};
use super::sort_injector::{SortInjector, SortState};

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub page: u64,
    pub page_size: u64,
}

/// Wrap the result set into a single `jsonb_agg` row.
#[derive(Debug, Clone)]
pub struct JsonSerialize {
    pub root: String,
}

#[derive(Default)]
pub struct DynamicQueryOptions {
    pub filter: Option<FilterState>,
    pub sort: Option<SortState>,
    pub paging: Option<Paging>,
    pub serialize: Option<JsonSerialize>,
}

#[derive(Default)]
pub struct DynamicQueryBuilder<'a> {
    resolver: Option<&'a TableColumnResolver<'a>>,
}

impl<'a> DynamicQueryBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: &'a TableColumnResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Apply filter, sort and paging in that order. Filter keys that match
    /// a named parameter already present in the query bind its value
    /// instead of adding a predicate; only keys matching projected columns
    /// become WHERE conditions.
    pub fn build(&self, query: Query, options: &DynamicQueryOptions) -> Result<Query> {
        let mut query = query;

        if let Some(filter) = &options.filter {
            let existing = collect_parameter_names(&query);
            let mut bindings: Vec<(String, ParamValue)> = Vec::new();
            let mut predicates = FilterState::new();
            for (key, value) in filter {
                if existing.iter().any(|name| names_match(name, key)) {
                    match value {
                        Some(FilterValue::Value(v)) => bindings.push((key.clone(), v.clone())),
                        Some(_) => {
                            return Err(Error::transform(format!(
                                "Parameter `{key}` can only bind a plain value"
                            ))
                            .into())
                        }
                        None => {}
                    }
                } else {
                    predicates.insert(key.clone(), value.clone());
                }
            }
            if !bindings.is_empty() {
                let mut binder = ParameterBinder { bindings };
                query = binder.fold_query(query)?;
            }
            if !predicates.is_empty() {
                let mut injector = ParamInjector::new();
                if let Some(resolver) = self.resolver {
                    injector = injector.with_resolver(resolver);
                }
                query = injector.inject(query, &predicates)?;
            }
        }

        if let Some(sort) = &options.sort {
            let mut injector = SortInjector::new();
            if let Some(resolver) = self.resolver {
                injector = injector.with_resolver(resolver);
            }
            query = injector.inject(query, sort)?;
        }

        if let Some(paging) = &options.paging {
            query = PaginationInjector::inject(query, paging.page, paging.page_size)?;
        }

        if let Some(serialize) = &options.serialize {
            query = wrap_jsonb_agg(query, &serialize.root);
        }

        Ok(query)
    }
}

/// Bind values onto pre-existing named parameters, leaving the tree shape
/// untouched.
struct ParameterBinder {
    bindings: Vec<(String, ParamValue)>,
}

impl AstFold for ParameterBinder {
    fn fold_parameter(&mut self, mut parameter: Parameter) -> Result<Parameter> {
        if let Some((_, value)) = self
            .bindings
            .iter()
            .find(|(name, _)| names_match(name, &parameter.name))
        {
            parameter.value = Some(value.clone());
        }
        Ok(parameter)
    }
}

/// `select jsonb_agg("t") as "<root>" from (<query>) as "t"`.
fn wrap_jsonb_agg(query: Query, root: &str) -> Query {
    let call = FunctionCall::simple("jsonb_agg", vec![Expr::column("t")]);
    let select = SelectQuery {
        select: SelectClause {
            distinct: None,
            items: vec![SelectItem::aliased(Expr::function(call), root)],
            comments: Vec::new(),
        },
        from: Some(FromClause::new(SourceExpr {
            kind: SourceKind::Subquery(query),
            alias: Some(SourceAlias::new("t")),
            comments: Vec::new(),
        })),
        ..Default::default()
    };
    Query::Select(Box::new(select))
}
