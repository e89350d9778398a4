//! LIMIT/OFFSET injection with stable parameter names.

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;

pub const LIMIT_PARAMETER: &str = "paging_limit";
pub const OFFSET_PARAMETER: &str = "paging_offset";

pub const MAX_PAGE_SIZE: u64 = 1000;

pub struct PaginationInjector;

impl PaginationInjector {
    /// Add `LIMIT :paging_limit OFFSET :paging_offset` with bound values.
    /// OFFSET is always emitted, page 1 included, so downstream cache keys
    /// stay shape-stable.
    pub fn inject(query: Query, page: u64, page_size: u64) -> Result<Query> {
        if page < 1 {
            return Err(
                Error::transform("Page number must be a positive integer (1 or greater)").into(),
            );
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(Error::transform(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            ))
            .into());
        }

        let mut select = match query {
            Query::Select(s) => *s,
            _ => {
                return Err(
                    Error::transform("Pagination requires a simple SELECT query").into(),
                )
            }
        };

        if select.limit.is_some() || select.offset.is_some() {
            return Err(
                Error::transform("Query already contains LIMIT or OFFSET clause").into(),
            );
        }

        let offset = (page - 1) * page_size;
        select.limit = Some(LimitClause {
            value: Expr::parameter(Parameter::bound(
                LIMIT_PARAMETER,
                ParamValue::Int(page_size as i64),
            )),
            comments: Vec::new(),
        });
        select.offset = Some(OffsetClause {
            value: Expr::parameter(Parameter::bound(
                OFFSET_PARAMETER,
                ParamValue::Int(offset as i64),
            )),
            comments: Vec::new(),
        });
        Ok(Query::Select(Box::new(select)))
    }

    /// Strip LIMIT and OFFSET. Comments attached to the removed clauses
    /// are discarded with them.
    pub fn remove_pagination(query: Query) -> Query {
        match query {
            Query::Select(mut s) => {
                s.limit = None;
                s.offset = None;
                Query::Select(s)
            }
            other => other,
        }
    }
}
