//! The keyword table.
//!
//! Keywords are matched case-insensitively; the lexer stores the original
//! casing on the token and the canonical lowercase form alongside it. The
//! table is immutable and shared by every parse (the only quasi-global in
//! the crate).

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Every word the lexer classifies as a keyword rather than an identifier.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "all",
        "alter",
        "and",
        "any",
        "array",
        "as",
        "asc",
        "between",
        "by",
        "case",
        "cast",
        "check",
        "column",
        "conflict",
        "constraint",
        "create",
        "cross",
        "cube",
        "current",
        "default",
        "delete",
        "desc",
        "distinct",
        "do",
        "drop",
        "else",
        "end",
        "escape",
        "except",
        "exists",
        "false",
        "fetch",
        "filter",
        "first",
        "following",
        "for",
        "foreign",
        "from",
        "full",
        "group",
        "grouping",
        "groups",
        "having",
        "if",
        "ilike",
        "in",
        "index",
        "inner",
        "insert",
        "intersect",
        "into",
        "is",
        "join",
        "key",
        "last",
        "lateral",
        "left",
        "like",
        "limit",
        "materialized",
        "next",
        "not",
        "nothing",
        "null",
        "nulls",
        "offset",
        "on",
        "only",
        "or",
        "order",
        "outer",
        "over",
        "partition",
        "preceding",
        "primary",
        "range",
        "recursive",
        "references",
        "returning",
        "right",
        "rollup",
        "rows",
        "select",
        "set",
        "sets",
        "share",
        "table",
        "temp",
        "temporary",
        "then",
        "true",
        "unbounded",
        "union",
        "unique",
        "update",
        "using",
        "values",
        "when",
        "where",
        "window",
        "with",
        "within",
    ]
    .into()
});

/// Keywords that can never serve as a bare identifier, alias, or rename
/// target. Deliberately narrower than [KEYWORDS]: `user` is fine as a column
/// name, `select` is not.
static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "all",
        "and",
        "any",
        "array",
        "as",
        "asc",
        "between",
        "case",
        "cast",
        "check",
        "constraint",
        "create",
        "cross",
        "default",
        "desc",
        "distinct",
        "do",
        "else",
        "end",
        "except",
        "exists",
        "false",
        "fetch",
        "for",
        "foreign",
        "from",
        "full",
        "group",
        "having",
        "ilike",
        "in",
        "inner",
        "intersect",
        "into",
        "is",
        "join",
        "lateral",
        "left",
        "like",
        "limit",
        "not",
        "null",
        "offset",
        "on",
        "or",
        "order",
        "outer",
        "primary",
        "references",
        "returning",
        "right",
        "select",
        "set",
        "table",
        "then",
        "true",
        "union",
        "unique",
        "using",
        "values",
        "when",
        "where",
        "window",
        "with",
    ]
    .into()
});

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word.to_ascii_lowercase().as_str())
}

pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(word.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        assert!(is_keyword("SELECT"));
        assert!(is_keyword("Select"));
        assert!(!is_keyword("user"));
    }

    #[test]
    fn reserved_is_a_subset() {
        assert!(is_reserved("select"));
        assert!(is_keyword("first"));
        assert!(!is_reserved("first"));
    }
}
