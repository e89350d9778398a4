//! Simple tests for "this SQL + this transform creates this SQL" go here.

use insta::assert_snapshot;
use similar_asserts::assert_eq;

use crate::ast::*;
use crate::format::{
    CommentStyle, FormatOptions, IdentifierEscape, KeywordCase, ListBreak, ParameterStyle,
    WithClauseStyle,
};
use crate::transform::*;
use crate::{format, parser};

fn fmt(sql: &str) -> String {
    let query = parser::parse_select(sql).unwrap();
    format::format_default(&query).formatted_sql
}

fn fmt_with(sql: &str, options: &FormatOptions) -> String {
    let query = parser::parse_select(sql).unwrap();
    format::format(&query, options).formatted_sql
}

#[test]
fn test_default_profile_is_compact_lowercase() {
    assert_snapshot!(
        fmt("SELECT id, name FROM users WHERE active = true"),
        @r#"select "id", "name" from "users" where "active" = true"#
    );
}

#[test]
fn test_keyword_case_upper() {
    let options = FormatOptions {
        keyword_case: KeywordCase::Upper,
        ..Default::default()
    };
    assert_snapshot!(
        fmt_with("select id from users order by id desc nulls last", &options),
        @r#"SELECT "id" FROM "users" ORDER BY "id" DESC NULLS LAST"#
    );
}

#[test]
fn test_identifier_escape_styles() {
    let backtick = FormatOptions {
        identifier_escape: IdentifierEscape::Backtick,
        ..Default::default()
    };
    assert_snapshot!(
        fmt_with("select id from users", &backtick),
        @"select `id` from `users`"
    );
    let none = FormatOptions {
        identifier_escape: IdentifierEscape::None,
        ..Default::default()
    };
    assert_snapshot!(
        fmt_with("select id from users", &none),
        @"select id from users"
    );
}

#[test]
fn test_parameter_styles() {
    let query = parser::parse_select("select * from t where a = :v and b = :w and c = :v").unwrap();

    let named = format::format_default(&query);
    assert_snapshot!(
        named.formatted_sql,
        @r#"select * from "t" where "a" = :v and "b" = :w and "c" = :v"#
    );
    // one map entry per unique name
    assert_eq!(named.params.len(), 2);

    let indexed = format::format(
        &query,
        &FormatOptions {
            parameter_style: ParameterStyle::Indexed,
            parameter_symbol: "$".into(),
            ..Default::default()
        },
    );
    assert_snapshot!(
        indexed.formatted_sql,
        @r#"select * from "t" where "a" = $1 and "b" = $2 and "c" = $1"#
    );

    let anonymous = format::format(
        &query,
        &FormatOptions {
            parameter_style: ParameterStyle::Anonymous,
            ..Default::default()
        },
    );
    assert_snapshot!(
        anonymous.formatted_sql,
        @r#"select * from "t" where "a" = ? and "b" = ? and "c" = ?"#
    );
}

#[test]
fn test_comma_break_layouts() {
    let after = FormatOptions {
        comma_break: ListBreak::After,
        ..Default::default()
    };
    assert_eq!(
        fmt_with("select a, b from t", &after),
        "select\n    \"a\",\n    \"b\"\nfrom \"t\""
    );

    let before = FormatOptions {
        comma_break: ListBreak::Before,
        ..Default::default()
    };
    assert_eq!(
        fmt_with("select a, b from t", &before),
        "select\n    \"a\"\n    , \"b\"\nfrom \"t\""
    );
}

#[test]
fn test_and_break_layout() {
    let options = FormatOptions {
        and_break: ListBreak::Before,
        ..Default::default()
    };
    assert_eq!(
        fmt_with("select * from t where a = 1 and b = 2", &options),
        "select *\nfrom \"t\"\nwhere \"a\" = 1\nand \"b\" = 2"
    );
}

#[test]
fn test_with_clause_full_oneline() {
    let options = FormatOptions {
        comma_break: ListBreak::After,
        with_clause_style: WithClauseStyle::FullOneline,
        ..Default::default()
    };
    assert_eq!(
        fmt_with("with d as (select a, b from t) select a from d", &options),
        "with \"d\" as (select \"a\", \"b\" from \"t\")\nselect\n    \"a\"\nfrom \"d\""
    );
}

#[test]
fn test_join_condition_order_by_declaration() {
    let options = FormatOptions {
        join_condition_order_by_declaration: true,
        ..Default::default()
    };
    assert_snapshot!(
        fmt_with("select * from a join b on b.id = a.id", &options),
        @r#"select * from "a" inner join "b" on "a"."id" = "b"."id""#
    );
}

#[test]
fn test_format_is_idempotent() {
    let cases = [
        "SELECT DISTINCT a, b AS c FROM t1 JOIN t2 ON t1.x = t2.y WHERE a > 1 ORDER BY b NULLS FIRST LIMIT 3 OFFSET 4",
        "WITH d AS (SELECT 1 AS n) SELECT n FROM d UNION ALL SELECT 2",
        "SELECT CASE WHEN a = 1 THEN 'one' ELSE 'other' END, count(*) FILTER (WHERE b > 0) FROM t GROUP BY ROLLUP (a, b)",
        "SELECT x::int, CAST(y AS numeric(10, 2)), z BETWEEN 1 AND 10 FROM t WHERE s LIKE 'a%' ESCAPE '!'",
    ];
    for sql in cases {
        let once = fmt(sql);
        let twice = fmt(&once);
        assert_eq!(once, twice, "formatting `{sql}` is not idempotent");
    }
}

#[test]
fn test_comment_conservation() {
    let sql = "-- header\nselect id -- id col\nfrom t /* tail */";
    let formatted = fmt(sql);
    for text in ["header", "id col", "tail"] {
        assert!(
            formatted.contains(text),
            "`{text}` missing from `{formatted}`"
        );
    }
    // the output still parses
    parser::parse_select(&formatted).unwrap();
}

#[test]
fn test_export_comment_off_strips_comments() {
    let options = FormatOptions {
        export_comment: false,
        ..Default::default()
    };
    let query = parser::parse_select("select id /* noise */ from t").unwrap();
    assert_snapshot!(
        format::format(&query, &options).formatted_sql,
        @r#"select "id" from "t""#
    );
}

#[test]
fn test_smart_comment_style() {
    // scenario: inline block comments become line comments at line ends
    let options = FormatOptions {
        comma_break: ListBreak::After,
        comment_style: CommentStyle::Smart,
        ..Default::default()
    };
    let query =
        parser::parse_select("SELECT s.sale_id /* Sale ID */, s.amount /* Amount */ FROM sales s")
            .unwrap();
    let formatted = format::format(&query, &options).formatted_sql;
    assert_eq!(
        formatted,
        "select\n    \"s\".\"sale_id\", -- Sale ID\n    \"s\".\"amount\" -- Amount\nfrom \"sales\" as \"s\""
    );
}

#[test]
fn test_smart_style_escapes_comment_terminator() {
    let options = FormatOptions {
        comment_style: CommentStyle::Smart,
        ..Default::default()
    };
    let query = parser::parse_select("select id -- evil */ text\nfrom t").unwrap();
    let formatted = format::format(&query, &options).formatted_sql;
    assert!(formatted.contains("evil *\\/ text"));
}

// --- pagination ---------------------------------------------------------

#[test]
fn test_pagination_injection() {
    let query = parser::parse_select("SELECT id, name FROM users WHERE active = true").unwrap();
    let paged = PaginationInjector::inject(query, 2, 10).unwrap();
    let result = format::format_default(&paged);
    assert_snapshot!(
        result.formatted_sql,
        @r#"select "id", "name" from "users" where "active" = true limit :paging_limit offset :paging_offset"#
    );
    assert_eq!(result.params.get("paging_limit"), Some(&ParamValue::Int(10)));
    assert_eq!(result.params.get("paging_offset"), Some(&ParamValue::Int(10)));
}

#[test]
fn test_pagination_offset_present_on_first_page() {
    let query = parser::parse_select("select id from users").unwrap();
    let paged = PaginationInjector::inject(query, 1, 25).unwrap();
    let result = format::format_default(&paged);
    assert!(result.formatted_sql.contains("offset :paging_offset"));
    assert_eq!(result.params.get("paging_offset"), Some(&ParamValue::Int(0)));
}

#[test]
fn test_pagination_bounds() {
    let parse = || parser::parse_select("select id from users").unwrap();
    assert!(PaginationInjector::inject(parse(), 0, 10).is_err());
    assert!(PaginationInjector::inject(parse(), 1, 0).is_err());
    assert!(PaginationInjector::inject(parse(), 1, 1001).is_err());
    assert!(PaginationInjector::inject(parse(), 1, 1000).is_ok());
}

#[test]
fn test_pagination_rejects_existing_limit() {
    let query = parser::parse_select("select id from users limit 5").unwrap();
    let err = PaginationInjector::inject(query, 1, 10).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query already contains LIMIT or OFFSET clause"
    );
}

#[test]
fn test_remove_pagination_discards_clause_comments() {
    let query =
        parser::parse_select("select id from users limit 10 /* page size */ offset 20").unwrap();
    let stripped = PaginationInjector::remove_pagination(query);
    let formatted = format::format_default(&stripped).formatted_sql;
    assert_snapshot!(formatted, @r#"select "id" from "users""#);
}

// --- param injection ----------------------------------------------------

#[test]
fn test_param_injection_simple_value() {
    let query = parser::parse_select("select id, name from users where active = true").unwrap();
    let mut state = FilterState::new();
    state.insert("name".into(), FilterValue::eq("Alice"));
    let injected = ParamInjector::new().inject(query, &state).unwrap();
    let result = format::format_default(&injected);
    assert_snapshot!(
        result.formatted_sql,
        @r#"select "id", "name" from "users" where "active" = true and "name" = :name"#
    );
    assert_eq!(
        result.params.get("name"),
        Some(&ParamValue::String("Alice".into()))
    );
}

#[test]
fn test_param_injection_range_condition() {
    let query = parser::parse_select("select id, price from sales").unwrap();
    let mut state = FilterState::new();
    state.insert(
        "price".into(),
        Some(FilterValue::Condition(FilterCondition {
            min: Some(ParamValue::Int(10)),
            max: Some(ParamValue::Int(100)),
            ..Default::default()
        })),
    );
    let injected = ParamInjector::new().inject(query, &state).unwrap();
    let result = format::format_default(&injected);
    assert_snapshot!(
        result.formatted_sql,
        @r#"select "id", "price" from "sales" where "price" >= :price_min and "price" <= :price_max"#
    );
}

#[test]
fn test_param_injection_or_group() {
    let query = parser::parse_select("select id, status from orders").unwrap();
    let mut state = FilterState::new();
    state.insert(
        "status".into(),
        Some(FilterValue::Or(vec![
            FilterCondition {
                eq: Some(ParamValue::String("open".into())),
                ..Default::default()
            },
            FilterCondition {
                eq: Some(ParamValue::String("held".into())),
                ..Default::default()
            },
        ])),
    );
    let injected = ParamInjector::new().inject(query, &state).unwrap();
    let result = format::format_default(&injected);
    assert_snapshot!(
        result.formatted_sql,
        @r#"select "id", "status" from "orders" where ("status" = :status_or_0_eq or "status" = :status_or_1_eq)"#
    );
}

#[test]
fn test_param_injection_undefined_entries_are_skipped() {
    let query = parser::parse_select("select id, name from users").unwrap();
    let mut state = FilterState::new();
    state.insert("id".into(), None);
    state.insert("name".into(), FilterValue::eq("Bob"));
    let injected = ParamInjector::new().inject(query, &state).unwrap();
    let formatted = format::format_default(&injected).formatted_sql;
    assert_snapshot!(formatted, @r#"select "id", "name" from "users" where "name" = :name"#);
}

#[test]
fn test_param_injection_all_undefined() {
    let mut state = FilterState::new();
    state.insert("id".into(), None);

    let query = parser::parse_select("select id from users").unwrap();
    let err = ParamInjector::new().inject(query, &state).unwrap_err();
    assert_eq!(err.to_string(), "All parameters are undefined");

    let query = parser::parse_select("select id from users").unwrap();
    let unchanged = ParamInjector::new()
        .allow_all_undefined(true)
        .inject(query, &state)
        .unwrap();
    assert_snapshot!(
        format::format_default(&unchanged).formatted_sql,
        @r#"select "id" from "users""#
    );
}

#[test]
fn test_param_injection_rejects_alias_qualified_keys() {
    let query = parser::parse_select("select u.id from users u").unwrap();
    let mut state = FilterState::new();
    state.insert("u.id".into(), FilterValue::eq(1i64));
    let err = ParamInjector::new().inject(query, &state).unwrap_err();
    assert!(err.to_string().contains("real table names"));
}

#[test]
fn test_param_injection_qualified_key_uses_declared_binding() {
    let query = parser::parse_select("select u.id from users u").unwrap();
    let mut state = FilterState::new();
    state.insert("users.id".into(), FilterValue::eq(1i64));
    let injected = ParamInjector::new().inject(query, &state).unwrap();
    assert_snapshot!(
        format::format_default(&injected).formatted_sql,
        @r#"select "u"."id" from "users" as "u" where "u"."id" = :id"#
    );
}

#[test]
fn test_param_injection_unknown_column() {
    let query = parser::parse_select("select id from users").unwrap();
    let mut state = FilterState::new();
    state.insert("ghost".into(), FilterValue::eq(1i64));
    let err = ParamInjector::new().inject(query, &state).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_param_injection_resolver_supplies_missing_columns() {
    let resolver = |table: &str| -> Option<Vec<String>> {
        (table == "users").then(|| vec!["id".into(), "email".into()])
    };
    let query = parser::parse_select("select id from users").unwrap();
    let mut state = FilterState::new();
    state.insert("email".into(), FilterValue::eq("a@b"));
    let injected = ParamInjector::new()
        .with_resolver(&resolver)
        .inject(query, &state)
        .unwrap();
    assert_snapshot!(
        format::format_default(&injected).formatted_sql,
        @r#"select "id" from "users" where "users"."email" = :email"#
    );
}

// --- sort injection -----------------------------------------------------

#[test]
fn test_sort_injection_appends() {
    let query = parser::parse_select("select id, name from users order by id").unwrap();
    let mut sort = SortState::new();
    sort.insert(
        "name".into(),
        SortSpec {
            desc: true,
            nulls_last: true,
            ..Default::default()
        },
    );
    let injected = SortInjector::new().inject(query, &sort).unwrap();
    assert_snapshot!(
        format::format_default(&injected).formatted_sql,
        @r#"select "id", "name" from "users" order by "id", "name" desc nulls last"#
    );
}

#[test]
fn test_sort_injection_conflicts() {
    let parse = || parser::parse_select("select id from users").unwrap();
    let inject = |spec: SortSpec| {
        let mut sort = SortState::new();
        sort.insert("id".into(), spec);
        SortInjector::new().inject(parse(), &sort)
    };
    assert!(inject(SortSpec {
        asc: true,
        desc: true,
        ..Default::default()
    })
    .is_err());
    assert!(inject(SortSpec {
        nulls_first: true,
        nulls_last: true,
        asc: true,
        ..Default::default()
    })
    .is_err());
    assert!(inject(SortSpec::default()).is_err());
}

#[test]
fn test_sort_injection_unknown_column() {
    let query = parser::parse_select("select id from users").unwrap();
    let mut sort = SortState::new();
    sort.insert("ghost".into(), SortSpec::asc());
    assert!(SortInjector::new().inject(query, &sort).is_err());
}

#[test]
fn test_remove_order_by() {
    let query = parser::parse_select("select id from users order by id desc").unwrap();
    let stripped = SortInjector::remove_order_by(query);
    assert_snapshot!(
        format::format_default(&stripped).formatted_sql,
        @r#"select "id" from "users""#
    );
}

// --- dynamic query builder ----------------------------------------------

#[test]
fn test_dynamic_filter_sort_paging() {
    let query = parser::parse_select("SELECT id, name FROM users WHERE active = true").unwrap();
    let mut filter = FilterState::new();
    filter.insert("name".into(), FilterValue::eq("Alice"));
    let mut sort = SortState::new();
    sort.insert("name".into(), SortSpec::desc());
    let options = DynamicQueryOptions {
        filter: Some(filter),
        sort: Some(sort),
        paging: Some(Paging {
            page: 1,
            page_size: 5,
        }),
        serialize: None,
    };
    let built = DynamicQueryBuilder::new().build(query, &options).unwrap();
    let result = format::format_default(&built);
    assert_snapshot!(
        result.formatted_sql,
        @r#"select "id", "name" from "users" where "active" = true and "name" = :name order by "name" desc limit :paging_limit offset :paging_offset"#
    );
    assert_eq!(
        result.params.get("name"),
        Some(&ParamValue::String("Alice".into()))
    );
    assert_eq!(result.params.get("paging_limit"), Some(&ParamValue::Int(5)));
    assert_eq!(result.params.get("paging_offset"), Some(&ParamValue::Int(0)));
}

#[test]
fn test_dynamic_builder_binds_existing_parameters() {
    let query =
        parser::parse_select("select ym, total from monthly where ym = :ym").unwrap();
    let mut filter = FilterState::new();
    filter.insert("ym".into(), FilterValue::eq("2024-01"));
    let options = DynamicQueryOptions {
        filter: Some(filter),
        ..Default::default()
    };
    let built = DynamicQueryBuilder::new().build(query, &options).unwrap();
    let result = format::format_default(&built);
    // no second predicate was added
    assert_snapshot!(
        result.formatted_sql,
        @r#"select "ym", "total" from "monthly" where "ym" = :ym"#
    );
    assert_eq!(
        result.params.get("ym"),
        Some(&ParamValue::String("2024-01".into()))
    );
}

#[test]
fn test_dynamic_builder_json_wrap() {
    let query = parser::parse_select("select id from users").unwrap();
    let options = DynamicQueryOptions {
        serialize: Some(JsonSerialize {
            root: "users".into(),
        }),
        ..Default::default()
    };
    let built = DynamicQueryBuilder::new().build(query, &options).unwrap();
    assert_snapshot!(
        format::format_default(&built).formatted_sql,
        @r#"select jsonb_agg("t") as "users" from (select "id" from "users") as "t""#
    );
}

// --- join/aggregation decomposition -------------------------------------

#[test]
fn test_join_aggregation_decomposition() {
    let query = parser::parse_select(
        "SELECT c.category_name, COUNT(p.id) AS product_count \
         FROM categories c JOIN products p ON c.id = p.category_id \
         GROUP BY c.category_name",
    )
    .unwrap();
    let decomposed = JoinAggregationDecomposer::new().decompose(query).unwrap();
    let options = FormatOptions {
        identifier_escape: IdentifierEscape::None,
        ..Default::default()
    };
    let formatted = format::format(&decomposed, &options).formatted_sql;
    assert!(formatted.contains("with detail_data as"), "{formatted}");
    assert!(
        formatted.contains("select category_name, count(id) as product_count"),
        "{formatted}"
    );
    assert!(
        formatted.contains("from detail_data group by category_name"),
        "{formatted}"
    );
}

#[test]
fn test_decomposer_rejections() {
    let no_join = parser::parse_select("select count(*) from t").unwrap();
    let err = JoinAggregationDecomposer::new().analyze(&no_join).unwrap_err();
    assert_eq!(err.to_string(), "Query does not contain JOINs");

    let no_agg = parser::parse_select("select a from t join u on t.id = u.id").unwrap();
    let err = JoinAggregationDecomposer::new().analyze(&no_agg).unwrap_err();
    assert_eq!(err.to_string(), "Query does not contain aggregation");

    let window = parser::parse_select(
        "select sum(a) over (partition by b), count(*) from t join u on t.id = u.id group by b",
    )
    .unwrap();
    let err = JoinAggregationDecomposer::new().analyze(&window).unwrap_err();
    assert_eq!(err.to_string(), "Window functions are not fully supported");
}

#[test]
fn test_decomposer_custom_cte_name() {
    let query =
        parser::parse_select("select count(*) as n from a join b on a.id = b.a_id group by a.id")
            .unwrap();
    let decomposed = JoinAggregationDecomposer::new()
        .with_cte_name("raw_rows")
        .decompose(query)
        .unwrap();
    let formatted = format::format_default(&decomposed).formatted_sql;
    assert!(formatted.contains("with \"raw_rows\" as"), "{formatted}");
}

// --- CTE dependency analysis --------------------------------------------

#[test]
fn test_cte_dependency_graph() {
    let query = parser::parse_select(
        "with a as (select 1 as x), b as (select x from a), c as (select 2 as y) \
         select * from b, c",
    )
    .unwrap();
    let graph = CteDependencyAnalyzer::analyze(&query);

    assert_eq!(graph.cte_names(), vec!["a", "b", "c"]);
    assert_eq!(graph.dependencies_of("b").to_vec(), vec!["a".to_string()]);
    assert_eq!(
        graph.dependencies_of(MAIN_QUERY).to_vec(),
        vec!["b".to_string(), "c".to_string()]
    );
    assert_eq!(graph.independent_ctes(), vec!["a", "c"]);
    assert_eq!(graph.dependents_of("a"), vec!["b"]);
    assert_eq!(
        graph.topological_order().unwrap(),
        vec!["a", "b", "c", MAIN_QUERY]
    );
}

#[test]
fn test_recursive_cte_does_not_cycle() {
    let query = parser::parse_select(
        "with recursive t(n) as (select 1 union all select n + 1 from t where n < 5) \
         select n from t",
    )
    .unwrap();
    let graph = CteDependencyAnalyzer::analyze(&query);
    assert_eq!(graph.topological_order().unwrap(), vec!["t", MAIN_QUERY]);
}

#[test]
fn test_cte_column_tracing() {
    let query = parser::parse_select(
        "with a as (select 1 as x, 2 as y), b as (select x from a) select x from b",
    )
    .unwrap();
    let trace = CteColumnTracer::trace(&query, "y");
    assert_eq!(trace.appears_in, vec!["a"]);
    assert_eq!(trace.dropped_in, vec!["b"]);
}

// --- renamers -----------------------------------------------------------

#[test]
fn test_cte_rename_preserves_layout() {
    let sql = "with sales_data as (select * from sales) select * from sales_data";
    let renamed =
        SmartRenamer::rename(sql, 1, 6, "sales_cte", &RenameOptions::default()).unwrap();
    assert_eq!(
        renamed,
        "with sales_cte as (select * from sales) select * from sales_cte"
    );
}

#[test]
fn test_alias_rename_at_reference_position() {
    let sql = "select u.id from users u where u.active = true";
    // cursor on the `u` in `u.id`
    let renamed = SmartRenamer::rename(sql, 1, 8, "usr", &RenameOptions::default()).unwrap();
    assert_eq!(renamed, "select usr.id from users usr where usr.active = true");
}

#[test]
fn test_alias_rename_respects_shadowing() {
    let sql = "select u.id from users u where u.id in (select u.id from admins u)";
    let renamed = SmartRenamer::rename(sql, 1, 8, "outer_u", &RenameOptions::default()).unwrap();
    assert_eq!(
        renamed,
        "select outer_u.id from users outer_u where outer_u.id in (select u.id from admins u)"
    );
}

#[test]
fn test_rename_conflicts() {
    let sql = "with d as (select * from sales) select * from d";
    let rename = |new_name: &str| SmartRenamer::rename(sql, 1, 6, new_name, &Default::default());

    assert!(rename("select")
        .unwrap_err()
        .to_string()
        .contains("reserved keyword"));
    assert!(rename("sales")
        .unwrap_err()
        .to_string()
        .contains("conflicts with a table name"));
    assert!(rename("not an ident")
        .unwrap_err()
        .to_string()
        .contains("not a valid identifier"));
}

#[test]
fn test_rename_position_errors() {
    assert_eq!(
        SmartRenamer::rename("   ", 1, 1, "x", &Default::default())
            .unwrap_err()
            .to_string(),
        "Empty SQL"
    );
    assert_eq!(
        SmartRenamer::rename("select 1", 9, 1, "x", &Default::default())
            .unwrap_err()
            .to_string(),
        "Invalid position"
    );
    // cursor on a literal
    assert!(SmartRenamer::rename("select 1", 1, 8, "x", &Default::default())
        .unwrap_err()
        .to_string()
        .contains("not an identifier"));
}

#[test]
fn test_rename_keeps_quote_style() {
    let sql = "with \"Sales Data\" as (select 1) select * from \"Sales Data\"";
    let renamed =
        CteRenamer::rename(sql, "Sales Data", "sales", &RenameOptions::default()).unwrap();
    assert_eq!(renamed, "with \"sales\" as (select 1) select * from \"sales\"");
}

#[test]
fn test_rename_via_formatting_path() {
    let sql = "with d as (select 1 as n) select n from d";
    let options = RenameOptions {
        preserve_formatting: false,
        ..Default::default()
    };
    let renamed = CteRenamer::rename(sql, "d", "data", &options).unwrap();
    assert_eq!(
        renamed,
        "with \"data\" as (select 1 as \"n\") select \"n\" from \"data\""
    );
}

// --- insert conversions -------------------------------------------------

#[test]
fn test_insert_values_to_select_union() {
    let insert = parser::parse_insert(
        "INSERT INTO sale (sale_date, price, created_at) VALUES \
         ('2023-01-01', 160, '2024-01-11 14:29:01.618'), \
         ('2023-03-12', 200, '2024-01-11 14:29:01.618')",
    )
    .unwrap();
    let converted = InsertSelectValuesConverter::to_select_union(insert).unwrap();
    let formatted = format::format_statement(
        &Statement::Insert(converted.clone()),
        &FormatOptions::default(),
    )
    .formatted_sql;
    assert_eq!(
        formatted,
        "insert into \"sale\"(\"sale_date\", \"price\", \"created_at\") \
         select '2023-01-01' as \"sale_date\", 160 as \"price\", '2024-01-11 14:29:01.618' as \"created_at\" \
         union all select '2023-03-12' as \"sale_date\", 200 as \"price\", '2024-01-11 14:29:01.618' as \"created_at\""
    );

    // and back again
    let back = InsertSelectValuesConverter::to_values(converted).unwrap();
    let formatted = format::format_statement(&Statement::Insert(back), &FormatOptions::default())
        .formatted_sql;
    assert_eq!(
        formatted,
        "insert into \"sale\"(\"sale_date\", \"price\", \"created_at\") \
         values ('2023-01-01', 160, '2024-01-11 14:29:01.618'), ('2023-03-12', 200, '2024-01-11 14:29:01.618')"
    );
}

#[test]
fn test_to_select_union_requires_columns_and_arity() {
    let no_columns = parser::parse_insert("insert into t values (1)").unwrap();
    assert!(InsertSelectValuesConverter::to_select_union(no_columns)
        .unwrap_err()
        .to_string()
        .contains("explicit column list"));

    let mismatch = parser::parse_insert("insert into t (a, b) values (1)").unwrap();
    assert_eq!(
        InsertSelectValuesConverter::to_select_union(mismatch)
            .unwrap_err()
            .to_string(),
        "Tuple value count does not match column count"
    );
}

#[test]
fn test_to_values_rejections() {
    let with_from =
        parser::parse_insert("insert into t (a) select x as a from u").unwrap();
    assert_eq!(
        InsertSelectValuesConverter::to_values(with_from)
            .unwrap_err()
            .to_string(),
        "SELECT queries with FROM or WHERE clauses cannot be converted to VALUES"
    );

    let unaliased = parser::parse_insert("insert into t (a) select 1").unwrap();
    assert_eq!(
        InsertSelectValuesConverter::to_values(unaliased)
            .unwrap_err()
            .to_string(),
        "Each SELECT item must have an alias matching target columns"
    );
}

#[test]
fn test_insert_result_select_with_defaults_and_serials() {
    let table = parser::parse_create_table(
        "create table sale (\
         id serial primary key, \
         sale_date date not null, \
         price int not null, \
         created_at timestamp default now())",
    )
    .unwrap();
    let insert =
        parser::parse_insert("insert into sale (sale_date, price) values ('2023-01-01', 160)")
            .unwrap();
    let converter = InsertResultSelectConverter::new(vec![table]);
    let query = converter.to_select_query(&insert).unwrap();
    assert_eq!(
        format::format_default(&query).formatted_sql,
        "with \"__inserted_rows\" as (\
         select row_number() over () as \"id\", \
         cast('2023-01-01' as date) as \"sale_date\", \
         cast(160 as int) as \"price\", \
         now() as \"created_at\") \
         select count(*) as \"count\" from \"__inserted_rows\""
    );
}

#[test]
fn test_insert_result_select_maps_returning() {
    let table =
        parser::parse_create_table("create table t (id serial, v int not null)").unwrap();
    let insert = parser::parse_insert("insert into t (v) values (1) returning v").unwrap();
    let query = InsertResultSelectConverter::new(vec![table])
        .to_select_query(&insert)
        .unwrap();
    let formatted = format::format_default(&query).formatted_sql;
    assert!(formatted.ends_with("select \"v\" from \"__inserted_rows\""), "{formatted}");
}

#[test]
fn test_insert_result_select_requires_not_null_columns() {
    let table = parser::parse_create_table("create table t (a int not null, b int)").unwrap();
    let insert = parser::parse_insert("insert into t (b) values (1)").unwrap();
    let err = InsertResultSelectConverter::new(vec![table])
        .to_select_query(&insert)
        .unwrap_err();
    assert_eq!(err.to_string(), "Required column 'a' is missing from INSERT");
}

#[test]
fn test_insert_result_select_fixture_coverage() {
    let table = parser::parse_create_table("create table t (a int)").unwrap();
    let insert =
        parser::parse_insert("insert into t (a) select a from legacy_sale").unwrap();

    let strict = InsertResultSelectConverter::new(vec![table.clone()]);
    assert_eq!(
        strict.to_select_query(&insert).unwrap_err().to_string(),
        "fixture coverage: legacy_sale"
    );

    let passthrough = InsertResultSelectConverter::new(vec![table])
        .with_strategy(FixtureStrategy::Passthrough);
    assert!(passthrough.to_select_query(&insert).is_ok());
}

#[test]
fn test_insert_result_select_prepends_fixture_ctes() {
    let table = parser::parse_create_table("create table t (a int)").unwrap();
    let insert = parser::parse_insert("insert into t (a) select a from src_rows").unwrap();
    let fixture = FixtureTable {
        name: "src_rows".into(),
        columns: vec![FixtureColumn {
            name: "a".into(),
            ty: "int".into(),
            default: None,
        }],
        rows: vec![vec![ParamValue::Int(7)]],
    };
    let query = InsertResultSelectConverter::new(vec![table])
        .with_fixtures(vec![fixture])
        .to_select_query(&insert)
        .unwrap();
    let formatted = format::format_default(&query).formatted_sql;
    assert!(
        formatted.starts_with("with \"src_rows\" as (select cast(7 as int) as \"a\")"),
        "{formatted}"
    );
}

// --- DDL diff -----------------------------------------------------------

#[test]
fn test_ddl_diff_adds_column() {
    let diff = DdlDiffGenerator::default()
        .diff_sql(
            "CREATE TABLE users (id INT)",
            "CREATE TABLE users (id INT, name TEXT)",
        )
        .unwrap();
    assert_eq!(diff, vec!["ALTER TABLE \"users\" ADD COLUMN \"name\" TEXT"]);
}

#[test]
fn test_ddl_diff_creates_missing_table() {
    let diff = DdlDiffGenerator::default()
        .diff_sql("", "CREATE TABLE t (id INT)")
        .unwrap();
    assert_eq!(diff.len(), 1);
    assert!(diff[0].starts_with("CREATE TABLE \"t\""), "{}", diff[0]);
}

#[test]
fn test_ddl_diff_drop_column_is_opt_in() {
    let current = "CREATE TABLE t (id INT, legacy INT)";
    let expected = "CREATE TABLE t (id INT)";

    let silent = DdlDiffGenerator::default().diff_sql(current, expected).unwrap();
    assert!(silent.is_empty());

    let dropping = DdlDiffGenerator::new(DdlDiffOptions {
        drop_columns: true,
        ..Default::default()
    })
    .diff_sql(current, expected)
    .unwrap();
    assert_eq!(dropping, vec!["ALTER TABLE \"t\" DROP COLUMN \"legacy\""]);
}

#[test]
fn test_ddl_diff_constraints_and_indexes() {
    let current = "CREATE TABLE t (id INT); CREATE INDEX ix_t_id ON t (id)";
    let expected = "CREATE TABLE t (id INT, CONSTRAINT uq_id UNIQUE (id)); \
                    CREATE INDEX ix_t_id ON t (id); \
                    CREATE UNIQUE INDEX ux_t_id ON t (id)";
    let diff = DdlDiffGenerator::default().diff_sql(current, expected).unwrap();
    assert_eq!(
        diff,
        vec![
            "ALTER TABLE \"t\" ADD CONSTRAINT \"uq_id\" UNIQUE (\"id\")",
            "CREATE UNIQUE INDEX \"ux_t_id\" ON \"t\" (\"id\")",
        ]
    );
}

#[test]
fn test_ddl_diff_primary_keys_ignore_names() {
    // same PK shape under different constraint names is not a change,
    // even in name-sensitive mode
    let current = "CREATE TABLE t (id INT, CONSTRAINT pk_old PRIMARY KEY (id))";
    let expected = "CREATE TABLE t (id INT, CONSTRAINT pk_new PRIMARY KEY (id))";
    let diff = DdlDiffGenerator::new(DdlDiffOptions {
        check_constraint_names: true,
        ..Default::default()
    })
    .diff_sql(current, expected)
    .unwrap();
    assert!(diff.is_empty(), "{diff:?}");
}

// --- json serialization -------------------------------------------------

#[test]
fn test_query_json_round_trip() {
    let query = parser::parse_select("select id from users where active = true").unwrap();
    let json = crate::json_of_query(&query).unwrap();
    let back = crate::query_of_json(&json).unwrap();
    assert_eq!(query, back);
}

// --- round trips over the construct inventory ---------------------------

#[test]
fn test_round_trip_inventory() {
    let cases = [
        "select * from t",
        "select a.* from t as a",
        "select distinct on (a) a, b from t",
        "select x from (values (1, 'a'), (2, 'b')) as v(x, y)",
        "select value from generate_series(1, 3) as n(value)",
        "select * from a left join b using (id) cross join c",
        "select * from (a join b on a.id = b.id) join c on c.id = a.id",
        "select count(distinct x), string_agg(y order by z) from t",
        "select rank() over (partition by a order by b rows between 1 preceding and current row) from t",
        "select case x when 1 then 'one' else 'many' end from t",
        "select * from t where exists (select 1 from u where u.id = t.id)",
        "select * from t where a not in (1, 2) and b not between 1 and 5",
        "select array[1, 2, 3], (a, b), E'esc\\'aped' from t",
        "select * from t group by grouping sets ((a, b), (a), ())",
        "select * from t order by a desc nulls first, b asc fetch first 5 rows only",
        "select * from t for update",
        "with recursive r(n) as (select 1 union all select n + 1 from r) select * from r",
        "insert into t (a, b) values (1, 2) on conflict (a) do update set b = 3 where t.a > 0 returning a",
        "update t set a = 1, b = b + 1 from u where t.id = u.id returning t.a",
    ];
    for sql in cases {
        let statement = parser::parse_statement(sql)
            .unwrap_or_else(|e| panic!("failed to parse `{sql}`: {e}"));
        let once =
            format::format_statement(&statement, &FormatOptions::default()).formatted_sql;
        let reparsed = parser::parse_statement(&once)
            .unwrap_or_else(|e| panic!("failed to reparse `{once}`: {e}"));
        let twice =
            format::format_statement(&reparsed, &FormatOptions::default()).formatted_sql;
        assert_eq!(once, twice, "`{sql}` did not stabilize");
    }
}
