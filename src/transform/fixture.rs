//! Fixture tables: typed in-memory row sets materialized as CTEs that
//! stand in for real tables.

use once_cell::sync::Lazy;
use regex::Regex;

use anyhow::Result;

use crate::ast::*;
use crate::error::Error;

static INTEGER_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("valid pattern"));

#[derive(Debug, Clone)]
pub struct FixtureColumn {
    pub name: String,
    pub ty: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FixtureTable {
    pub name: String,
    pub columns: Vec<FixtureColumn>,
    pub rows: Vec<Vec<ParamValue>>,
}

impl FixtureTable {
    /// Ingest one table definition of the JSON shape
    /// `{ columns: [{ name, type, default? }], rows: [{ col: val }] }`.
    /// Missing fields and JSON nulls become SQL NULL; integer digits are
    /// preserved exactly.
    pub fn from_json(name: &str, value: &serde_json::Value) -> Result<Self> {
        let columns = value
            .get("columns")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                Error::transform(format!("Fixture `{name}` is missing a `columns` array"))
            })?
            .iter()
            .map(|column| {
                let column_name = column
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| {
                        Error::transform(format!("Fixture `{name}` has a column without a name"))
                    })?;
                let ty = column
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("text");
                Ok(FixtureColumn {
                    name: column_name.to_string(),
                    ty: ty.to_string(),
                    default: column
                        .get("default")
                        .and_then(|d| d.as_str())
                        .map(|d| d.to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        if let Some(raw_rows) = value.get("rows").and_then(|r| r.as_array()) {
            for raw in raw_rows {
                let row = columns
                    .iter()
                    .map(|column| {
                        raw.get(&column.name)
                            .map(json_to_param)
                            .transpose()
                            .map(|v| v.unwrap_or(ParamValue::Null))
                    })
                    .collect::<Result<Vec<_>>>()?;
                rows.push(row);
            }
        }

        Ok(FixtureTable {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    pub fn to_common_table(&self) -> Result<CommonTable> {
        Ok(CommonTable::new(
            self.name.clone(),
            FixtureCteBuilder::rows_query(self)?,
        ))
    }
}

fn json_to_param(value: &serde_json::Value) -> Result<ParamValue> {
    Ok(match value {
        serde_json::Value::Null => ParamValue::Null,
        serde_json::Value::Bool(b) => ParamValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ParamValue::Int(i)
            } else {
                // integers past i64 keep their exact digits; only true
                // decimals may become floats
                let digits = n.to_string();
                if INTEGER_SHAPE.is_match(&digits) {
                    ParamValue::BigInt(digits)
                } else if let Some(f) = n.as_f64() {
                    ParamValue::Float(f)
                } else {
                    return Err(Error::transform(format!(
                        "Unsupported numeric fixture value `{n}`"
                    ))
                    .into());
                }
            }
        }
        serde_json::Value::String(s) => ParamValue::String(s.clone()),
        other => {
            return Err(Error::transform(format!(
                "Unsupported fixture value `{other}`; only scalars are allowed"
            ))
            .into())
        }
    })
}

pub struct FixtureCteBuilder;

impl FixtureCteBuilder {
    /// Ingest the full JSON shape `{ <table>: { columns, rows }, … }`.
    pub fn from_json(value: &serde_json::Value) -> Result<Vec<FixtureTable>> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::transform("Fixture JSON must be an object of tables"))?;
        map.iter()
            .map(|(name, table)| FixtureTable::from_json(name, table))
            .collect()
    }

    /// One CTE declaration per fixture table.
    pub fn build(fixtures: &[FixtureTable]) -> Result<Vec<CommonTable>> {
        fixtures.iter().map(|f| f.to_common_table()).collect()
    }

    /// The row-set query backing one fixture:
    /// `SELECT cast(v AS t) AS col, … UNION ALL SELECT …`, or the
    /// single-row `SELECT null AS col, … WHERE 1=0` guard when there are
    /// no rows.
    pub fn rows_query(fixture: &FixtureTable) -> Result<Query> {
        if fixture.rows.is_empty() {
            let select = SelectQuery {
                select: SelectClause {
                    distinct: None,
                    items: fixture
                        .columns
                        .iter()
                        .map(|column| {
                            SelectItem::aliased(
                                Expr::literal(Literal::null()),
                                column.name.clone(),
                            )
                        })
                        .collect(),
                    comments: Vec::new(),
                },
                where_clause: Some(WhereClause {
                    condition: Expr::binary(
                        Expr::literal(Literal::number("1")),
                        BinaryOp::Eq,
                        Expr::literal(Literal::number("0")),
                    ),
                    comments: Vec::new(),
                }),
                ..Default::default()
            };
            return Ok(Query::Select(Box::new(select)));
        }

        let mut chain: Option<Query> = None;
        for row in &fixture.rows {
            if row.len() != fixture.columns.len() {
                return Err(Error::transform(format!(
                    "Fixture `{}` row has {} values for {} columns",
                    fixture.name,
                    row.len(),
                    fixture.columns.len()
                ))
                .into());
            }
            let items = fixture
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| {
                    Ok(SelectItem::aliased(
                        Expr::new(ExprKind::Cast {
                            expr: Box::new(render_literal(value)?),
                            ty: TypeName::new(column.ty.clone()),
                            operator_form: false,
                        }),
                        column.name.clone(),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            let select = Query::Select(Box::new(SelectQuery::new(SelectClause {
                distinct: None,
                items,
                comments: Vec::new(),
            })));
            chain = Some(match chain {
                None => select,
                Some(left) => Query::Binary(Box::new(BinaryQuery {
                    op: SetOperator::UnionAll,
                    left,
                    right: select,
                    comments: Vec::new(),
                })),
            });
        }
        Ok(chain.expect("at least one row"))
    }
}

/// A typed scalar as a SQL literal expression. Big integers keep their
/// exact digits; bytes render as `X'…'`; booleans stay bare.
pub fn render_literal(value: &ParamValue) -> Result<Expr> {
    Ok(match value {
        ParamValue::Null => Expr::literal(Literal::null()),
        ParamValue::Bool(b) => Expr::literal(Literal::boolean(*b)),
        ParamValue::Int(i) => Expr::literal(Literal::number(i.to_string())),
        ParamValue::BigInt(digits) => {
            if !INTEGER_SHAPE.is_match(digits) {
                return Err(
                    Error::transform(format!("Invalid big integer literal `{digits}`")).into(),
                );
            }
            Expr::literal(Literal::number(digits.clone()))
        }
        ParamValue::Float(f) => Expr::literal(Literal::number(f.to_string())),
        ParamValue::String(s) => Expr::literal(Literal::string(s)),
        ParamValue::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            Expr::literal(Literal {
                text: format!("X'{hex}'"),
                kind: LiteralKind::String,
            })
        }
        ParamValue::DateTime(s) => Expr::literal(Literal::string(s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format;

    fn render(fixture: &FixtureTable) -> String {
        let query = FixtureCteBuilder::rows_query(fixture).unwrap();
        format::format_default(&query).formatted_sql
    }

    #[test]
    fn rows_become_cast_union() {
        let fixture = FixtureTable {
            name: "users".into(),
            columns: vec![
                FixtureColumn {
                    name: "id".into(),
                    ty: "int".into(),
                    default: None,
                },
                FixtureColumn {
                    name: "name".into(),
                    ty: "text".into(),
                    default: None,
                },
            ],
            rows: vec![
                vec![ParamValue::Int(1), ParamValue::String("Alice".into())],
                vec![ParamValue::Int(2), ParamValue::Null],
            ],
        };
        assert_eq!(
            render(&fixture),
            "select cast(1 as int) as \"id\", cast('Alice' as text) as \"name\" \
             union all select cast(2 as int) as \"id\", cast(null as text) as \"name\""
        );
    }

    #[test]
    fn empty_fixture_keeps_guarded_cte() {
        let fixture = FixtureTable {
            name: "users".into(),
            columns: vec![FixtureColumn {
                name: "id".into(),
                ty: "int".into(),
                default: None,
            }],
            rows: vec![],
        };
        assert_eq!(render(&fixture), "select null as \"id\" where 1 = 0");
    }

    #[test]
    fn big_integers_keep_exact_digits() {
        let expr = render_literal(&ParamValue::BigInt("9007199254740993".into())).unwrap();
        let text = format::format_expr_standalone(&expr, &Default::default());
        assert_eq!(text, "9007199254740993");
    }

    #[test]
    fn bytes_render_as_hex_string() {
        let expr = render_literal(&ParamValue::Bytes(vec![0xAB, 0x01])).unwrap();
        let text = format::format_expr_standalone(&expr, &Default::default());
        assert_eq!(text, "X'AB01'");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        let expr = render_literal(&ParamValue::String("it's".into())).unwrap();
        let text = format::format_expr_standalone(&expr, &Default::default());
        assert_eq!(text, "'it''s'");
    }

    #[test]
    fn from_json_preserves_integer_digits() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{ "columns": [{ "name": "id", "type": "bigint" }],
                 "rows": [{ "id": 9007199254740993 }] }"#,
        )
        .unwrap();
        let fixture = FixtureTable::from_json("t", &json).unwrap();
        assert_eq!(fixture.rows[0][0], ParamValue::Int(9007199254740993));
    }

    #[test]
    fn from_json_integers_past_i64_stay_digit_exact() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{ "columns": [{ "name": "id", "type": "numeric" }],
                 "rows": [{ "id": 98765432109876543210987 }] }"#,
        )
        .unwrap();
        let fixture = FixtureTable::from_json("t", &json).unwrap();
        assert_eq!(
            fixture.rows[0][0],
            ParamValue::BigInt("98765432109876543210987".into())
        );
        assert!(render(&fixture).contains("cast(98765432109876543210987 as numeric)"));
    }
}
