// SPDX-License-Identifier: Apache-2.0

//! Table → CSV text.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::runner::SqlRunner;
use crate::engine::sql::qualified;
use crate::engine::types::Value;

/// Renders a whole table as CSV: a header row of column names, then one
/// line per record. Fails NotFound when the table is missing or empty
/// (an empty result carries no column names to build a header from).
pub async fn table_to_csv(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<String> {
    let sql = format!("SELECT * FROM {}", qualified(database, table));
    let result = runner.run(&sql, vec![]).await.map_err(|e| {
        if e.is_unknown_object() {
            EngineError::not_found(format!(
                "table {} does not exist",
                qualified(database, table)
            ))
        } else {
            e
        }
    })?;

    if result.rows.is_empty() {
        return Err(EngineError::not_found("no data to export"));
    }

    let mut lines = Vec::with_capacity(result.rows.len() + 1);
    lines.push(
        result
            .columns
            .iter()
            .map(|name| escape_csv(name))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in &result.rows {
        lines.push(
            row.values
                .iter()
                .map(|value| escape_csv(&format_value(value)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    Ok(lines.join("\n"))
}

/// Quotes a field only when it needs it: fields containing a comma,
/// a double quote, CR or LF are wrapped in double quotes with internal
/// quotes doubled.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => STANDARD.encode(b),
        Value::Json(j) => j.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::ER_NO_SUCH_TABLE;
    use crate::engine::runner::testing::{result_with, ScriptedRunner};

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_escape_csv_quotes_only_when_needed() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
    }

    #[tokio::test]
    async fn test_table_to_csv_renders_header_and_rows() {
        let runner = ScriptedRunner::new().with_result(result_with(
            &["id", "name", "notes"],
            vec![
                vec![Value::Int(1), text("a,b"), Value::Null],
                vec![Value::Int(2), text("plain"), Value::Bytes(vec![0xde, 0xad])],
            ],
        ));

        let csv = table_to_csv(&runner, "shop", "users").await.unwrap();

        assert_eq!(csv, "id,name,notes\n1,\"a,b\",\n2,plain,3q0=");
        assert_eq!(runner.issued_sql(), vec!["SELECT * FROM `shop`.`users`"]);
    }

    #[tokio::test]
    async fn test_empty_table_is_not_found() {
        let runner =
            ScriptedRunner::new().with_result(result_with(&["id"], vec![]));

        let err = table_to_csv(&runner, "shop", "empty").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let runner = ScriptedRunner::new().with_response(Err(EngineError::Driver {
            code: Some(ER_NO_SUCH_TABLE),
            message: "Table 'shop.ghost' doesn't exist".to_string(),
        }));

        let err = table_to_csv(&runner, "shop", "ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
