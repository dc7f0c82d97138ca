//! Schema Introspector
//!
//! Reads catalog state through INFORMATION_SCHEMA and SHOW statements.
//! Every query either fully qualifies `database`.`table` or filters on
//! `TABLE_SCHEMA = ?`, so no `USE` is ever issued and no session state
//! leaks into the pool. Catalog string columns are CAST to CHAR because
//! MySQL reports them under a BINARY collation otherwise.

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::runner::SqlRunner;
use crate::engine::sql::qualified;
use crate::engine::types::{
    ColumnDescriptor, ColumnMeta, KeyRole, TableIndex, TableStructure, Value,
};

const DESCRIBE_COLUMNS_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
     CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE, \
     CAST(IS_NULLABLE AS CHAR) AS IS_NULLABLE, \
     CAST(COLUMN_KEY AS CHAR) AS COLUMN_KEY, \
     CAST(COLUMN_DEFAULT AS CHAR) AS COLUMN_DEFAULT, \
     CAST(EXTRA AS CHAR) AS EXTRA \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const COLUMN_META_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
     CAST(IS_NULLABLE AS CHAR) AS IS_NULLABLE, \
     CAST(COLUMN_KEY AS CHAR) AS COLUMN_KEY \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME \
     FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
     ORDER BY ORDINAL_POSITION";

const LIST_TABLES_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? \
     ORDER BY TABLE_NAME";

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

const DATABASE_EXISTS_SQL: &str = "SELECT COUNT(*) \
     FROM information_schema.SCHEMATA \
     WHERE SCHEMA_NAME = ?";

pub async fn list_databases(runner: &dyn SqlRunner) -> EngineResult<Vec<String>> {
    // SHOW statements are not reliably preparable, so they run as text.
    let result = runner.run_unprepared("SHOW DATABASES").await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.values.first())
        .map(plain_text)
        .collect())
}

pub async fn list_tables(runner: &dyn SqlRunner, database: &str) -> EngineResult<Vec<String>> {
    let result = runner
        .run(LIST_TABLES_SQL, vec![Value::Text(database.to_string())])
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.values.first())
        .map(plain_text)
        .collect())
}

/// Columns plus index metadata for one table, derived fresh from the
/// server. Fails NotFound when the table does not exist.
pub async fn describe(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<TableStructure> {
    let result = runner
        .run(
            DESCRIBE_COLUMNS_SQL,
            vec![
                Value::Text(database.to_string()),
                Value::Text(table.to_string()),
            ],
        )
        .await?;

    if result.rows.is_empty() {
        return Err(unknown_table(database, table));
    }

    let columns = result
        .rows
        .iter()
        .map(|row| {
            let values = &row.values;
            ColumnDescriptor {
                name: text_at(values, 0),
                data_type: text_at(values, 1),
                nullable: text_at(values, 2) == "YES",
                key: key_role(&text_at(values, 3)),
                default_value: match values.get(4) {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(plain_text(v)),
                },
                extra: text_at(values, 5),
            }
        })
        .collect();

    let indexes = table_indexes(runner, database, table).await?;
    Ok(TableStructure { columns, indexes })
}

/// Name, nullability and key flag per column. Used to validate inserts
/// and to build search predicates over every column.
pub async fn columns_of(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<Vec<ColumnMeta>> {
    let result = runner
        .run(
            COLUMN_META_SQL,
            vec![
                Value::Text(database.to_string()),
                Value::Text(table.to_string()),
            ],
        )
        .await?;

    if result.rows.is_empty() {
        return Err(unknown_table(database, table));
    }

    Ok(result
        .rows
        .iter()
        .map(|row| {
            let values = &row.values;
            ColumnMeta {
                name: text_at(values, 0),
                nullable: text_at(values, 1) == "YES",
                is_primary_key: text_at(values, 2) == "PRI",
            }
        })
        .collect())
}

/// The single primary-key column of a table.
///
/// Tables without a primary key, and tables with a composite key, are
/// rejected with a validation error: record update and delete target rows
/// through exactly one key column.
pub async fn primary_key_of(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<String> {
    let result = runner
        .run(
            PRIMARY_KEY_SQL,
            vec![
                Value::Text(database.to_string()),
                Value::Text(table.to_string()),
            ],
        )
        .await?;

    let mut names: Vec<String> = result
        .rows
        .iter()
        .filter_map(|row| row.values.first())
        .map(plain_text)
        .collect();

    match names.len() {
        0 => Err(EngineError::validation(format!(
            "table {} has no primary key",
            qualified(database, table)
        ))),
        1 => Ok(names.remove(0)),
        _ => Err(EngineError::validation(format!(
            "table {} has a composite primary key, which record operations do not support",
            qualified(database, table)
        ))),
    }
}

pub async fn database_exists(runner: &dyn SqlRunner, database: &str) -> EngineResult<bool> {
    let result = runner
        .run(DATABASE_EXISTS_SQL, vec![Value::Text(database.to_string())])
        .await?;
    Ok(result.single_value().and_then(Value::as_u64).unwrap_or(0) > 0)
}

pub async fn table_exists(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<bool> {
    let result = runner
        .run(
            TABLE_EXISTS_SQL,
            vec![
                Value::Text(database.to_string()),
                Value::Text(table.to_string()),
            ],
        )
        .await?;
    Ok(result.single_value().and_then(Value::as_u64).unwrap_or(0) > 0)
}

/// Verbatim CREATE TABLE statement as the server prints it.
pub async fn show_create_table(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<String> {
    let sql = format!("SHOW CREATE TABLE {}", qualified(database, table));
    let result = runner
        .run_unprepared(&sql)
        .await
        .map_err(|e| translate_unknown(e, database, table))?;

    result
        .rows
        .first()
        .and_then(|row| row.values.get(1))
        .map(plain_text)
        .ok_or_else(|| unknown_table(database, table))
}

/// SHOW INDEX reports one row per column per index. Fields are looked up
/// by header name because the column order varies across server versions.
async fn table_indexes(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
) -> EngineResult<Vec<TableIndex>> {
    let sql = format!("SHOW INDEX FROM {}", qualified(database, table));
    let result = runner
        .run_unprepared(&sql)
        .await
        .map_err(|e| translate_unknown(e, database, table))?;

    let col = |name: &str| result.columns.iter().position(|c| c == name);
    let (Some(key_name), Some(column_name), Some(seq), Some(non_unique)) = (
        col("Key_name"),
        col("Column_name"),
        col("Seq_in_index"),
        col("Non_unique"),
    ) else {
        return Ok(Vec::new());
    };
    let null_col = col("Null");

    Ok(result
        .rows
        .iter()
        .map(|row| {
            let values = &row.values;
            TableIndex {
                name: values.get(key_name).map(plain_text).unwrap_or_default(),
                column: values.get(column_name).map(plain_text).unwrap_or_default(),
                seq_in_index: values.get(seq).and_then(Value::as_u64).unwrap_or(0) as u32,
                unique: values.get(non_unique).and_then(Value::as_u64) == Some(0),
                nullable: null_col
                    .and_then(|i| values.get(i))
                    .map(|v| matches!(v, Value::Text(s) if s == "YES"))
                    .unwrap_or(false),
            }
        })
        .collect())
}

fn key_role(raw: &str) -> KeyRole {
    match raw {
        "PRI" => KeyRole::Primary,
        "UNI" => KeyRole::Unique,
        _ => KeyRole::None,
    }
}

fn unknown_table(database: &str, table: &str) -> EngineError {
    EngineError::not_found(format!(
        "table {} does not exist",
        qualified(database, table)
    ))
}

fn translate_unknown(err: EngineError, database: &str, table: &str) -> EngineError {
    if err.is_unknown_object() {
        unknown_table(database, table)
    } else {
        err
    }
}

fn text_at(values: &[Value], idx: usize) -> String {
    values.get(idx).map(plain_text).unwrap_or_default()
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Json(j) => j.to_string(),
        Value::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::ER_NO_SUCH_TABLE;
    use crate::engine::runner::testing::{result_with, text_column, ScriptedRunner};

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    // --- database and table listing ---

    #[tokio::test]
    async fn test_list_databases() {
        let runner = ScriptedRunner::new().with_result(text_column(
            "Database",
            &["information_schema", "shop"],
        ));

        let names = list_databases(&runner).await.unwrap();
        assert_eq!(names, vec!["information_schema", "shop"]);
        assert_eq!(runner.issued_sql(), vec!["SHOW DATABASES"]);
    }

    #[tokio::test]
    async fn test_list_tables_binds_schema() {
        let runner =
            ScriptedRunner::new().with_result(text_column("TABLE_NAME", &["orders", "users"]));

        let names = list_tables(&runner, "shop").await.unwrap();
        assert_eq!(names, vec!["orders", "users"]);

        let issued = runner.issued();
        assert!(issued[0].sql.contains("information_schema.TABLES"));
        assert_eq!(issued[0].params, vec![text("shop")]);
    }

    // --- describe ---

    #[tokio::test]
    async fn test_describe_maps_columns_and_indexes() {
        let columns = result_with(
            &[
                "COLUMN_NAME",
                "COLUMN_TYPE",
                "IS_NULLABLE",
                "COLUMN_KEY",
                "COLUMN_DEFAULT",
                "EXTRA",
            ],
            vec![
                vec![
                    text("id"),
                    text("int"),
                    text("NO"),
                    text("PRI"),
                    Value::Null,
                    text("auto_increment"),
                ],
                vec![
                    text("name"),
                    text("varchar(255)"),
                    text("YES"),
                    text(""),
                    text("anonymous"),
                    text(""),
                ],
            ],
        );
        let indexes = result_with(
            &[
                "Table",
                "Non_unique",
                "Key_name",
                "Seq_in_index",
                "Column_name",
                "Null",
            ],
            vec![vec![
                text("users"),
                Value::Int(0),
                text("PRIMARY"),
                Value::Int(1),
                text("id"),
                text(""),
            ]],
        );
        let runner = ScriptedRunner::new()
            .with_result(columns)
            .with_result(indexes);

        let structure = describe(&runner, "shop", "users").await.unwrap();

        assert_eq!(structure.columns.len(), 2);
        assert_eq!(structure.columns[0].name, "id");
        assert_eq!(structure.columns[0].key, KeyRole::Primary);
        assert!(!structure.columns[0].nullable);
        assert_eq!(structure.columns[0].default_value, None);
        assert_eq!(structure.columns[0].extra, "auto_increment");
        assert!(structure.columns[1].nullable);
        assert_eq!(
            structure.columns[1].default_value.as_deref(),
            Some("anonymous")
        );

        assert_eq!(structure.indexes.len(), 1);
        assert_eq!(structure.indexes[0].name, "PRIMARY");
        assert_eq!(structure.indexes[0].column, "id");
        assert_eq!(structure.indexes[0].seq_in_index, 1);
        assert!(structure.indexes[0].unique);

        let issued = runner.issued_sql();
        assert!(issued[1].contains("SHOW INDEX FROM `shop`.`users`"));
    }

    #[tokio::test]
    async fn test_describe_unknown_table_is_not_found() {
        let runner = ScriptedRunner::new().with_result(result_with(
            &["COLUMN_NAME", "COLUMN_TYPE"],
            vec![],
        ));

        let err = describe(&runner, "shop", "missing").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    // --- primary key resolution ---

    #[tokio::test]
    async fn test_primary_key_single_column() {
        let runner = ScriptedRunner::new().with_result(text_column("COLUMN_NAME", &["id"]));

        let pk = primary_key_of(&runner, "shop", "users").await.unwrap();
        assert_eq!(pk, "id");
        assert_eq!(
            runner.issued()[0].params,
            vec![text("shop"), text("users")]
        );
    }

    #[tokio::test]
    async fn test_primary_key_missing_is_validation_error() {
        let runner = ScriptedRunner::new().with_result(text_column("COLUMN_NAME", &[]));

        let err = primary_key_of(&runner, "shop", "logs").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
        assert!(err.to_string().contains("no primary key"));
    }

    #[tokio::test]
    async fn test_primary_key_composite_is_rejected() {
        let runner = ScriptedRunner::new()
            .with_result(text_column("COLUMN_NAME", &["order_id", "product_id"]));

        let err = primary_key_of(&runner, "shop", "order_items")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
        assert!(err.to_string().contains("composite"));
    }

    // --- existence and DDL readback ---

    #[tokio::test]
    async fn test_table_exists() {
        let runner = ScriptedRunner::new()
            .with_result(result_with(&["COUNT(*)"], vec![vec![Value::Int(1)]]))
            .with_result(result_with(&["COUNT(*)"], vec![vec![Value::Int(0)]]));

        assert!(table_exists(&runner, "shop", "users").await.unwrap());
        assert!(!table_exists(&runner, "shop", "ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_database_exists_queries_schemata() {
        let runner = ScriptedRunner::new()
            .with_result(result_with(&["COUNT(*)"], vec![vec![Value::Int(0)]]));

        assert!(!database_exists(&runner, "nope").await.unwrap());

        let issued = runner.issued();
        assert!(issued[0].sql.contains("information_schema.SCHEMATA"));
        assert_eq!(issued[0].params, vec![text("nope")]);
    }

    #[tokio::test]
    async fn test_show_create_table_takes_ddl_column() {
        let runner = ScriptedRunner::new().with_result(result_with(
            &["Table", "Create Table"],
            vec![vec![text("users"), text("CREATE TABLE `users` (...)")]],
        ));

        let ddl = show_create_table(&runner, "shop", "users").await.unwrap();
        assert_eq!(ddl, "CREATE TABLE `users` (...)");
        assert_eq!(
            runner.issued_sql(),
            vec!["SHOW CREATE TABLE `shop`.`users`"]
        );
    }

    #[tokio::test]
    async fn test_unknown_table_code_becomes_not_found() {
        let runner = ScriptedRunner::new().with_response(Err(EngineError::Driver {
            code: Some(ER_NO_SUCH_TABLE),
            message: "Table 'shop.ghost' doesn't exist".to_string(),
        }));

        let err = show_create_table(&runner, "shop", "ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_columns_of_maps_flags() {
        let runner = ScriptedRunner::new().with_result(result_with(
            &["COLUMN_NAME", "IS_NULLABLE", "COLUMN_KEY"],
            vec![
                vec![text("id"), text("NO"), text("PRI")],
                vec![text("email"), text("NO"), text("UNI")],
                vec![text("bio"), text("YES"), text("")],
            ],
        ));

        let columns = columns_of(&runner, "shop", "users").await.unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns[0].is_primary_key);
        assert!(!columns[0].nullable);
        assert!(!columns[1].is_primary_key);
        assert!(columns[2].nullable);
    }
}
