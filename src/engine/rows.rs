//! Row Query Builder
//!
//! Turns (database, table, record) tuples into parameterized SQL for the
//! generic CRUD operations. Identifiers go through backtick escaping,
//! values through `?` placeholders; nothing caller-supplied is ever
//! concatenated into statement text raw.

use serde_json::Map;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::introspect;
use crate::engine::runner::SqlRunner;
use crate::engine::sql::{qualified, quote_ident};
use crate::engine::types::{PageRequest, RowPage, TableSpec, Value};

/// Column types the create-table operation accepts. Types are keywords
/// spliced into DDL, not escapable identifiers, so the set is closed.
const ALLOWED_COLUMN_TYPES: &[&str] = &[
    "INTEGER",
    "TEXT",
    "REAL",
    "BLOB",
    "VARCHAR(255)",
    "BOOLEAN",
    "DATE",
    "TIMESTAMP",
    "DECIMAL(10,2)",
    "CHAR(1)",
    "TINYINT",
    "BIGINT",
];

const ALLOWED_CONSTRAINTS: &[&str] = &[
    "PRIMARY KEY",
    "NOT NULL",
    "UNIQUE",
    "DEFAULT NULL",
    "AUTO_INCREMENT",
];

/// One page of rows plus the unfiltered total.
///
/// The total always counts the whole table; the optional search narrows
/// the page, not the count. The search predicate casts every column to
/// CHAR and matches `%term%` case-insensitively under the server's
/// default collation.
pub async fn list_rows(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
    page: &PageRequest,
) -> EngineResult<RowPage> {
    let target = qualified(database, table);

    let count_sql = format!("SELECT COUNT(*) FROM {target}");
    let total = runner
        .run(&count_sql, vec![])
        .await
        .map_err(|e| translate_unknown(e, database, table))?
        .single_value()
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let mut sql = format!("SELECT * FROM {target}");
    let mut params = Vec::new();

    if let Some(term) = page.search_term() {
        let columns = introspect::columns_of(runner, database, table).await?;
        let predicate = columns
            .iter()
            .map(|c| format!("CAST({} AS CHAR) LIKE ?", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(" OR ");
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);

        let pattern = format!("%{term}%");
        params.extend(columns.iter().map(|_| Value::Text(pattern.clone())));
    }

    let limit = page.effective_limit();
    let offset = page.effective_offset();
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::Int(limit));
    params.push(Value::Int(offset));

    let result = runner.run(&sql, params).await?;

    Ok(RowPage {
        rows: result.to_objects(),
        total,
        limit,
        offset,
    })
}

/// Inserts one record.
///
/// Every NOT NULL column that is not the primary key must be present in
/// the record; otherwise the insert fails validation without issuing any
/// SQL, naming the missing columns.
pub async fn insert_row(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
    record: &Map<String, serde_json::Value>,
) -> EngineResult<()> {
    let columns = introspect::columns_of(runner, database, table).await?;

    let missing: Vec<&str> = columns
        .iter()
        .filter(|c| !c.nullable && !c.is_primary_key && !record.contains_key(&c.name))
        .map(|c| c.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::validation(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut names = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());
    for (key, value) in record {
        names.push(quote_ident(key));
        params.push(Value::from_json(value.clone()));
    }
    let placeholders = vec!["?"; params.len()].join(", ");

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified(database, table),
        names.join(", "),
        placeholders
    );
    runner.run(&sql, params).await?;
    Ok(())
}

/// Updates the record whose primary key equals `id`.
///
/// The primary-key field is stripped from the body first (the key is
/// immutable through this path). When the driver reports zero affected
/// rows, a follow-up existence check distinguishes "no such record"
/// from an update that changed nothing.
pub async fn update_row(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
    id: &str,
    record: &Map<String, serde_json::Value>,
) -> EngineResult<()> {
    let pk = introspect::primary_key_of(runner, database, table).await?;

    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (key, value) in record {
        if *key == pk {
            continue;
        }
        assignments.push(format!("{} = ?", quote_ident(key)));
        params.push(Value::from_json(value.clone()));
    }
    if assignments.is_empty() {
        return Err(EngineError::validation("no fields to update"));
    }
    params.push(Value::Text(id.to_string()));

    let target = qualified(database, table);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        target,
        assignments.join(", "),
        quote_ident(&pk)
    );
    let result = runner.run(&sql, params).await?;

    if result.rows_affected == Some(0) {
        let check_sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", target, quote_ident(&pk));
        let found = runner
            .run(&check_sql, vec![Value::Text(id.to_string())])
            .await?
            .single_value()
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if found == 0 {
            return Err(record_not_found(id));
        }
    }
    Ok(())
}

/// Deletes the record whose primary key equals `id`.
pub async fn delete_row(
    runner: &dyn SqlRunner,
    database: &str,
    table: &str,
    id: &str,
) -> EngineResult<()> {
    let pk = introspect::primary_key_of(runner, database, table).await?;

    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        qualified(database, table),
        quote_ident(&pk)
    );
    let result = runner.run(&sql, vec![Value::Text(id.to_string())]).await?;

    if result.rows_affected == Some(0) {
        return Err(record_not_found(id));
    }
    Ok(())
}

/// Removes every row via TRUNCATE, keeping the table structure.
pub async fn clear_table(runner: &dyn SqlRunner, database: &str, table: &str) -> EngineResult<()> {
    if !introspect::table_exists(runner, database, table).await? {
        return Err(EngineError::not_found(format!(
            "table {} does not exist",
            qualified(database, table)
        )));
    }
    let sql = format!("TRUNCATE TABLE {}", qualified(database, table));
    runner.run(&sql, vec![]).await?;
    Ok(())
}

/// Drops a table. Driver errors such as dependent foreign keys pass
/// through untranslated; there is no cascade handling.
pub async fn drop_table(runner: &dyn SqlRunner, database: &str, table: &str) -> EngineResult<()> {
    let sql = format!("DROP TABLE {}", qualified(database, table));
    runner
        .run(&sql, vec![])
        .await
        .map_err(|e| translate_unknown(e, database, table))?;
    Ok(())
}

pub async fn create_database(runner: &dyn SqlRunner, name: &str) -> EngineResult<()> {
    let sql = format!("CREATE DATABASE {}", quote_ident(name));
    runner.run(&sql, vec![]).await?;
    Ok(())
}

pub async fn drop_database(runner: &dyn SqlRunner, name: &str) -> EngineResult<()> {
    let sql = format!("DROP DATABASE {}", quote_ident(name));
    runner.run(&sql, vec![]).await.map_err(|e| {
        if e.is_unknown_object() {
            EngineError::not_found(format!("database {} does not exist", quote_ident(name)))
        } else {
            e
        }
    })?;
    Ok(())
}

/// Creates a table from a column-spec list.
///
/// Types and constraint keywords are matched against closed allowlists
/// (case-insensitively, emitted in canonical form) since they cannot be
/// identifier-escaped.
pub async fn create_table(
    runner: &dyn SqlRunner,
    database: &str,
    spec: &TableSpec,
) -> EngineResult<()> {
    if spec.name.is_empty() {
        return Err(EngineError::validation("table name is required"));
    }
    if spec.columns.is_empty() {
        return Err(EngineError::validation(
            "a table needs at least one column",
        ));
    }

    let mut definitions = Vec::with_capacity(spec.columns.len());
    for column in &spec.columns {
        if column.name.is_empty() {
            return Err(EngineError::validation("column name is required"));
        }
        let data_type = canonical(ALLOWED_COLUMN_TYPES, &column.data_type).ok_or_else(|| {
            EngineError::validation(format!("unsupported column type '{}'", column.data_type))
        })?;

        let mut definition = format!("{} {}", quote_ident(&column.name), data_type);
        for constraint in &column.constraints {
            let keyword = canonical(ALLOWED_CONSTRAINTS, constraint).ok_or_else(|| {
                EngineError::validation(format!("unsupported constraint '{constraint}'"))
            })?;
            definition.push(' ');
            definition.push_str(keyword);
        }
        definitions.push(definition);
    }

    let sql = format!(
        "CREATE TABLE {} ({})",
        qualified(database, &spec.name),
        definitions.join(", ")
    );
    runner.run(&sql, vec![]).await?;
    Ok(())
}

fn canonical(allowed: &'static [&'static str], raw: &str) -> Option<&'static str> {
    allowed
        .iter()
        .find(|k| k.eq_ignore_ascii_case(raw.trim()))
        .copied()
}

fn record_not_found(id: &str) -> EngineError {
    EngineError::not_found(format!("record '{id}' not found"))
}

fn translate_unknown(err: EngineError, database: &str, table: &str) -> EngineError {
    if err.is_unknown_object() {
        EngineError::not_found(format!(
            "table {} does not exist",
            qualified(database, table)
        ))
    } else {
        err
    }
}
