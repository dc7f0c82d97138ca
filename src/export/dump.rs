// SPDX-License-Identifier: Apache-2.0

//! Database → SQL dump text.
//!
//! Format: a header comment, `CREATE DATABASE IF NOT EXISTS` plus `USE`,
//! then per table a `DROP TABLE IF EXISTS`, the server's verbatim
//! `CREATE TABLE`, and one batched `INSERT` carrying every row. INSERTs
//! stay table-qualified on purpose: the dump sets its own database
//! context with the `USE` line, so it stays replayable on any server.

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::introspect;
use crate::engine::runner::SqlRunner;
use crate::engine::sql::{format_literal, qualified, quote_ident};

pub async fn database_to_sql(runner: &dyn SqlRunner, database: &str) -> EngineResult<String> {
    if !introspect::database_exists(runner, database).await? {
        return Err(EngineError::not_found(format!(
            "database {} does not exist",
            quote_ident(database)
        )));
    }

    let tables = introspect::list_tables(runner, database).await?;

    let mut dump = format!("-- MySQL dump for database {database}\n\n");
    dump.push_str(&format!(
        "CREATE DATABASE IF NOT EXISTS {};\n",
        quote_ident(database)
    ));
    dump.push_str(&format!("USE {};\n\n", quote_ident(database)));

    for table in &tables {
        let ddl = introspect::show_create_table(runner, database, table).await?;
        dump.push_str(&format!("DROP TABLE IF EXISTS {};\n", quote_ident(table)));
        dump.push_str(&ddl);
        dump.push_str(";\n\n");

        let select = format!("SELECT * FROM {}", qualified(database, table));
        let result = runner.run(&select, vec![]).await?;
        if result.rows.is_empty() {
            continue;
        }

        let columns = result
            .columns
            .iter()
            .map(|name| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        dump.push_str(&format!(
            "INSERT INTO {} ({}) VALUES\n",
            quote_ident(table),
            columns
        ));

        let rows: Vec<String> = result
            .rows
            .iter()
            .map(|row| {
                let literals = row
                    .values
                    .iter()
                    .map(format_literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({literals})")
            })
            .collect();
        dump.push_str(&rows.join(",\n"));
        dump.push_str(";\n\n");
    }

    Ok(dump)
}
