// SPDX-License-Identifier: Apache-2.0

//! Dump replay.
//!
//! Splits uploaded SQL text into statements and executes them
//! sequentially through the unprepared path (dumps contain `USE` and
//! other statements the prepared protocol refuses). A failing statement
//! is recorded and skipped; the replay continues with the next one. This
//! per-statement tolerance is the one deliberate exception to fail-fast
//! error handling, and every skip lands in the report.

use tracing::warn;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::runner::SqlRunner;
use crate::engine::sql::split_statements;
use crate::engine::types::{ImportReport, ImportStatementError};

const PREVIEW_CHARS: usize = 120;

pub async fn import_sql(runner: &dyn SqlRunner, sql_text: &str) -> EngineResult<ImportReport> {
    let statements = split_statements(sql_text);

    let mut report = ImportReport {
        imported_count: 0,
        skipped_count: 0,
        errors: Vec::new(),
    };

    for (index, statement) in statements.iter().enumerate() {
        match runner.run_unprepared(statement).await {
            Ok(_) => report.imported_count += 1,
            // a missing connection fails the import as a whole, not statement by statement
            Err(EngineError::NotConnected) => return Err(EngineError::NotConnected),
            Err(e) => {
                warn!(index, error = %e, "skipping failed import statement");
                report.skipped_count += 1;
                report.errors.push(ImportStatementError {
                    index,
                    statement: preview(statement),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn preview(statement: &str) -> String {
    if statement.chars().count() <= PREVIEW_CHARS {
        statement.to_string()
    } else {
        let head: String = statement.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::testing::{affected, ScriptedRunner};

    #[tokio::test]
    async fn test_import_continues_past_a_failing_statement() {
        let runner = ScriptedRunner::new()
            .with_result(affected(0))
            .with_response(Err(EngineError::driver("You have an error in your SQL syntax")))
            .with_result(affected(1));

        let report = import_sql(
            &runner,
            "CREATE TABLE a (id int);\nTHIS IS NOT SQL;\nINSERT INTO a (id) VALUES (1);",
        )
        .await
        .unwrap();

        assert_eq!(report.imported_count, 2);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(report.errors[0].statement, "THIS IS NOT SQL");

        // the statement after the failure still ran, unprepared
        let issued = runner.issued();
        assert_eq!(issued.len(), 3);
        assert!(issued.iter().all(|s| !s.prepared));
        assert_eq!(issued[2].sql, "INSERT INTO a (id) VALUES (1)");
    }

    #[tokio::test]
    async fn test_import_does_not_split_inside_string_literals() {
        let runner = ScriptedRunner::new()
            .with_result(affected(1))
            .with_result(affected(1));

        let report = import_sql(
            &runner,
            "INSERT INTO t (v) VALUES ('a;b');INSERT INTO t (v) VALUES ('c');",
        )
        .await
        .unwrap();

        assert_eq!(report.imported_count, 2);
        assert_eq!(
            runner.issued_sql(),
            vec![
                "INSERT INTO t (v) VALUES ('a;b')",
                "INSERT INTO t (v) VALUES ('c')"
            ]
        );
    }

    #[tokio::test]
    async fn test_import_without_connection_fails_whole() {
        let runner = ScriptedRunner::new().with_response(Err(EngineError::NotConnected));

        let err = import_sql(&runner, "SELECT 1;").await.unwrap_err();
        assert!(matches!(err, EngineError::NotConnected));
    }

    #[tokio::test]
    async fn test_import_of_comment_only_text_is_empty_report() {
        let runner = ScriptedRunner::new();

        let report = import_sql(&runner, "-- nothing here\n  \n").await.unwrap();
        assert_eq!(report.imported_count, 0);
        assert_eq!(report.skipped_count, 0);
        assert!(runner.issued().is_empty());
    }

    #[tokio::test]
    async fn test_long_statement_preview_is_truncated() {
        let runner =
            ScriptedRunner::new().with_response(Err(EngineError::driver("table is full")));

        let long = format!("INSERT INTO t (v) VALUES ('{}')", "x".repeat(500));
        let report = import_sql(&runner, &long).await.unwrap();

        assert_eq!(report.errors[0].statement.chars().count(), PREVIEW_CHARS + 3);
        assert!(report.errors[0].statement.ends_with("..."));
    }
}
