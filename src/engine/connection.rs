//! Connection Manager
//!
//! Owns the single pooled MySQL connection the whole service shares.
//! At most one pool is live at a time: `connect` closes the previous pool
//! before opening a new one, and `disconnect` is idempotent. Statements
//! run at the server's default isolation level (REPEATABLE READ on stock
//! MySQL); no transactions are opened across requests.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Connection as _, Executor, MySql, Row as _};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};

use crate::engine::connection_url::build_mysql_url;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::runner::SqlRunner;
use crate::engine::sql::{is_select, quote_ident};
use crate::engine::types::{ConnectionConfig, QueryResult, Row, Value};

pub struct ConnectionManager {
    pool: RwLock<Option<MySqlPool>>,
}

impl ConnectionManager {
    const CONNECT_TIMEOUT_MS: u64 = 15_000;
    const POOL_MAX_CONNECTIONS: u32 = 10;

    pub fn new() -> Self {
        Self {
            pool: RwLock::new(None),
        }
    }

    /// Opens the pool for `config`, replacing any open pool.
    ///
    /// The previous pool is closed before the new one is opened, so a
    /// failed connect never leaves a stale connection behind. One probe
    /// round-trip verifies the credentials before the pool is stored.
    #[instrument(
        skip(self, config),
        fields(
            host = %config.host,
            port = config.port,
            database = ?config.database,
        )
    )]
    pub async fn connect(&self, config: &ConnectionConfig) -> EngineResult<()> {
        if let Some(old) = self.pool.write().await.take() {
            info!("closing previous connection pool");
            old.close().await;
        }

        let conn_str = build_mysql_url(config);

        let connect_future = async {
            let pool = MySqlPoolOptions::new()
                .max_connections(Self::POOL_MAX_CONNECTIONS)
                .connect(&conn_str)
                .await
                .map_err(|e| {
                    let msg = e.to_string();
                    if msg.contains("Access denied") {
                        EngineError::auth_failed(msg)
                    } else {
                        EngineError::connection_failed(msg)
                    }
                })?;

            if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
                pool.close().await;
                return Err(EngineError::connection_failed(e.to_string()));
            }

            Ok(pool)
        };

        let pool = match timeout(
            Duration::from_millis(Self::CONNECT_TIMEOUT_MS),
            connect_future,
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::Timeout {
                    timeout_ms: Self::CONNECT_TIMEOUT_MS,
                })
            }
        };

        info!("connected");
        *self.pool.write().await = Some(pool);
        Ok(())
    }

    /// Closes the pool. No-op when already closed.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            info!("disconnected");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Raw-SQL passthrough with an optional default database.
    ///
    /// This is a privileged operation: the text runs verbatim with no
    /// statement-type filtering, so the embedding application must gate
    /// who may call it. When `database` is given, a connection is checked
    /// out of the pool, detached, switched with `USE`, and closed after
    /// the call, so the schema change never leaks into pooled state.
    #[instrument(skip(self, sql), fields(database = ?database))]
    pub async fn run_raw(&self, database: Option<&str>, sql: &str) -> EngineResult<QueryResult> {
        let pool = self.current_pool().await?;

        match database {
            None => Self::exec_text(&pool, sql).await,
            Some(db) => {
                let mut conn = pool
                    .acquire()
                    .await
                    .map_err(EngineError::from_sqlx)?
                    .detach();

                let use_stmt = format!("USE {}", quote_ident(db));
                let result = match (&mut conn).execute(use_stmt.as_str()).await {
                    Ok(_) => Self::exec_text(&mut conn, sql).await,
                    Err(e) => Err(EngineError::from_sqlx(e)),
                };

                if let Err(e) = conn.close().await {
                    warn!(error = %e, "failed to close detached connection");
                }
                result
            }
        }
    }

    /// Checks a connection out of the pool for a statement sequence that
    /// carries session state, such as a dump whose USE must scope the
    /// statements after it.
    pub async fn detach_session(&self) -> EngineResult<SessionRunner> {
        let pool = self.current_pool().await?;
        let conn = pool
            .acquire()
            .await
            .map_err(EngineError::from_sqlx)?
            .detach();
        Ok(SessionRunner {
            conn: Mutex::new(conn),
        })
    }

    async fn current_pool(&self) -> EngineResult<MySqlPool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or(EngineError::NotConnected)
    }

    /// Runs a prepared statement with bound parameters on any executor.
    async fn exec_prepared<'c, E>(
        executor: E,
        sql: &str,
        params: Vec<Value>,
    ) -> EngineResult<QueryResult>
    where
        E: Executor<'c, Database = MySql>,
    {
        let start = Instant::now();

        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                Value::Null => query.bind(Option::<String>::None),
                Value::Bool(b) => query.bind(b),
                Value::Int(i) => query.bind(i),
                Value::Float(f) => query.bind(f),
                Value::Text(s) => query.bind(s),
                Value::Bytes(b) => query.bind(b),
                Value::Json(j) => query.bind(j),
            };
        }

        if is_select(sql) {
            let rows = query
                .fetch_all(executor)
                .await
                .map_err(EngineError::from_sqlx)?;
            Ok(Self::collect_rows(rows, start))
        } else {
            let done = query
                .execute(executor)
                .await
                .map_err(EngineError::from_sqlx)?;
            Ok(QueryResult::with_rows_affected(
                done.rows_affected(),
                start.elapsed().as_millis() as u64,
            ))
        }
    }

    /// Runs verbatim text on any executor, fetching rows for SELECT-like
    /// statements and reporting rows-affected for the rest.
    async fn exec_text<'c, E>(executor: E, sql: &str) -> EngineResult<QueryResult>
    where
        E: Executor<'c, Database = MySql>,
    {
        let start = Instant::now();

        if is_select(sql) {
            let rows = executor
                .fetch_all(sql)
                .await
                .map_err(EngineError::from_sqlx)?;
            Ok(Self::collect_rows(rows, start))
        } else {
            let done = executor
                .execute(sql)
                .await
                .map_err(EngineError::from_sqlx)?;
            Ok(QueryResult::with_rows_affected(
                done.rows_affected(),
                start.elapsed().as_millis() as u64,
            ))
        }
    }

    fn collect_rows(mysql_rows: Vec<MySqlRow>, start: Instant) -> QueryResult {
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let columns = mysql_rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = mysql_rows.iter().map(Self::convert_row).collect();

        QueryResult {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms,
        }
    }

    fn convert_row(mysql_row: &MySqlRow) -> Row {
        let values = (0..mysql_row.columns().len())
            .map(|idx| Self::extract_value(mysql_row, idx))
            .collect();
        Row { values }
    }

    /// Extracts a value from a MySqlRow at the given index
    fn extract_value(row: &MySqlRow, idx: usize) -> Value {
        // Try u64 first for BIGINT UNSIGNED columns
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return v.map(|u| Value::Int(u as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|f| Value::Float(f as f64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|dt| Value::Text(dt.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v
                .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return v
                .map(|t| Value::Text(t.format("%H:%M:%S").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
            return v.map(Value::Json).unwrap_or(Value::Null);
        }

        Value::Null
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlRunner for ConnectionManager {
    async fn run(&self, sql: &str, params: Vec<Value>) -> EngineResult<QueryResult> {
        let pool = self.current_pool().await?;
        debug!(sql, params = params.len(), "executing statement");
        Self::exec_prepared(&pool, sql, params).await
    }

    async fn run_unprepared(&self, sql: &str) -> EngineResult<QueryResult> {
        let pool = self.current_pool().await?;
        debug!(sql, "executing unprepared statement");
        Self::exec_text(&pool, sql).await
    }
}

/// A single connection detached from the pool.
///
/// Statements run strictly in sequence on the one connection, so session
/// state set by one statement (USE, session variables) is visible to the
/// next. Call [`SessionRunner::close`] when done; the pool never sees
/// the connection again.
#[derive(Debug)]
pub struct SessionRunner {
    conn: Mutex<MySqlConnection>,
}

impl SessionRunner {
    pub async fn close(self) {
        if let Err(e) = self.conn.into_inner().close().await {
            warn!(error = %e, "failed to close detached connection");
        }
    }
}

#[async_trait]
impl SqlRunner for SessionRunner {
    async fn run(&self, sql: &str, params: Vec<Value>) -> EngineResult<QueryResult> {
        let mut conn = self.conn.lock().await;
        debug!(sql, params = params.len(), "executing statement on session");
        ConnectionManager::exec_prepared(&mut *conn, sql, params).await
    }

    async fn run_unprepared(&self, sql: &str) -> EngineResult<QueryResult> {
        let mut conn = self.conn.lock().await;
        debug!(sql, "executing unprepared statement on session");
        ConnectionManager::exec_text(&mut *conn, sql).await
    }
}
