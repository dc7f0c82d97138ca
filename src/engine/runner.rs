//! SqlRunner trait definition
//!
//! The seam between statement-building code (introspection, row CRUD,
//! dump/import) and the live connection. Services are written against this
//! trait so they can be exercised with a scripted runner in tests.

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::engine::types::{QueryResult, Value};

#[async_trait]
pub trait SqlRunner: Send + Sync {
    /// Executes a statement with positional `?` placeholders bound from
    /// `params`, via the prepared-statement protocol.
    async fn run(&self, sql: &str, params: Vec<Value>) -> EngineResult<QueryResult>;

    /// Executes verbatim SQL text without preparing it.
    ///
    /// Needed for statements MySQL refuses to prepare (`USE` inside
    /// imported dumps) and for the raw-query passthrough.
    async fn run_unprepared(&self, sql: &str) -> EngineResult<QueryResult>;
}
