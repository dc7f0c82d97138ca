//! Handlers mapping the REST routes onto engine operations.
//!
//! Bodies and results are plain JSON; exports answer with attachment
//! headers the way a browser download expects them.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Map;
use tracing::instrument;

use crate::engine::types::{ImportReport, PageRequest, RowPage, TableSpec, TableStructure};
use crate::engine::{introspect, rows, EngineError};
use crate::export;
use crate::http::types::{
    ApiError, BannerResponse, ConnectRequest, CreateDatabaseRequest, HealthResponse,
    MessageResponse, QueryRequest, QueryResponse,
};
use crate::http::AppState;

pub async fn root() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Welcome to the MySQLPad API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connected: state.manager.is_connected().await,
    })
}

#[instrument(skip_all)]
pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let config = request.into_config()?;
    state.manager.connect(&config).await?;
    Ok(MessageResponse::new("Connected successfully"))
}

#[instrument(skip_all)]
pub async fn disconnect(State(state): State<AppState>) -> Json<MessageResponse> {
    state.manager.disconnect().await;
    MessageResponse::new("Disconnected successfully")
}

pub async fn list_databases(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = introspect::list_databases(state.manager.as_ref()).await?;
    Ok(Json(names))
}

#[instrument(skip_all, fields(name = %request.name))]
pub async fn create_database(
    State(state): State<AppState>,
    Json(request): Json<CreateDatabaseRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if request.name.is_empty() {
        return Err(EngineError::validation("database name is required").into());
    }
    rows::create_database(state.manager.as_ref(), &request.name).await?;
    Ok(MessageResponse::new(format!(
        "Database {} created successfully",
        request.name
    )))
}

#[instrument(skip_all, fields(name = %database))]
pub async fn drop_database(
    State(state): State<AppState>,
    Path(database): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::drop_database(state.manager.as_ref(), &database).await?;
    Ok(MessageResponse::new(format!(
        "Database {database} deleted successfully"
    )))
}

#[instrument(skip_all, fields(database = %database))]
pub async fn list_tables(
    State(state): State<AppState>,
    Path(database): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = introspect::list_tables(state.manager.as_ref(), &database).await?;
    Ok(Json(names))
}

#[instrument(skip_all, fields(database = %database, table = %spec.name))]
pub async fn create_table(
    State(state): State<AppState>,
    Path(database): Path<String>,
    Json(spec): Json<TableSpec>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::create_table(state.manager.as_ref(), &database, &spec).await?;
    Ok(MessageResponse::new(format!(
        "Table {} created successfully",
        spec.name
    )))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn table_structure(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
) -> Result<Json<TableStructure>, ApiError> {
    let structure = introspect::describe(state.manager.as_ref(), &database, &table).await?;
    Ok(Json(structure))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn table_data(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Query(page): Query<PageRequest>,
) -> Result<Json<RowPage>, ApiError> {
    let page = rows::list_rows(state.manager.as_ref(), &database, &table, &page).await?;
    Ok(Json(page))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn insert_record(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Json(record): Json<Map<String, serde_json::Value>>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::insert_row(state.manager.as_ref(), &database, &table, &record).await?;
    Ok(MessageResponse::new("Record inserted successfully"))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn update_record(
    State(state): State<AppState>,
    Path((database, table, id)): Path<(String, String, String)>,
    Json(record): Json<Map<String, serde_json::Value>>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::update_row(state.manager.as_ref(), &database, &table, &id, &record).await?;
    Ok(MessageResponse::new("Record updated successfully"))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn delete_record(
    State(state): State<AppState>,
    Path((database, table, id)): Path<(String, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::delete_row(state.manager.as_ref(), &database, &table, &id).await?;
    Ok(MessageResponse::new("Record deleted successfully"))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn clear_table(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::clear_table(state.manager.as_ref(), &database, &table).await?;
    Ok(MessageResponse::new(format!(
        "Table {table} cleared successfully"
    )))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn drop_table(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    rows::drop_table(state.manager.as_ref(), &database, &table).await?;
    Ok(MessageResponse::new(format!(
        "Table {table} deleted successfully"
    )))
}

#[instrument(skip_all, fields(database = %database))]
pub async fn export_database(
    State(state): State<AppState>,
    Path(database): Path<String>,
) -> Result<Response, ApiError> {
    let dump = export::database_to_sql(state.manager.as_ref(), &database).await?;
    Ok(attachment(
        "application/sql",
        format!("{database}_dump.sql"),
        dump,
    ))
}

#[instrument(skip_all, fields(database = %database, table = %table))]
pub async fn export_table(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let csv = export::table_to_csv(state.manager.as_ref(), &database, &table).await?;
    Ok(attachment("text/csv", format!("{table}_export.csv"), csv))
}

#[instrument(skip_all, fields(bytes = body.len()))]
pub async fn import_database(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportReport>, ApiError> {
    if body.trim().is_empty() {
        return Err(EngineError::validation("no SQL content provided").into());
    }

    // Dumps carry USE statements, so the whole script replays on one
    // dedicated connection rather than across the pool.
    let session = state.manager.detach_session().await?;
    let report = export::import_sql(&session, &body).await;
    session.close().await;
    Ok(Json(report?))
}

#[instrument(skip_all, fields(database = ?request.database))]
pub async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.sql.trim().is_empty() {
        return Err(EngineError::validation("sql is required").into());
    }
    let result = state
        .manager
        .run_raw(request.database.as_deref(), &request.sql)
        .await?;
    Ok(Json(QueryResponse::from(result)))
}

fn attachment(content_type: &str, filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}
