//! HTTP surface: route wiring and the server entry point.

pub mod handlers;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::ConnectionManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
}

/// Builds the full route table.
///
/// Browser clients talk to this API directly, so CORS is wide open and
/// every request is traced.
pub fn router(manager: Arc<ConnectionManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/connect", post(handlers::connect))
        .route("/api/disconnect", post(handlers::disconnect))
        .route("/api/databases", get(handlers::list_databases))
        .route("/api/databases", post(handlers::create_database))
        .route("/api/databases/:database", delete(handlers::drop_database))
        .route(
            "/api/databases/:database/export",
            get(handlers::export_database),
        )
        .route(
            "/api/databases/:database/tables",
            get(handlers::list_tables),
        )
        .route(
            "/api/databases/:database/tables",
            post(handlers::create_table),
        )
        .route(
            "/api/databases/:database/tables/:table",
            delete(handlers::drop_table),
        )
        .route(
            "/api/databases/:database/tables/:table/structure",
            get(handlers::table_structure),
        )
        .route(
            "/api/databases/:database/tables/:table/data",
            get(handlers::table_data),
        )
        .route(
            "/api/databases/:database/tables/:table/records",
            post(handlers::insert_record),
        )
        .route(
            "/api/databases/:database/tables/:table/records/:id",
            put(handlers::update_record),
        )
        .route(
            "/api/databases/:database/tables/:table/records/:id",
            delete(handlers::delete_record),
        )
        .route(
            "/api/databases/:database/tables/:table/clear",
            post(handlers::clear_table),
        )
        .route(
            "/api/databases/:database/tables/:table/export",
            get(handlers::export_table),
        )
        .route("/api/import", post(handlers::import_database))
        .route("/api/query", post(handlers::run_query))
        .with_state(AppState { manager })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Binds `addr` and serves requests until a shutdown signal arrives.
///
/// The connection pool is closed before returning so the server never
/// leaves half-open sessions behind on exit.
pub async fn serve(addr: SocketAddr, manager: Arc<ConnectionManager>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(manager.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    manager.disconnect().await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
