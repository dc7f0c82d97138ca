use std::net::SocketAddr;
use std::sync::Arc;

use mysqlpad::engine::ConnectionManager;
use mysqlpad::{http, observability};

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    observability::init_tracing();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let manager = Arc::new(ConnectionManager::new());
    http::serve(addr, manager).await
}
