// Data Engine Module
// Statement building and execution layer for the MySQL backend

pub mod connection;
pub mod connection_url;
pub mod error;
pub mod introspect;
pub mod rows;
pub mod runner;
pub mod sql;
pub mod types;

pub use connection::{ConnectionManager, SessionRunner};
pub use error::EngineError;
pub use runner::SqlRunner;
pub use types::*;
