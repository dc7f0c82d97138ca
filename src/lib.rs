// MySQLPad - web-based MySQL administration backend
// Core library

pub mod engine;
pub mod export;
pub mod http;
pub mod observability;
