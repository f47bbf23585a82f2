//! Transport layer: the HTTP API in front of the travel assistant

pub mod http;

pub use http::{router, run_http_server, AppState};
