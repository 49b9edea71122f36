//! HTTP Request Surface Module

mod http;

pub use http::{AppState, HeartbeatRequest, HttpServer, RecordCommand, RecordValue, ViewRequest};
