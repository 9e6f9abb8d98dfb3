//! Dynabot API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat turn endpoint plus read-only views over the
//! conversation log, the analytics snapshot and the error log.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
