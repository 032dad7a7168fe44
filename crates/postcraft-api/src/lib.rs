//! Postcraft API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Exposes the conversation, the finalized post and the media jobs over a
//! local JSON API, plus a server-sent event stream of state changes.

pub mod error;
pub mod gate;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
