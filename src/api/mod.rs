//! HTTP API for the search agent.
//!
//! ## Endpoints
//!
//! - `POST /chat` - Send a message, get the thread's full history back
//! - `GET /conversations` - List known thread ids
//! - `GET /conversations/:thread_id` - Get a thread's stored history
//! - `GET /health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
