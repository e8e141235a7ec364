//! HTTP front end.
//!
//! `api` holds the shared state, JSON handlers and error mapping; `server`
//! assembles the router with CORS and upload limits and runs it.

pub mod api;
pub mod server;

pub use api::{AppState, SharedState, api_router};
pub use server::{build_router, start_server};
