//! HTTP API
//!
//! JSON endpoints for login, balances, top-ups and case opening.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use handlers::{AppState, Providers};
pub use server::{build_app, init_tracing, ApiServer};
