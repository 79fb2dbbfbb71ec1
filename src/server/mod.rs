//! HTTP API and static web UI hosting.

pub mod routes;
mod server;

pub use routes::{build_routes, ApiError};
pub use server::*;
