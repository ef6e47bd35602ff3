//! API module for HTTP endpoints
//!
//! This module exposes the message log over a small REST surface.

pub mod http;
pub mod rest;
pub mod state;

pub use http::create_router;
pub use state::AppState;
