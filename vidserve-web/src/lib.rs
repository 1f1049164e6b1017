//! Vidserve Web - HTTP API server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! Serves category-scoped media files with byte-range support, the
//! user entry and measurement record endpoints, and a few small JSON
//! endpoints for discovery and diagnostics.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, build_router, run_server, serve_on};
