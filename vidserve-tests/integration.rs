//! Integration tests for Vidserve
//!
//! Drive the full router in-process: path resolution, range parsing,
//! chunked streaming and the CSV record endpoints wired together exactly
//! as the server runs them.

#[path = "integration/fixtures.rs"]
mod fixtures;

#[path = "integration/range_serving.rs"]
mod range_serving;

#[path = "integration/error_responses.rs"]
mod error_responses;

#[path = "integration/record_endpoints.rs"]
mod record_endpoints;
