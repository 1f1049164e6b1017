//! End-to-end tests against a real listening server.

mod streaming_workflow;
