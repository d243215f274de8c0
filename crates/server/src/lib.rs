//! HTTP server for the clinivid processing pipeline.

pub mod api;
pub mod metrics;
pub mod state;
