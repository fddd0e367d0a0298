//! HTTP API, one sub-module per route scope.

pub mod data_sources;
pub mod dimensions;
pub mod pipeline;
pub mod quarantine;
