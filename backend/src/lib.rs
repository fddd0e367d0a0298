//! Article ingestion pipeline: normalize feeds and CSV exports into staging
//! tables, validate them, quarantine failing rows and upsert the rest into
//! `dim_articles`.

pub mod batch;
pub mod config;
pub mod error;
pub mod job_controller;
pub mod pipeline;
pub mod promote;
pub mod quarantine;
pub mod services;
pub mod sources;
pub mod store;
pub mod validation;

pub use error::{PipelineError, Result};
