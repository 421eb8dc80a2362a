//! Test helpers for code that drives the migration engine.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream crates.

mod db;
mod executor;

pub use db::{sqlite_memory_pool, TestDatabase, TEST_DATABASE_URL_ENV};
pub use executor::{ExecutedCall, RecordingExecutor};
