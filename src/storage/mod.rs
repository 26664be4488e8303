//! Storage abstractions for release batch persistence.
//!
//! One JSON artifact per run: `releases_<date>.json`. Each run writes a
//! fresh batch that completely supersedes the previous one for that date;
//! there is no incremental update.

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::OutputBatch;

pub use local::LocalStorage;

/// Metadata about a batch write.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Where the batch landed
    pub path: PathBuf,
    /// Total records written
    pub record_count: usize,
}

/// Trait for batch storage backends.
#[async_trait]
pub trait ReleaseStorage: Send + Sync {
    /// Write a batch atomically. A half-written file must never be
    /// visible to downstream consumers.
    async fn write_batch(&self, batch: &OutputBatch) -> Result<WriteSummary>;

    /// Load the batch for a date, if one was written.
    async fn load_batch(&self, date: NaiveDate) -> Result<Option<OutputBatch>>;
}
