//! Data structures shared across the pipeline.

pub mod batch;
pub mod config;
pub mod release;

pub use batch::OutputBatch;
pub use config::{Config, Credentials, FilterConfig, IngestConfig};
pub use release::{MediaType, ReleaseMetadata, ReleaseRecord};
