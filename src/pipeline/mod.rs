//! Pipeline stages and entry points.
//!
//! - `run_ingest`: fetch, normalize, filter and write one day's releases
//! - `run_validate`: check configuration before any network call
//! - `run_show`: print a summary of a previously written batch

pub mod dedup;
pub mod filter;
pub mod ingest;
pub mod show;
pub mod validate;

pub use ingest::run_ingest;
pub use show::run_show;
pub use validate::run_validate;
