// src/lib.rs

//! UNREELED ingestion pipeline library.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod utils;
