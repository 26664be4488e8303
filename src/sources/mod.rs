//! Source adapters, one per external content API.
//!
//! Each adapter translates provider-native responses into
//! [`ReleaseRecord`]s for a single target date. Adapters are independent:
//! an auth failure or exhausted retry in one never affects the others.

pub mod igdb;
pub mod jikan;
pub mod musicbrainz;
pub mod open_library;
pub mod tmdb;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{ProviderError, Result};
use crate::models::{Config, Credentials, ReleaseRecord};

pub use igdb::IgdbSource;
pub use jikan::JikanSource;
pub use musicbrainz::MusicBrainzSource;
pub use open_library::OpenLibrarySource;
pub use tmdb::TmdbSource;

/// One adapter invocation: fetch everything released on this date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuery {
    pub date: NaiveDate,
}

impl SourceQuery {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

/// Contract implemented by every source adapter.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Provider slug used in logs, stats and record sources.
    fn name(&self) -> &'static str;

    /// Fetch all releases for the query date.
    async fn fetch(&self, query: SourceQuery) -> std::result::Result<Vec<ReleaseRecord>, ProviderError>;
}

/// Run-scoped budget for rate-limited enrichment lookups.
///
/// Shared across adapters by handle; decrements are atomic so adapters may
/// run concurrently.
#[derive(Debug)]
pub struct Budget {
    remaining: AtomicUsize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
        }
    }

    /// Take one unit of budget. Returns false once exhausted.
    pub fn try_acquire(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

/// Build the adapter set for one run.
///
/// Providers whose credentials are absent are skipped with a warning; the
/// run proceeds with the remaining adapters.
pub fn build_sources(
    config: &Config,
    credentials: &Credentials,
    cover_art_budget: Arc<Budget>,
    synopsis_budget: Arc<Budget>,
) -> Result<Vec<Box<dyn ReleaseSource>>> {
    let mut sources: Vec<Box<dyn ReleaseSource>> = Vec::new();

    match &credentials.tmdb_api_key {
        Some(key) => sources.push(Box::new(TmdbSource::new(&config.ingest, key.clone())?)),
        None => log::warn!("TMDB_API_KEY not set — skipping movies and TV"),
    }

    sources.push(Box::new(OpenLibrarySource::new(
        &config.ingest,
        synopsis_budget,
    )?));

    match (&credentials.igdb_client_id, &credentials.igdb_client_secret) {
        (Some(id), Some(secret)) => sources.push(Box::new(IgdbSource::new(
            &config.ingest,
            id.clone(),
            secret.clone(),
        )?)),
        _ => log::warn!("IGDB credentials not set — skipping games"),
    }

    sources.push(Box::new(JikanSource::new(&config.ingest)?));
    sources.push(Box::new(MusicBrainzSource::new(
        &config.ingest,
        cover_art_budget,
    )?));

    Ok(sources)
}
