// src/pipeline/ingest.rs

//! Ingestion pipeline: fetch, normalize, filter, write.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, Credentials, OutputBatch, ReleaseRecord};
use crate::pipeline::{dedup, filter};
use crate::sources::{Budget, ReleaseSource, SourceQuery, build_sources};
use crate::storage::ReleaseStorage;

/// Run the full ingestion pipeline for one target date.
///
/// Individual adapter failures are recorded and tolerated; the run always
/// writes an output batch, with empty sections for providers that
/// contributed nothing.
pub async fn run_ingest(
    config: &Config,
    credentials: &Credentials,
    date: NaiveDate,
    storage: &dyn ReleaseStorage,
) -> Result<OutputBatch> {
    let start = Utc::now();
    log::info!("Starting ingestion for {date}");

    let cover_art_budget = Arc::new(Budget::new(config.filters.music_cover_art_limit));
    let synopsis_budget = Arc::new(Budget::new(config.filters.synopsis_lookup_limit));
    let sources = build_sources(config, credentials, cover_art_budget, synopsis_budget)?;

    let (records, source_stats, errors) = collect_releases(
        sources,
        SourceQuery::new(date),
        config.ingest.max_concurrent,
    )
    .await;

    let records = dedup::dedup(records);
    let records = filter::apply(records, &config.filters);

    let batch = OutputBatch::new(date, records, source_stats, errors, &config.filters);
    let summary = storage.write_batch(&batch).await?;

    let elapsed = Utc::now() - start;
    log::info!(
        "Ingestion complete for {date}: {} releases in {}s -> {}",
        batch.total,
        elapsed.num_seconds(),
        summary.path.display()
    );
    for (source, count) in &batch.source_stats {
        log::info!("  {source}: {count}");
    }
    for (source, error) in &batch.errors {
        log::warn!("  {source} failed: {error}");
    }

    Ok(batch)
}

/// Fetch from every adapter with bounded concurrency, collecting partial
/// results. Returns (records, per-source counts, per-source failures).
pub async fn collect_releases(
    sources: Vec<Box<dyn ReleaseSource>>,
    query: SourceQuery,
    concurrency: usize,
) -> (
    Vec<ReleaseRecord>,
    BTreeMap<String, usize>,
    BTreeMap<String, String>,
) {
    let concurrency = concurrency.max(1);
    let mut records = Vec::new();
    let mut source_stats = BTreeMap::new();
    let mut errors = BTreeMap::new();

    let mut fetches = stream::iter(sources.into_iter().map(|source| async move {
        let name = source.name();
        (name, source.fetch(query).await)
    }))
    .buffer_unordered(concurrency);

    while let Some((name, result)) = fetches.next().await {
        match result {
            Ok(batch) => {
                source_stats.insert(name.to_string(), batch.len());
                records.extend(batch);
            }
            Err(error) => {
                log::error!("{name}: adapter failed, dropping its contribution: {error}");
                source_stats.insert(name.to_string(), 0);
                errors.insert(name.to_string(), error.to_string());
            }
        }
    }

    (records, source_stats, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{FilterConfig, MediaType};
    use crate::storage::{LocalStorage, ReleaseStorage};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubSource {
        name: &'static str,
        media_type: MediaType,
        fail: bool,
    }

    #[async_trait]
    impl ReleaseSource for StubSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(
            &self,
            query: SourceQuery,
        ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
            if self.fail {
                return Err(ProviderError::transient(self.name, "network down"));
            }
            Ok(vec![ReleaseRecord::new(
                self.name,
                self.media_type,
                format!("{} title", self.name),
                query.date,
            )])
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    fn stub(name: &'static str, media_type: MediaType, fail: bool) -> Box<dyn ReleaseSource> {
        Box::new(StubSource {
            name,
            media_type,
            fail,
        })
    }

    #[tokio::test]
    async fn collects_from_all_sources() {
        let sources = vec![
            stub("tmdb", MediaType::Movie, false),
            stub("jikan", MediaType::Anime, false),
        ];
        let (records, stats, errors) =
            collect_releases(sources, SourceQuery::new(date()), 2).await;
        assert_eq!(records.len(), 2);
        assert_eq!(stats["tmdb"], 1);
        assert_eq!(stats["jikan"], 1);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn partial_failure_still_produces_full_batch() {
        let sources = vec![
            stub("tmdb", MediaType::Movie, false),
            stub("open_library", MediaType::Book, true),
            stub("igdb", MediaType::Game, false),
            stub("jikan", MediaType::Anime, true),
            stub("musicbrainz", MediaType::Music, false),
        ];
        let (records, stats, errors) =
            collect_releases(sources, SourceQuery::new(date()), 1).await;

        assert_eq!(stats["open_library"], 0);
        assert_eq!(stats["jikan"], 0);
        assert_eq!(errors.len(), 2);

        let records = dedup::dedup(records);
        let filters = FilterConfig::default();
        let records = filter::apply(records, &filters);
        let batch = OutputBatch::new(date(), records, stats, errors, &filters);

        assert_eq!(batch.section(MediaType::Movie).len(), 1);
        assert_eq!(batch.section(MediaType::Game).len(), 1);
        assert_eq!(batch.section(MediaType::Music).len(), 1);
        assert!(batch.section(MediaType::Book).is_empty());
        assert!(batch.section(MediaType::Anime).is_empty());

        // The batch still lands on disk.
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let summary = storage.write_batch(&batch).await.unwrap();
        assert_eq!(summary.record_count, 3);
        let loaded = storage.load_batch(date()).await.unwrap().unwrap();
        assert_eq!(loaded.errors.len(), 2);
    }

    #[tokio::test]
    async fn sequential_and_concurrent_collection_agree() {
        let build = || {
            vec![
                stub("tmdb", MediaType::Movie, false),
                stub("igdb", MediaType::Game, false),
                stub("musicbrainz", MediaType::Music, false),
            ]
        };
        let (seq, seq_stats, _) = collect_releases(build(), SourceQuery::new(date()), 1).await;
        let (conc, conc_stats, _) = collect_releases(build(), SourceQuery::new(date()), 4).await;

        let ids = |v: &[ReleaseRecord]| {
            let mut ids: Vec<_> = v.iter().map(|r| r.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&seq), ids(&conc));
        assert_eq!(seq_stats, conc_stats);
    }
}
