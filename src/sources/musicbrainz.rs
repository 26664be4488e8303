//! MusicBrainz adapter — music releases (CD, vinyl, digital).
//!
//! MusicBrainz API, <https://musicbrainz.org/doc/MusicBrainz_API>. No key,
//! but a strict 1 request/second limit that demands a polite User-Agent.
//! Releases are searched by exact date with offset pagination. Cover art
//! comes from the Cover Art Archive and is fetched only while the shared
//! per-run budget lasts. The same album appears once per region with a
//! distinct MBID, so entries are collapsed by (title, artists) before the
//! global dedup pass.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::models::{IngestConfig, MediaType, ReleaseRecord};
use crate::sources::{Budget, ReleaseSource, SourceQuery};
use crate::utils::http::{RetryPolicy, check_status, create_client};
use crate::utils::normalize_title;

const PROVIDER: &str = "musicbrainz";
const BASE_URL: &str = "https://musicbrainz.org/ws/2";
const COVER_ART_URL: &str = "https://coverartarchive.org/release";

const PAGE_SIZE: usize = 100;
const MAX_RESULTS: usize = 300;

/// MusicBrainz allows 1 request/second; stay under it.
const MIN_DELAY_MS: u64 = 1100;

pub struct MusicBrainzSource {
    client: Client,
    retry: RetryPolicy,
    delay: Duration,
    cover_art_budget: Arc<Budget>,
}

impl MusicBrainzSource {
    pub fn new(config: &IngestConfig, cover_art_budget: Arc<Budget>) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay_ms),
            delay: Duration::from_millis(config.request_delay_ms.max(MIN_DELAY_MS)),
            cover_art_budget,
        })
    }

    async fn get_once(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        let response = check_status(PROVIDER, response)?;
        let value = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        tokio::time::sleep(self.delay).await;
        Ok(value)
    }

    async fn search_page(
        &self,
        date: chrono::NaiveDate,
        offset: usize,
    ) -> std::result::Result<SearchPage, ProviderError> {
        let url = format!("{BASE_URL}/release");
        let params = [
            ("query", format!("date:{date}")),
            ("fmt", "json".to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
        ];
        let value = self
            .retry
            .run(PROVIDER, || self.get_once(&url, &params))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::schema(PROVIDER, format!("release search: {e}")))
    }

    async fn lookup_cover(&self, mbid: String) -> Option<String> {
        self.fetch_cover_art(&mbid).await
    }

    /// Fetch the front cover URL for a release, if the archive has one.
    async fn fetch_cover_art(&self, mbid: &str) -> Option<String> {
        let url = format!("{COVER_ART_URL}/{mbid}");
        let result = self
            .retry
            .run(PROVIDER, || self.fetch_cover_art_once(&url))
            .await;
        match result {
            Ok(Some(parsed)) => parsed.front_url(),
            Ok(None) => None,
            Err(e) => {
                log::warn!("{PROVIDER}: cover art lookup failed for {mbid}: {e}");
                None
            }
        }
    }

    async fn fetch_cover_art_once(
        &self,
        url: &str,
    ) -> std::result::Result<Option<CoverArtResponse>, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        // The archive has no art for most releases; that is not an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(PROVIDER, response)?;
        let parsed: CoverArtResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        tokio::time::sleep(self.delay).await;
        Ok(Some(parsed))
    }
}

#[async_trait::async_trait]
impl ReleaseSource for MusicBrainzSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        query: SourceQuery,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let mut releases = Vec::new();
        let mut offset = 0;

        while offset < MAX_RESULTS {
            let page = self.search_page(query.date, offset).await?;
            if page.releases.is_empty() {
                break;
            }
            let total = page.count;

            for item in page.releases {
                let rel: MbRelease = match serde_json::from_value(item) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("{PROVIDER}: skipping malformed release entry: {e}");
                        continue;
                    }
                };
                if rel.title.is_empty() {
                    continue;
                }
                releases.push(rel.into_record(query.date));
            }

            offset += PAGE_SIZE;
            if offset >= total {
                break;
            }
        }

        // Collapse regional duplicates by (title, artists).
        let mut seen = HashSet::new();
        let mut unique: Vec<ReleaseRecord> = Vec::new();
        for record in releases {
            let mut artists = record.metadata.artists.clone();
            artists.sort();
            let key = (normalize_title(&record.title), artists.join("|"));
            if seen.insert(key) {
                unique.push(record);
            }
        }

        let covers_found = enrich_covers(&mut unique, &self.cover_art_budget, |mbid| {
            self.lookup_cover(mbid)
        })
        .await;
        if covers_found > 0 {
            log::info!("{PROVIDER}: found cover art for {covers_found} releases");
        }

        log::info!("{PROVIDER}: {} music releases for {}", unique.len(), query.date);
        Ok(unique)
    }
}

/// Attach cover art to records while the shared budget lasts.
///
/// Every lookup spends budget whether or not the archive has art; once
/// the budget runs out the remaining records keep their poster unset but
/// stay in the output.
async fn enrich_covers<F, Fut>(
    records: &mut [ReleaseRecord],
    budget: &Budget,
    mut lookup: F,
) -> usize
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Option<String>>,
{
    let mut found = 0;
    for record in records.iter_mut() {
        let Some(mbid) = record.external_ids.get("musicbrainz_id").cloned() else {
            continue;
        };
        if !budget.try_acquire() {
            break;
        }
        if let Some(url) = lookup(mbid).await {
            record.poster_url = Some(url);
            found += 1;
        }
    }
    found
}

/// Map a MusicBrainz medium format to our coarse label.
fn map_format(format: &str) -> Option<&'static str> {
    match format {
        "CD" | "Enhanced CD" | "CD-R" => Some("CD"),
        "Vinyl" | "12\" Vinyl" | "7\" Vinyl" | "10\" Vinyl" => Some("Vinyl"),
        "Cassette" => Some("Cassette"),
        "Digital Media" => Some("Digital"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    releases: Vec<Value>,
    #[serde(default)]
    count: usize,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "artist-credit")]
    artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    media: Vec<Medium>,
    #[serde(default, rename = "label-info")]
    label_info: Vec<LabelInfo>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default, rename = "release-group")]
    release_group: Option<ReleaseGroup>,
    #[serde(default)]
    barcode: Option<String>,
}

impl MbRelease {
    fn artists(&self) -> Vec<String> {
        self.artist_credit
            .iter()
            .filter_map(|ac| {
                if !ac.name.is_empty() {
                    Some(ac.name.clone())
                } else {
                    ac.artist.as_ref().map(|a| a.name.clone())
                }
            })
            .filter(|n| !n.is_empty())
            .collect()
    }

    fn formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self
            .media
            .iter()
            .filter_map(|m| m.format.as_deref())
            .filter_map(map_format)
            .map(String::from)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        formats.sort();
        formats
    }

    fn into_record(self, date: chrono::NaiveDate) -> ReleaseRecord {
        let artists = self.artists();
        let formats = self.formats();
        let track_count: u32 = self.media.iter().map(|m| m.track_count).sum();
        let labels: Vec<String> = self
            .label_info
            .iter()
            .filter_map(|li| li.label.as_ref().map(|l| l.name.clone()))
            .filter(|n| !n.is_empty())
            .collect();
        let primary_type = self
            .release_group
            .as_ref()
            .and_then(|rg| rg.primary_type.clone())
            .filter(|t| !t.is_empty());

        let mut genres = Vec::new();
        if let Some(t) = &primary_type {
            genres.push(t.clone());
        }
        genres.extend(formats.iter().cloned());

        let mut record = ReleaseRecord::new(PROVIDER, MediaType::Music, self.title, date);
        record.genres = genres;
        record.metadata.artists = artists;
        record.metadata.formats = formats;
        record.metadata.labels = labels;
        record.metadata.track_count = Some(track_count).filter(|c| *c > 0);
        record.metadata.country = self.country.filter(|c| !c.is_empty());
        record.metadata.release_type = primary_type;
        if !self.id.is_empty() {
            record
                .external_ids
                .insert("musicbrainz_id".to_string(), self.id);
        }
        if let Some(barcode) = self.barcode.filter(|b| !b.is_empty()) {
            record.external_ids.insert("barcode".to_string(), barcode);
        }
        record
    }
}

#[derive(Debug, Deserialize)]
struct ArtistCredit {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: Option<NamedEntity>,
}

#[derive(Debug, Deserialize)]
struct NamedEntity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Medium {
    #[serde(default)]
    format: Option<String>,
    #[serde(default, rename = "track-count")]
    track_count: u32,
}

#[derive(Debug, Deserialize)]
struct LabelInfo {
    #[serde(default)]
    label: Option<NamedEntity>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    #[serde(default, rename = "primary-type")]
    primary_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoverArtResponse {
    #[serde(default)]
    images: Vec<CoverImage>,
}

impl CoverArtResponse {
    /// Front image, preferring the 500px thumbnail; falls back to the
    /// first image of any kind.
    fn front_url(&self) -> Option<String> {
        let pick = |img: &CoverImage| {
            img.thumbnails
                .size_500
                .clone()
                .or_else(|| img.thumbnails.large.clone())
                .or_else(|| img.thumbnails.small.clone())
                .or_else(|| Some(img.image.clone()))
                .filter(|u| !u.is_empty())
        };
        self.images
            .iter()
            .find(|img| img.front)
            .and_then(pick)
            .or_else(|| self.images.first().and_then(pick))
    }
}

#[derive(Debug, Deserialize)]
struct CoverImage {
    #[serde(default)]
    front: bool,
    #[serde(default)]
    thumbnails: Thumbnails,
    #[serde(default)]
    image: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default, rename = "500")]
    size_500: Option<String>,
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    small: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    #[test]
    fn format_mapping() {
        assert_eq!(map_format("CD"), Some("CD"));
        assert_eq!(map_format("12\" Vinyl"), Some("Vinyl"));
        assert_eq!(map_format("Digital Media"), Some("Digital"));
        assert_eq!(map_format("Betamax"), None);
    }

    #[test]
    fn release_maps_artists_formats_and_labels() {
        let rel: MbRelease = serde_json::from_value(serde_json::json!({
            "id": "mbid-123",
            "title": "Blue Hour",
            "artist-credit": [{"name": "Some Band"}],
            "media": [
                {"format": "CD", "track-count": 10},
                {"format": "12\" Vinyl", "track-count": 10},
            ],
            "label-info": [{"label": {"name": "Indie Label"}}],
            "country": "GB",
            "release-group": {"primary-type": "Album"},
            "barcode": "5055036265149",
        }))
        .unwrap();

        let record = rel.into_record(date());
        assert_eq!(record.media_type, MediaType::Music);
        assert_eq!(record.metadata.artists, vec!["Some Band"]);
        assert_eq!(record.metadata.formats, vec!["CD", "Vinyl"]);
        assert_eq!(record.metadata.labels, vec!["Indie Label"]);
        assert_eq!(record.metadata.track_count, Some(20));
        assert_eq!(record.metadata.release_type.as_deref(), Some("Album"));
        assert_eq!(record.genres, vec!["Album", "CD", "Vinyl"]);
        assert_eq!(record.external_ids["musicbrainz_id"], "mbid-123");
        assert_eq!(record.external_ids["barcode"], "5055036265149");
    }

    #[test]
    fn artist_name_falls_back_to_nested_artist() {
        let rel: MbRelease = serde_json::from_value(serde_json::json!({
            "id": "x",
            "title": "T",
            "artist-credit": [{"artist": {"name": "Nested Name"}}],
        }))
        .unwrap();
        assert_eq!(rel.artists(), vec!["Nested Name"]);
    }

    #[test]
    fn front_cover_preferred_with_thumbnail_fallbacks() {
        let response: CoverArtResponse = serde_json::from_value(serde_json::json!({
            "images": [
                {"front": false, "image": "https://caa/back.jpg"},
                {"front": true, "thumbnails": {"large": "https://caa/front-large.jpg"},
                 "image": "https://caa/front.jpg"},
            ]
        }))
        .unwrap();
        assert_eq!(
            response.front_url().as_deref(),
            Some("https://caa/front-large.jpg")
        );
    }

    #[test]
    fn no_front_cover_falls_back_to_first_image() {
        let response: CoverArtResponse = serde_json::from_value(serde_json::json!({
            "images": [{"front": false, "image": "https://caa/any.jpg"}]
        }))
        .unwrap();
        assert_eq!(response.front_url().as_deref(), Some("https://caa/any.jpg"));
    }

    #[test]
    fn zero_track_count_stays_unset() {
        let rel: MbRelease =
            serde_json::from_value(serde_json::json!({"id": "x", "title": "T"})).unwrap();
        let record = rel.into_record(date());
        assert_eq!(record.metadata.track_count, None);
    }

    fn release_with_mbid(i: usize) -> ReleaseRecord {
        let mut r = ReleaseRecord::new(PROVIDER, MediaType::Music, format!("Album {i}"), date());
        r.external_ids
            .insert("musicbrainz_id".to_string(), format!("mbid-{i}"));
        r
    }

    #[tokio::test]
    async fn cover_art_budget_caps_enrichment_but_keeps_all_records() {
        let mut records: Vec<ReleaseRecord> = (0..5).map(release_with_mbid).collect();
        let budget = Budget::new(2);

        let found = enrich_covers(&mut records, &budget, |mbid| async move {
            Some(format!("https://caa/{mbid}/front-500.jpg"))
        })
        .await;

        assert_eq!(found, 2);
        assert_eq!(records.len(), 5);
        assert_eq!(records.iter().filter(|r| r.poster_url.is_some()).count(), 2);
        assert!(records[2..].iter().all(|r| r.poster_url.is_none()));
    }

    #[tokio::test]
    async fn records_without_mbid_spend_no_budget() {
        let plain = ReleaseRecord::new(PROVIDER, MediaType::Music, "No Id", date());
        let mut records = vec![plain, release_with_mbid(1)];
        let budget = Budget::new(1);

        let found = enrich_covers(&mut records, &budget, |_| async move {
            Some("https://caa/x.jpg".to_string())
        })
        .await;

        assert_eq!(found, 1);
        assert!(records[0].poster_url.is_none());
        assert!(records[1].poster_url.is_some());
    }

    #[tokio::test]
    async fn failed_lookups_still_spend_budget() {
        let mut records: Vec<ReleaseRecord> = (0..3).map(release_with_mbid).collect();
        let budget = Budget::new(2);

        let found = enrich_covers(&mut records, &budget, |_| async move { None }).await;

        assert_eq!(found, 0);
        assert_eq!(budget.remaining(), 0);
        assert!(records.iter().all(|r| r.poster_url.is_none()));
    }
}
