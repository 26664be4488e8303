//! Jikan adapter — anime airing schedules.
//!
//! Jikan v4 (unofficial MyAnimeList API), <https://docs.api.jikan.moe/>.
//! No key required. The schedules endpoint is keyed by weekday, so the
//! target date is mapped to its day name; pagination uses page numbers
//! with a `has_next_page` flag. The same show can appear on multiple
//! pages, so entries are deduplicated by MAL id before returning.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::models::{IngestConfig, MediaType, ReleaseRecord};
use crate::sources::{ReleaseSource, SourceQuery};
use crate::utils::http::{RetryPolicy, check_status, create_client};

const PROVIDER: &str = "jikan";
const BASE_URL: &str = "https://api.jikan.moe/v4";
const MAX_PAGES: u32 = 3;

pub struct JikanSource {
    client: Client,
    retry: RetryPolicy,
    delay: Duration,
}

impl JikanSource {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay_ms),
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    async fn get_page_once(
        &self,
        day: &str,
        page: u32,
    ) -> std::result::Result<Value, ProviderError> {
        let response = self
            .client
            .get(format!("{BASE_URL}/schedules"))
            .query(&[
                ("filter", day.to_string()),
                ("page", page.to_string()),
                ("limit", "25".to_string()),
            ])
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

    async fn get_page(
        &self,
        day: &str,
        page: u32,
    ) -> std::result::Result<SchedulePage, ProviderError> {
        let value = self
            .retry
            .run(PROVIDER, || self.get_page_once(day, page))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::schema(PROVIDER, format!("schedule page: {e}")))
    }

    /// Lowercase English weekday name for the schedules filter.
    fn day_name(date: chrono::NaiveDate) -> String {
        // Weekday's Display gives the short form; the API wants the full name.
        match date.weekday() {
            chrono::Weekday::Mon => "monday",
            chrono::Weekday::Tue => "tuesday",
            chrono::Weekday::Wed => "wednesday",
            chrono::Weekday::Thu => "thursday",
            chrono::Weekday::Fri => "friday",
            chrono::Weekday::Sat => "saturday",
            chrono::Weekday::Sun => "sunday",
        }
        .to_string()
    }
}

#[async_trait::async_trait]
impl ReleaseSource for JikanSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        query: SourceQuery,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let day = Self::day_name(query.date);
        let mut releases = Vec::new();
        let mut seen_ids = HashSet::new();

        for page in 1..=MAX_PAGES {
            let parsed = self.get_page(&day, page).await?;
            if parsed.data.is_empty() {
                break;
            }

            for item in parsed.data {
                let anime: Anime = match serde_json::from_value(item) {
                    Ok(a) => a,
                    Err(e) => {
                        log::warn!("{PROVIDER}: skipping malformed anime entry: {e}");
                        continue;
                    }
                };
                if !seen_ids.insert(anime.mal_id) {
                    continue;
                }
                releases.push(anime.into_record(query.date));
            }

            if !parsed.pagination.has_next_page {
                break;
            }
        }

        log::info!(
            "{PROVIDER}: {} anime airing on {day} ({})",
            releases.len(),
            query.date
        );
        Ok(releases)
    }
}

#[derive(Debug, Deserialize)]
struct SchedulePage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct Anime {
    #[serde(default)]
    mal_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    synopsis: Option<String>,
    #[serde(default)]
    images: Images,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    themes: Vec<Named>,
    #[serde(default)]
    studios: Vec<Named>,
    #[serde(default)]
    episodes: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl Anime {
    fn into_record(self, date: chrono::NaiveDate) -> ReleaseRecord {
        let title = if self.title.is_empty() {
            "Unknown".to_string()
        } else {
            self.title
        };
        let mut record = ReleaseRecord::new(PROVIDER, MediaType::Anime, title, date);
        record.synopsis = self.synopsis.unwrap_or_default();
        record.genres = self
            .genres
            .into_iter()
            .chain(self.themes)
            .map(|n| n.name)
            .collect();
        record.poster_url = self.images.poster_url();
        record.metadata.studios = self.studios.into_iter().map(|n| n.name).collect();
        record.metadata.episodes_total = self.episodes;
        record.metadata.airing_status = self.status.filter(|s| !s.is_empty());
        record.metadata.score = self.score;
        record
            .external_ids
            .insert("mal_id".to_string(), self.mal_id.to_string());
        record
    }
}

#[derive(Debug, Default, Deserialize)]
struct Images {
    #[serde(default)]
    jpg: ImageSet,
}

#[derive(Debug, Default, Deserialize)]
struct ImageSet {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    large_image_url: Option<String>,
}

impl Images {
    fn poster_url(&self) -> Option<String> {
        self.jpg
            .large_image_url
            .clone()
            .or_else(|| self.jpg.image_url.clone())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn day_name_maps_weekdays() {
        // 2026-02-20 is a Friday.
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        assert_eq!(JikanSource::day_name(date), "friday");
        let sunday = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();
        assert_eq!(JikanSource::day_name(sunday), "sunday");
    }

    #[test]
    fn anime_maps_genres_and_themes() {
        let anime: Anime = serde_json::from_value(serde_json::json!({
            "mal_id": 52991,
            "title": "Sousou no Frieren",
            "synopsis": "The journey after the journey.",
            "images": {"jpg": {"image_url": "https://cdn.example/s.jpg",
                               "large_image_url": "https://cdn.example/l.jpg"}},
            "genres": [{"name": "Adventure"}],
            "themes": [{"name": "Fantasy"}],
            "studios": [{"name": "Madhouse"}],
            "episodes": 28,
            "status": "Currently Airing",
            "score": 9.3,
        }))
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let record = anime.into_record(date);
        assert_eq!(record.genres, vec!["Adventure", "Fantasy"]);
        assert_eq!(record.poster_url.as_deref(), Some("https://cdn.example/l.jpg"));
        assert_eq!(record.metadata.studios, vec!["Madhouse"]);
        assert_eq!(record.metadata.episodes_total, Some(28));
        assert_eq!(record.external_ids["mal_id"], "52991");
    }

    #[test]
    fn missing_episode_count_stays_unset() {
        let anime: Anime =
            serde_json::from_value(serde_json::json!({"mal_id": 1, "title": "X"})).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let record = anime.into_record(date);
        assert_eq!(record.metadata.episodes_total, None);
        assert!(record.poster_url.is_none());
    }
}
