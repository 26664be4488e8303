//! TMDB adapter — movies and TV episodes.
//!
//! TMDB API v3, <https://developer.themoviedb.org/docs>. Auth is an API key
//! passed as a query parameter; discovery endpoints are paginated by page
//! number. Runtime (movies) and networks (TV) require a per-item detail
//! lookup, and genre ids are resolved through the genre list endpoints.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::models::{IngestConfig, MediaType, ReleaseRecord};
use crate::sources::{ReleaseSource, SourceQuery};
use crate::utils::http::{RetryPolicy, check_status, create_client};

const PROVIDER: &str = "tmdb";
const BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// Discovery pages fetched per media type.
const MAX_PAGES: u32 = 5;

pub struct TmdbSource {
    client: Client,
    api_key: String,
    retry: RetryPolicy,
    delay: Duration,
}

impl TmdbSource {
    pub fn new(config: &IngestConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            api_key,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay_ms),
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    async fn get_once(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Value, ProviderError> {
        let response = self
            .client
            .get(format!("{BASE_URL}{path}"))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
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

    async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Value, ProviderError> {
        self.retry.run(PROVIDER, || self.get_once(path, params)).await
    }

    /// Load the id → name genre table for one media type.
    async fn load_genres(
        &self,
        kind: &str,
    ) -> std::result::Result<HashMap<i64, String>, ProviderError> {
        let value = self.get(&format!("/genre/{kind}/list"), &[]).await?;
        let list: GenreList = serde_json::from_value(value)
            .map_err(|e| ProviderError::schema(PROVIDER, format!("genre list: {e}")))?;
        Ok(list.genres.into_iter().map(|g| (g.id, g.name)).collect())
    }

    fn resolve_genres(ids: &[i64], table: &HashMap<i64, String>) -> Vec<String> {
        ids.iter()
            .map(|id| table.get(id).cloned().unwrap_or_else(|| "Unknown".to_string()))
            .collect()
    }

    async fn fetch_movies(
        &self,
        query: SourceQuery,
        genres: &HashMap<i64, String>,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let date = query.date.to_string();
        let mut releases = Vec::new();
        let mut page = 1;
        let mut total_pages = 1;

        while page <= total_pages.min(MAX_PAGES) {
            let params = [
                ("primary_release_date.gte", date.clone()),
                ("primary_release_date.lte", date.clone()),
                ("sort_by", "popularity.desc".to_string()),
                ("page", page.to_string()),
            ];
            let value = self.get("/discover/movie", &params).await?;
            let parsed: DiscoverPage = serde_json::from_value(value)
                .map_err(|e| ProviderError::schema(PROVIDER, format!("discover/movie: {e}")))?;
            total_pages = parsed.total_pages;

            for item in parsed.results {
                let movie: TmdbMovie = match serde_json::from_value(item) {
                    Ok(m) => m,
                    Err(e) => {
                        log::warn!("{PROVIDER}: skipping malformed movie entry: {e}");
                        continue;
                    }
                };

                // Entries with neither synopsis nor poster carry nothing
                // worth showing.
                if movie.overview.is_empty() && movie.poster_path.is_none() {
                    continue;
                }

                // Runtime only lives on the detail endpoint. A failed
                // lookup leaves it unset rather than failing the adapter.
                let runtime = match self.get(&format!("/movie/{}", movie.id), &[]).await {
                    Ok(detail) => serde_json::from_value::<MovieDetail>(detail)
                        .ok()
                        .and_then(|d| d.runtime)
                        .filter(|r| *r > 0),
                    Err(e) => {
                        log::warn!("{PROVIDER}: detail lookup failed for movie {}: {e}", movie.id);
                        None
                    }
                };

                releases.push(movie.into_record(query.date, runtime, genres));
            }
            page += 1;
        }

        log::info!("{PROVIDER}: {} movies for {date}", releases.len());
        Ok(releases)
    }

    async fn fetch_tv(
        &self,
        query: SourceQuery,
        genres: &HashMap<i64, String>,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let date = query.date.to_string();
        let mut releases = Vec::new();
        let mut page = 1;
        let mut total_pages = 1;

        while page <= total_pages.min(MAX_PAGES) {
            let params = [
                ("air_date.gte", date.clone()),
                ("air_date.lte", date.clone()),
                ("sort_by", "popularity.desc".to_string()),
                ("page", page.to_string()),
            ];
            let value = self.get("/discover/tv", &params).await?;
            let parsed: DiscoverPage = serde_json::from_value(value)
                .map_err(|e| ProviderError::schema(PROVIDER, format!("discover/tv: {e}")))?;
            total_pages = parsed.total_pages;

            for item in parsed.results {
                let show: TmdbShow = match serde_json::from_value(item) {
                    Ok(s) => s,
                    Err(e) => {
                        log::warn!("{PROVIDER}: skipping malformed TV entry: {e}");
                        continue;
                    }
                };

                if show.overview.is_empty() && show.poster_path.is_none() {
                    continue;
                }

                let networks = match self.get(&format!("/tv/{}", show.id), &[]).await {
                    Ok(detail) => serde_json::from_value::<ShowDetail>(detail)
                        .map(|d| d.networks.into_iter().map(|n| n.name).collect())
                        .unwrap_or_default(),
                    Err(e) => {
                        log::warn!("{PROVIDER}: detail lookup failed for show {}: {e}", show.id);
                        Vec::new()
                    }
                };

                releases.push(show.into_record(query.date, networks, genres));
            }
            page += 1;
        }

        log::info!("{PROVIDER}: {} TV shows for {date}", releases.len());
        Ok(releases)
    }
}

#[async_trait::async_trait]
impl ReleaseSource for TmdbSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        query: SourceQuery,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let movie_genres = self.load_genres("movie").await?;
        let tv_genres = self.load_genres("tv").await?;

        let mut releases = self.fetch_movies(query, &movie_genres).await?;
        releases.extend(self.fetch_tv(query, &tv_genres).await?);
        Ok(releases)
    }
}

#[derive(Debug, Deserialize)]
struct GenreList {
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DiscoverPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default = "default_total_pages")]
    total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    genre_ids: Vec<i64>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    popularity: f64,
    #[serde(default)]
    vote_average: f64,
}

impl TmdbMovie {
    fn into_record(
        self,
        date: chrono::NaiveDate,
        runtime: Option<u32>,
        genres: &HashMap<i64, String>,
    ) -> ReleaseRecord {
        let title = if self.title.is_empty() {
            "Unknown".to_string()
        } else {
            self.title
        };
        let mut record = ReleaseRecord::new(PROVIDER, MediaType::Movie, title, date);
        record.synopsis = self.overview;
        record.genres = TmdbSource::resolve_genres(&self.genre_ids, genres);
        record.poster_url = self.poster_path.map(|p| format!("{IMAGE_BASE}{p}"));
        record.metadata.runtime_minutes = runtime;
        record.metadata.original_language =
            Some(self.original_language).filter(|l| !l.is_empty());
        record.metadata.popularity = Some(self.popularity);
        record.metadata.vote_average = Some(self.vote_average);
        record
            .external_ids
            .insert("tmdb_id".to_string(), self.id.to_string());
        record
    }
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    #[serde(default)]
    runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmdbShow {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    genre_ids: Vec<i64>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    popularity: f64,
    #[serde(default)]
    vote_average: f64,
}

impl TmdbShow {
    fn into_record(
        self,
        date: chrono::NaiveDate,
        networks: Vec<String>,
        genres: &HashMap<i64, String>,
    ) -> ReleaseRecord {
        let title = if self.name.is_empty() {
            "Unknown".to_string()
        } else {
            self.name
        };
        let mut record = ReleaseRecord::new(PROVIDER, MediaType::Tv, title, date);
        record.synopsis = self.overview;
        record.genres = TmdbSource::resolve_genres(&self.genre_ids, genres);
        record.poster_url = self.poster_path.map(|p| format!("{IMAGE_BASE}{p}"));
        record.metadata.networks = networks;
        record.metadata.original_language =
            Some(self.original_language).filter(|l| !l.is_empty());
        record.metadata.popularity = Some(self.popularity);
        record.metadata.vote_average = Some(self.vote_average);
        record
            .external_ids
            .insert("tmdb_id".to_string(), self.id.to_string());
        record
    }
}

#[derive(Debug, Deserialize)]
struct ShowDetail {
    #[serde(default)]
    networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
struct Network {
    #[serde(default)]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    fn genre_table() -> HashMap<i64, String> {
        HashMap::from([(28, "Action".to_string()), (18, "Drama".to_string())])
    }

    #[test]
    fn movie_maps_provider_fields() {
        let movie: TmdbMovie = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "The Matrix Resurrections",
            "overview": "Return to the Matrix.",
            "genre_ids": [28, 18],
            "poster_path": "/matrix.jpg",
            "original_language": "en",
            "popularity": 88.5,
            "vote_average": 7.1,
        }))
        .unwrap();

        let record = movie.into_record(date(), Some(148), &genre_table());
        assert_eq!(record.source, "tmdb");
        assert_eq!(record.media_type, MediaType::Movie);
        assert_eq!(record.release_date, date());
        assert_eq!(record.genres, vec!["Action", "Drama"]);
        assert_eq!(
            record.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/matrix.jpg")
        );
        assert_eq!(record.metadata.runtime_minutes, Some(148));
        assert_eq!(record.external_ids["tmdb_id"], "603");
    }

    #[test]
    fn missing_runtime_stays_unset() {
        let movie: TmdbMovie =
            serde_json::from_value(serde_json::json!({"id": 1, "title": "Short"})).unwrap();
        let record = movie.into_record(date(), None, &HashMap::new());
        assert_eq!(record.metadata.runtime_minutes, None);
        assert_eq!(record.metadata.original_language, None);
    }

    #[test]
    fn unknown_genre_ids_resolve_to_unknown() {
        assert_eq!(
            TmdbSource::resolve_genres(&[28, 999], &genre_table()),
            vec!["Action", "Unknown"]
        );
    }

    #[test]
    fn show_maps_networks() {
        let show: TmdbShow = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "Some Series",
            "overview": "A show.",
            "genre_ids": [18],
        }))
        .unwrap();
        let record = show.into_record(date(), vec!["HBO".to_string()], &genre_table());
        assert_eq!(record.media_type, MediaType::Tv);
        assert_eq!(record.metadata.networks, vec!["HBO"]);
    }
}
