//! IGDB adapter — video games.
//!
//! IGDB API v4, <https://api-docs.igdb.com/>. Auth is a Twitch OAuth2
//! client-credentials token fetched at the start of each run. Queries use
//! the Apicalypse text format posted as a plain-text body. Covers, genres
//! and platforms are separate entities resolved with follow-up queries.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::models::{IngestConfig, MediaType, ReleaseRecord};
use crate::sources::{ReleaseSource, SourceQuery};
use crate::utils::http::{RetryPolicy, check_status, create_client};

const PROVIDER: &str = "igdb";
const AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";
const BASE_URL: &str = "https://api.igdb.com/v4";
const IMAGE_BASE: &str = "https://images.igdb.com/igdb/image/upload/t_cover_big";

pub struct IgdbSource {
    client: Client,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
    delay: Duration,
}

impl IgdbSource {
    pub fn new(config: &IngestConfig, client_id: String, client_secret: String) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            client_id,
            client_secret,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay_ms),
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    /// Exchange client credentials for a bearer token.
    async fn authenticate(&self) -> std::result::Result<String, ProviderError> {
        self.retry
            .run(PROVIDER, || self.authenticate_once())
            .await
    }

    async fn authenticate_once(&self) -> std::result::Result<String, ProviderError> {
        let response = self
            .client
            .post(AUTH_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        if let Some(err) = Self::token_error(response.status()) {
            return Err(err);
        }
        let response = check_status(PROVIDER, response)?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        Ok(token.access_token)
    }

    /// Classify a token-endpoint failure. Twitch also rate-limits the
    /// token endpoint, so 429 stays retryable; any other 4xx means bad
    /// credentials and is not worth retrying.
    fn token_error(status: reqwest::StatusCode) -> Option<ProviderError> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Some(ProviderError::rate_limit(PROVIDER));
        }
        if status.is_client_error() {
            return Some(ProviderError::auth(PROVIDER, format!("token: HTTP {status}")));
        }
        None
    }

    async fn query_once(
        &self,
        token: &str,
        endpoint: &str,
        body: &str,
    ) -> std::result::Result<Vec<Value>, ProviderError> {
        let response = self
            .client
            .post(format!("{BASE_URL}/{endpoint}"))
            .header("Client-ID", &self.client_id)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "text/plain")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        let response = check_status(PROVIDER, response)?;
        let items = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        tokio::time::sleep(self.delay).await;
        Ok(items)
    }

    async fn query(
        &self,
        token: &str,
        endpoint: &str,
        body: &str,
    ) -> std::result::Result<Vec<Value>, ProviderError> {
        self.retry
            .run(PROVIDER, || self.query_once(token, endpoint, body))
            .await
    }

    /// Resolve an id set to names via a lookup endpoint.
    async fn resolve_names(
        &self,
        token: &str,
        endpoint: &str,
        ids: &HashSet<i64>,
    ) -> HashMap<i64, String> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let body = format!("fields id, name; where id = ({id_list}); limit 200;");
        match self.query(token, endpoint, &body).await {
            Ok(items) => items
                .into_iter()
                .filter_map(|v| serde_json::from_value::<Named>(v).ok())
                .map(|n| (n.id, n.name))
                .collect(),
            Err(e) => {
                log::warn!("{PROVIDER}: {endpoint} lookup failed: {e}");
                HashMap::new()
            }
        }
    }

    fn games_query(start_ts: i64, end_ts: i64) -> String {
        format!(
            "fields name, summary, first_release_date, rating, cover, genres, platforms; \
             where first_release_date >= {start_ts} & first_release_date < {end_ts}; \
             sort rating desc; limit 50;"
        )
    }

    fn day_bounds(date: NaiveDate) -> (i64, i64) {
        let start = Utc
            .from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
            .timestamp();
        (start, start + 86_400)
    }
}

#[async_trait::async_trait]
impl ReleaseSource for IgdbSource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        query: SourceQuery,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let token = self.authenticate().await?;
        log::info!("{PROVIDER}: authentication successful");

        let (start_ts, end_ts) = Self::day_bounds(query.date);
        let mut results = self
            .query(&token, "games", &Self::games_query(start_ts, end_ts))
            .await?;

        // Release timestamps are often a day off across regions; widen the
        // window before giving up.
        if results.is_empty() {
            log::info!("{PROVIDER}: no exact matches, trying +/- 1 day window");
            results = self
                .query(
                    &token,
                    "games",
                    &Self::games_query(start_ts - 86_400, end_ts + 86_400),
                )
                .await?;
        }

        let games: Vec<Game> = results
            .into_iter()
            .filter_map(|v| match serde_json::from_value(v) {
                Ok(g) => Some(g),
                Err(e) => {
                    log::warn!("{PROVIDER}: skipping malformed game entry: {e}");
                    None
                }
            })
            .collect();

        if games.is_empty() {
            log::info!("{PROVIDER}: no games found for {}", query.date);
            return Ok(Vec::new());
        }

        // Resolve covers.
        let cover_ids: HashSet<i64> = games.iter().filter_map(|g| g.cover).collect();
        let covers: HashMap<i64, String> = if cover_ids.is_empty() {
            HashMap::new()
        } else {
            let id_list = cover_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let body = format!("fields game, image_id; where id = ({id_list}); limit 50;");
            match self.query(&token, "covers", &body).await {
                Ok(items) => items
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<Cover>(v).ok())
                    .map(|c| (c.game, c.image_id))
                    .collect(),
                Err(e) => {
                    log::warn!("{PROVIDER}: cover lookup failed: {e}");
                    HashMap::new()
                }
            }
        };

        let genre_ids: HashSet<i64> = games.iter().flat_map(|g| g.genres.iter().copied()).collect();
        let genre_names = self.resolve_names(&token, "genres", &genre_ids).await;

        let platform_ids: HashSet<i64> =
            games.iter().flat_map(|g| g.platforms.iter().copied()).collect();
        let platform_names = self.resolve_names(&token, "platforms", &platform_ids).await;

        let releases: Vec<ReleaseRecord> = games
            .into_iter()
            .map(|game| game.into_record(query.date, &covers, &genre_names, &platform_names))
            .collect();

        log::info!("{PROVIDER}: {} games for {}", releases.len(), query.date);
        Ok(releases)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Game {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    cover: Option<i64>,
    #[serde(default)]
    genres: Vec<i64>,
    #[serde(default)]
    platforms: Vec<i64>,
}

impl Game {
    fn into_record(
        self,
        date: NaiveDate,
        covers: &HashMap<i64, String>,
        genre_names: &HashMap<i64, String>,
        platform_names: &HashMap<i64, String>,
    ) -> ReleaseRecord {
        let title = if self.name.is_empty() {
            "Unknown".to_string()
        } else {
            self.name
        };
        let mut record = ReleaseRecord::new(PROVIDER, MediaType::Game, title, date);
        record.synopsis = self.summary;
        record.genres = self
            .genres
            .iter()
            .filter_map(|id| genre_names.get(id).cloned())
            .collect();
        record.metadata.platforms = self
            .platforms
            .iter()
            .filter_map(|id| platform_names.get(id).cloned())
            .collect();
        record.metadata.rating = self.rating;
        record.poster_url = covers
            .get(&self.id)
            .filter(|img| !img.is_empty())
            .map(|img| format!("{IMAGE_BASE}/{img}.jpg"));
        record
            .external_ids
            .insert("igdb_id".to_string(), self.id.to_string());
        record
    }
}

#[derive(Debug, Deserialize)]
struct Cover {
    #[serde(default)]
    game: i64,
    #[serde(default)]
    image_id: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    id: i64,
    #[serde(default)]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    #[test]
    fn day_bounds_cover_one_day() {
        let (start, end) = IgdbSource::day_bounds(date());
        assert_eq!(end - start, 86_400);
        let midnight = Utc.from_utc_datetime(&date().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(start, midnight.timestamp());
    }

    #[test]
    fn games_query_embeds_window() {
        let q = IgdbSource::games_query(100, 200);
        assert!(q.contains("first_release_date >= 100"));
        assert!(q.contains("first_release_date < 200"));
        assert!(q.contains("sort rating desc"));
    }

    #[test]
    fn game_maps_lookups_into_record() {
        let game: Game = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Star Valley",
            "summary": "Farm in space.",
            "rating": 91.5,
            "cover": 99,
            "genres": [12, 31],
            "platforms": [6],
        }))
        .unwrap();

        let covers = HashMap::from([(7, "co1abc".to_string())]);
        let genres = HashMap::from([(12, "RPG".to_string()), (31, "Adventure".to_string())]);
        let platforms = HashMap::from([(6, "PC".to_string())]);

        let record = game.into_record(date(), &covers, &genres, &platforms);
        assert_eq!(record.media_type, MediaType::Game);
        assert_eq!(record.genres, vec!["RPG", "Adventure"]);
        assert_eq!(record.metadata.platforms, vec!["PC"]);
        assert_eq!(record.metadata.rating, Some(91.5));
        assert_eq!(
            record.poster_url.as_deref(),
            Some("https://images.igdb.com/igdb/image/upload/t_cover_big/co1abc.jpg")
        );
    }

    #[test]
    fn token_rate_limit_is_retryable_but_bad_credentials_are_not() {
        use reqwest::StatusCode;

        let rate_limited = IgdbSource::token_error(StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert!(matches!(rate_limited, ProviderError::RateLimit { .. }));
        assert!(rate_limited.is_retryable());

        let bad_creds = IgdbSource::token_error(StatusCode::UNAUTHORIZED).unwrap();
        assert!(matches!(bad_creds, ProviderError::Auth { .. }));
        assert!(!bad_creds.is_retryable());

        assert!(IgdbSource::token_error(StatusCode::OK).is_none());
        // Server errors fall through to the shared status classifier.
        assert!(IgdbSource::token_error(StatusCode::BAD_GATEWAY).is_none());
    }

    #[test]
    fn unresolved_lookup_ids_are_dropped() {
        let game: Game =
            serde_json::from_value(serde_json::json!({"id": 1, "name": "X", "genres": [5]}))
                .unwrap();
        let record = game.into_record(date(), &HashMap::new(), &HashMap::new(), &HashMap::new());
        assert!(record.genres.is_empty());
        assert!(record.poster_url.is_none());
    }
}
