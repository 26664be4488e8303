//! Canonical release record shared by every source adapter.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{normalize_title, stable_id};

/// Media category of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Book,
    Game,
    Anime,
    Music,
}

impl MediaType {
    /// All media types, in output order.
    pub const ALL: [MediaType; 6] = [
        MediaType::Movie,
        MediaType::Tv,
        MediaType::Book,
        MediaType::Game,
        MediaType::Anime,
        MediaType::Music,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
            MediaType::Book => "book",
            MediaType::Game => "game",
            MediaType::Anime => "anime",
            MediaType::Music => "music",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific metadata. Every field is optional; absent values are
/// omitted from the serialized output rather than zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    // Movies / TV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    // Books
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    // Games
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    // Anime
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub studios: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airing_status: Option<String>,

    // Music
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,
}

impl ReleaseMetadata {
    /// Number of populated fields, used as part of the dedup richness score.
    pub fn populated_fields(&self) -> usize {
        let options = [
            self.runtime_minutes.is_some(),
            self.original_language.is_some(),
            self.popularity.is_some(),
            self.vote_average.is_some(),
            self.publisher.is_some(),
            self.page_count.is_some(),
            self.isbn.is_some(),
            self.rating.is_some(),
            self.score.is_some(),
            self.episodes_total.is_some(),
            self.airing_status.is_some(),
            self.track_count.is_some(),
            self.country.is_some(),
            self.release_type.is_some(),
        ];
        let lists = [
            !self.networks.is_empty(),
            !self.authors.is_empty(),
            !self.platforms.is_empty(),
            !self.studios.is_empty(),
            !self.artists.is_empty(),
            !self.formats.is_empty(),
            !self.labels.is_empty(),
        ];
        options.iter().filter(|b| **b).count() + lists.iter().filter(|b| **b).count()
    }
}

/// A single media release, normalized into the unified schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Stable content-derived identifier
    pub id: String,

    /// Provider slug (e.g. "tmdb", "musicbrainz")
    pub source: String,

    /// Media category
    pub media_type: MediaType,

    /// Display title as reported by the provider
    pub title: String,

    /// Release date; always the query target date
    pub release_date: NaiveDate,

    /// Synopsis or description (empty when the provider has none)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub synopsis: String,

    /// Genre / subject labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    /// Cover art or poster URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,

    /// Provider-specific metadata
    #[serde(default, skip_serializing_if = "is_default_metadata")]
    pub metadata: ReleaseMetadata,

    /// Identifiers in the provider's own namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,

    /// When this record was ingested
    pub ingested_at: DateTime<Utc>,
}

fn is_default_metadata(m: &ReleaseMetadata) -> bool {
    *m == ReleaseMetadata::default()
}

impl ReleaseRecord {
    /// Build a record with its stable id derived from
    /// (source, media type, normalized title, release date).
    pub fn new(
        source: impl Into<String>,
        media_type: MediaType,
        title: impl Into<String>,
        release_date: NaiveDate,
    ) -> Self {
        let source = source.into();
        let title = title.into();
        let id = stable_id(&source, media_type.as_str(), &normalize_title(&title), release_date);
        Self {
            id,
            source,
            media_type,
            title,
            release_date,
            synopsis: String::new(),
            genres: Vec::new(),
            poster_url: None,
            metadata: ReleaseMetadata::default(),
            external_ids: BTreeMap::new(),
            ingested_at: Utc::now(),
        }
    }

    /// Key used by the deduplicator to group near-duplicate entries.
    pub fn dedup_key(&self) -> (MediaType, String, NaiveDate) {
        (self.media_type, normalize_title(&self.title), self.release_date)
    }

    /// Richness score for canonical-record selection: counts synopsis,
    /// poster, genres and populated metadata fields.
    pub fn richness(&self) -> usize {
        let mut score = self.metadata.populated_fields();
        if !self.synopsis.is_empty() {
            score += 2;
        }
        if self.poster_url.is_some() {
            score += 2;
        }
        if !self.genres.is_empty() {
            score += 1;
        }
        score += self.external_ids.len().min(2);
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    #[test]
    fn id_is_stable_across_title_whitespace_and_case() {
        let a = ReleaseRecord::new("tmdb", MediaType::Movie, "The  Long Walk ", date());
        let b = ReleaseRecord::new("tmdb", MediaType::Movie, "the long walk", date());
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn id_differs_by_media_type_and_source() {
        let movie = ReleaseRecord::new("tmdb", MediaType::Movie, "Dune", date());
        let book = ReleaseRecord::new("open_library", MediaType::Book, "Dune", date());
        assert_ne!(movie.id, book.id);
    }

    #[test]
    fn richness_counts_populated_fields() {
        let mut bare = ReleaseRecord::new("jikan", MediaType::Anime, "Frieren", date());
        let rich = {
            let mut r = bare.clone();
            r.synopsis = "A journey after the journey.".to_string();
            r.poster_url = Some("https://example.com/cover.jpg".to_string());
            r.genres = vec!["Fantasy".to_string()];
            r.metadata.studios = vec!["Madhouse".to_string()];
            r
        };
        bare.metadata = ReleaseMetadata::default();
        assert!(rich.richness() > bare.richness());
    }

    #[test]
    fn optional_metadata_is_omitted_from_json() {
        let record = ReleaseRecord::new("musicbrainz", MediaType::Music, "Blue Album", date());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("metadata").is_none());
        assert!(json.get("poster_url").is_none());
        assert_eq!(json["media_type"], "music");
    }
}
