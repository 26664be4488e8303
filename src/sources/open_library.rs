//! Open Library adapter — new book releases.
//!
//! Open Library search API, <https://openlibrary.org/developers/api>. No
//! key required, just a polite User-Agent. Search does not filter by exact
//! date, so we query per subject with the target publish year and keep
//! documents whose edition dates match the target month or year. Missing
//! synopses are enriched from the work detail pages under a bounded lookup
//! budget.

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

const PROVIDER: &str = "open_library";
const SEARCH_URL: &str = "https://openlibrary.org/search.json";
const WORKS_URL: &str = "https://openlibrary.org";
const COVERS_BASE: &str = "https://covers.openlibrary.org/b";

/// Subjects searched per run — casting a wide net.
const SUBJECTS: [&str; 12] = [
    "fiction",
    "thriller",
    "science_fiction",
    "fantasy",
    "mystery",
    "romance",
    "biography",
    "history",
    "science",
    "horror",
    "literary_fiction",
    "young_adult",
];

/// Subjects too generic to be useful as genres.
const GENERIC_SUBJECTS: [&str; 6] = [
    "fiction",
    "accessible book",
    "protected daisy",
    "in library",
    "large type books",
    "lending library",
];

const ALLOWED_LANGUAGES: [&str; 2] = ["eng", "en"];

const SEARCH_FIELDS: &str = "key,title,author_name,first_publish_year,publish_date,subject,\
     isbn,number_of_pages_median,cover_i,publisher,language,ratings_average,\
     ratings_count,first_sentence";

pub struct OpenLibrarySource {
    client: Client,
    retry: RetryPolicy,
    delay: Duration,
    synopsis_budget: Arc<Budget>,
}

impl OpenLibrarySource {
    pub fn new(config: &IngestConfig, synopsis_budget: Arc<Budget>) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay_ms),
            delay: Duration::from_millis(config.request_delay_ms),
            synopsis_budget,
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

    async fn search(
        &self,
        params: &[(&str, String)],
    ) -> std::result::Result<SearchPage, ProviderError> {
        let value = self
            .retry
            .run(PROVIDER, || self.get_once(SEARCH_URL, params))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::schema(PROVIDER, format!("search page: {e}")))
    }

    async fn lookup_synopsis(&self, work_key: String) -> Option<String> {
        self.fetch_synopsis(&work_key).await
    }

    /// Fetch the description from a work's detail page.
    async fn fetch_synopsis(&self, work_key: &str) -> Option<String> {
        let url = format!("{WORKS_URL}{work_key}.json");
        let value = self
            .retry
            .run(PROVIDER, || self.get_once(&url, &[]))
            .await
            .map_err(|e| log::warn!("{PROVIDER}: work lookup failed for {work_key}: {e}"))
            .ok()?;
        let detail: WorkDetail = serde_json::from_value(value).ok()?;
        detail
            .description
            .map(TextValue::into_string)
            .filter(|s| !s.is_empty())
            .or_else(|| detail.first_sentence.map(TextValue::into_string))
            .filter(|s| !s.is_empty())
    }
}

#[async_trait::async_trait]
impl ReleaseSource for OpenLibrarySource {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        query: SourceQuery,
    ) -> std::result::Result<Vec<ReleaseRecord>, ProviderError> {
        let year = chrono::Datelike::year(&query.date);
        let mut releases = Vec::new();

        for subject in SUBJECTS {
            let params = [
                ("subject", subject.to_string()),
                ("first_publish_year", year.to_string()),
                ("sort", "new".to_string()),
                ("limit", "20".to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
            ];
            let page = match self.search(&params).await {
                Ok(page) => page,
                Err(e) => {
                    // One failed subject search should not sink the rest.
                    log::warn!("{PROVIDER}: subject '{subject}' search failed: {e}");
                    continue;
                }
            };

            for item in page.docs {
                let doc: BookDoc = match serde_json::from_value(item) {
                    Ok(doc) => doc,
                    Err(e) => {
                        log::warn!("{PROVIDER}: skipping malformed book entry: {e}");
                        continue;
                    }
                };
                if let Some(record) = doc.into_record(query.date) {
                    releases.push(record);
                }
            }
        }

        // Same work shows up under several subjects; keep the first
        // occurrence per (title, authors).
        let mut seen = HashSet::new();
        let mut unique: Vec<ReleaseRecord> = Vec::new();
        for record in releases {
            let mut authors = record.metadata.authors.clone();
            authors.sort();
            let key = (normalize_title(&record.title), authors.join("|"));
            if seen.insert(key) {
                unique.push(record);
            }
        }

        // Ratings count is the best popularity proxy Open Library offers.
        unique.sort_by(|a, b| {
            let ra = a.metadata.popularity.unwrap_or(0.0);
            let rb = b.metadata.popularity.unwrap_or(0.0);
            rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
        });

        // Enrich missing synopses from work detail pages, bounded by the
        // shared lookup budget.
        let enriched = enrich_synopses(&mut unique, &self.synopsis_budget, |key| {
            self.lookup_synopsis(key)
        })
        .await;
        if enriched > 0 {
            log::info!("{PROVIDER}: enriched {enriched} books with synopses");
        }

        log::info!("{PROVIDER}: {} books for {}", unique.len(), query.date);
        Ok(unique)
    }
}

/// Fill in missing synopses from work detail pages while the shared
/// budget lasts. Records with a synopsis or without a work key spend no
/// budget; records past the budget stay in the output unenriched.
async fn enrich_synopses<F, Fut>(
    records: &mut [ReleaseRecord],
    budget: &Budget,
    mut lookup: F,
) -> usize
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Option<String>>,
{
    let mut enriched = 0;
    for record in records.iter_mut() {
        if !record.synopsis.is_empty() {
            continue;
        }
        let Some(work_key) = record.external_ids.get("open_library_key").cloned() else {
            continue;
        };
        if !budget.try_acquire() {
            break;
        }
        if let Some(synopsis) = lookup(work_key).await {
            record.synopsis = synopsis;
            enriched += 1;
        }
    }
    enriched
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    docs: Vec<Value>,
}

/// One value or a list of them — Open Library uses both shapes freely.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Plain string or `{ "value": ... }` wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextValue {
    Text(String),
    Object { value: String },
}

impl TextValue {
    fn into_string(self) -> String {
        match self {
            TextValue::Text(s) => s,
            TextValue::Object { value } => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkDetail {
    #[serde(default)]
    description: Option<TextValue>,
    #[serde(default)]
    first_sentence: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct BookDoc {
    #[serde(default)]
    key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i32>,
    #[serde(default)]
    publish_date: Option<OneOrMany>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    isbn: Vec<String>,
    #[serde(default)]
    number_of_pages_median: Option<u32>,
    #[serde(default)]
    cover_i: Option<i64>,
    #[serde(default)]
    publisher: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    #[serde(default)]
    ratings_average: Option<f64>,
    #[serde(default)]
    ratings_count: Option<f64>,
    #[serde(default)]
    first_sentence: Option<OneOrMany>,
}

impl BookDoc {
    /// Whether any edition date matches the target month, or the first
    /// publish year matches the target year. Open Library dates are
    /// imprecise, so the year match is the fallback.
    fn matches_target(&self, date: chrono::NaiveDate) -> bool {
        let year = chrono::Datelike::year(&date);
        let month_long = date.format("%B %Y").to_string().to_lowercase();
        let month_short = date.format("%b %Y").to_string().to_lowercase();
        let year_str = year.to_string();

        let month_match = self
            .publish_date
            .as_ref()
            .map(|dates| match dates {
                OneOrMany::One(s) => vec![s.clone()],
                OneOrMany::Many(v) => v.clone(),
            })
            .unwrap_or_default()
            .iter()
            .any(|pd| {
                let lower = pd.to_lowercase();
                lower.contains(&month_long) || lower.contains(&month_short) || pd.contains(&year_str)
            });

        month_match || self.first_publish_year == Some(year)
    }

    fn best_isbn(&self) -> Option<String> {
        let isbn_13 = self.isbn.iter().find(|i| i.len() == 13);
        let isbn_10 = self.isbn.iter().find(|i| i.len() == 10);
        isbn_13.or(isbn_10).cloned()
    }

    fn cover_url(&self) -> Option<String> {
        if let Some(id) = self.cover_i.filter(|id| *id > 0) {
            return Some(format!("{COVERS_BASE}/id/{id}-L.jpg"));
        }
        self.best_isbn()
            .map(|isbn| format!("{COVERS_BASE}/isbn/{isbn}-L.jpg"))
    }

    fn genres(&self) -> Vec<String> {
        self.subject
            .iter()
            .take(20)
            .filter(|s| s.len() < 40 && !GENERIC_SUBJECTS.contains(&s.to_lowercase().as_str()))
            .take(5)
            .cloned()
            .collect()
    }

    fn into_record(self, date: chrono::NaiveDate) -> Option<ReleaseRecord> {
        if self.title.is_empty() || !self.matches_target(date) {
            return None;
        }

        // English only — Open Library has no post-hoc language metadata
        // usable by the filter engine.
        if !self.language.is_empty()
            && !self
                .language
                .iter()
                .any(|l| ALLOWED_LANGUAGES.contains(&l.as_str()))
        {
            return None;
        }

        let synopsis = self
            .first_sentence
            .as_ref()
            .and_then(|fs| match fs {
                OneOrMany::One(s) => Some(s.clone()),
                OneOrMany::Many(v) => v.first().cloned(),
            })
            .unwrap_or_default();

        let best_isbn = self.best_isbn();
        let cover = self.cover_url();
        let genres = self.genres();

        let mut record = ReleaseRecord::new(PROVIDER, MediaType::Book, self.title.clone(), date);
        record.synopsis = synopsis;
        record.genres = genres;
        record.poster_url = cover;
        record.metadata.authors = self.author_name.clone();
        record.metadata.publisher = self.publisher.first().cloned();
        record.metadata.page_count = self.number_of_pages_median;
        record.metadata.isbn = best_isbn.clone();
        record.metadata.vote_average = self.ratings_average;
        record.metadata.popularity = self.ratings_count;
        if !self.key.is_empty() {
            record
                .external_ids
                .insert("open_library_key".to_string(), self.key.clone());
        }
        if let Some(isbn) = best_isbn {
            record.external_ids.insert("isbn".to_string(), isbn);
        }
        Some(record)
    }
}
