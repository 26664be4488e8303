//! Output batch written once per run.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FilterConfig, MediaType, ReleaseRecord};

/// The single JSON artifact produced per run.
///
/// Created fresh each run and never mutated after write; the next run
/// supersedes it entirely. Downstream rendering relies on the six media
/// type keys always being present, even when empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputBatch {
    /// When this batch was generated
    pub generated_at: DateTime<Utc>,

    /// Target date the run was executed for
    pub date: NaiveDate,

    /// Total records across all media types
    pub total: usize,

    /// Record count per provider
    pub source_stats: BTreeMap<String, usize>,

    /// Adapters that contributed nothing, with the reason
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,

    /// Filter settings the batch was produced under
    pub filters_applied: FilterConfig,

    /// Records grouped by media type
    pub releases: BTreeMap<MediaType, Vec<ReleaseRecord>>,
}

impl OutputBatch {
    /// Group records by media type and build the batch.
    ///
    /// Every media type key is present in the output. Each group is sorted
    /// by popularity descending, then title, then id, so identical inputs
    /// serialize identically.
    pub fn new(
        date: NaiveDate,
        records: Vec<ReleaseRecord>,
        source_stats: BTreeMap<String, usize>,
        errors: BTreeMap<String, String>,
        filters: &FilterConfig,
    ) -> Self {
        let total = records.len();

        let mut releases: BTreeMap<MediaType, Vec<ReleaseRecord>> = MediaType::ALL
            .iter()
            .map(|mt| (*mt, Vec::new()))
            .collect();
        for record in records {
            releases.entry(record.media_type).or_default().push(record);
        }
        for group in releases.values_mut() {
            group.sort_by(|a, b| {
                let pa = a.metadata.popularity.unwrap_or(0.0);
                let pb = b.metadata.popularity.unwrap_or(0.0);
                pb.partial_cmp(&pa)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.title.cmp(&b.title))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        Self {
            generated_at: Utc::now(),
            date,
            total,
            source_stats,
            errors,
            filters_applied: filters.clone(),
            releases,
        }
    }

    /// Output file name for a target date.
    pub fn file_name(date: NaiveDate) -> String {
        format!("releases_{date}.json")
    }

    /// Records for one media type (empty slice if none).
    pub fn section(&self, media_type: MediaType) -> &[ReleaseRecord] {
        self.releases.get(&media_type).map(Vec::as_slice).unwrap_or(&[])
    }
}
