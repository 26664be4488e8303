// src/pipeline/filter.rs

//! Filter engine: configurable keep/drop rules per media type.
//!
//! `keep` is a pure function of (record, config) — no I/O, no shared
//! state — so rules are order-independent and the output is always a
//! subset of the input. Rules within a media type are a conjunction: all
//! must pass.

use crate::models::{FilterConfig, MediaType, ReleaseRecord};

/// Decide whether a record survives filtering.
pub fn keep(record: &ReleaseRecord, filters: &FilterConfig) -> bool {
    match record.media_type {
        MediaType::Movie => keep_movie(record, filters),
        MediaType::Tv => keep_tv(record, filters),
        MediaType::Music => keep_music(record, filters),
        // No rules configured for these types.
        MediaType::Book | MediaType::Game | MediaType::Anime => true,
    }
}

/// Drop records failing their media type's rules, preserving order.
pub fn apply(records: Vec<ReleaseRecord>, filters: &FilterConfig) -> Vec<ReleaseRecord> {
    let before = records.len();
    let kept: Vec<ReleaseRecord> = records
        .into_iter()
        .filter(|r| keep(r, filters))
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        log::info!("filter: dropped {dropped} of {before} records");
    }
    kept
}

fn keep_movie(record: &ReleaseRecord, filters: &FilterConfig) -> bool {
    // Unknown runtime passes; only a known-short film is dropped.
    if let Some(runtime) = record.metadata.runtime_minutes {
        if runtime < filters.min_movie_runtime {
            return false;
        }
    }
    language_ok(record, filters)
}

fn keep_tv(record: &ReleaseRecord, filters: &FilterConfig) -> bool {
    let excluded = filters.excluded_tv_genres();
    if record
        .genres
        .iter()
        .any(|g| excluded.iter().any(|e| g.eq_ignore_ascii_case(e)))
    {
        return false;
    }
    language_ok(record, filters)
}

fn keep_music(record: &ReleaseRecord, filters: &FilterConfig) -> bool {
    if filters.include_singles {
        return true;
    }
    !record
        .metadata
        .release_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("single"))
}

fn language_ok(record: &ReleaseRecord, filters: &FilterConfig) -> bool {
    let Some(wanted) = &filters.language else {
        return true;
    };
    // Records without a reported language pass.
    record
        .metadata
        .original_language
        .as_deref()
        .map(|l| l.eq_ignore_ascii_case(wanted))
        .unwrap_or(true)
}
