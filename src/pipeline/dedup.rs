// src/pipeline/dedup.rs

//! Deduplicator/normalizer: collapse near-duplicate releases.
//!
//! Records are grouped by (media type, normalized title, release date);
//! title matching is case- and whitespace-insensitive. One canonical
//! record survives per group: the one with the richest metadata, ties
//! broken by provider name ascending then id ascending. The whole pass is
//! deterministic and order-independent, and running it on its own output
//! changes nothing.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::NaiveDate;

use crate::models::{MediaType, ReleaseRecord};

type GroupKey = (MediaType, String, NaiveDate);

/// Collapse duplicates, returning canonical records ordered by group key.
pub fn dedup(records: Vec<ReleaseRecord>) -> Vec<ReleaseRecord> {
    let before = records.len();
    let mut groups: BTreeMap<GroupKey, ReleaseRecord> = BTreeMap::new();

    for record in records {
        match groups.entry(record.dedup_key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if prefer(&record, slot.get()) {
                    slot.insert(record);
                }
            }
        }
    }

    let canonical: Vec<ReleaseRecord> = groups.into_values().collect();
    let merged = before - canonical.len();
    if merged > 0 {
        log::info!("dedup: merged {merged} duplicate records");
    }
    canonical
}

/// Whether `candidate` should replace the group's current `incumbent`.
fn prefer(candidate: &ReleaseRecord, incumbent: &ReleaseRecord) -> bool {
    let by_richness = candidate.richness().cmp(&incumbent.richness());
    if by_richness != std::cmp::Ordering::Equal {
        return by_richness == std::cmp::Ordering::Greater;
    }
    // Equal richness: alphabetically-first provider wins, then smaller id.
    (&candidate.source, &candidate.id) < (&incumbent.source, &incumbent.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    fn record(source: &str, media_type: MediaType, title: &str) -> ReleaseRecord {
        ReleaseRecord::new(source, media_type, title, date())
    }

    #[test]
    fn collapses_case_and_whitespace_variants() {
        let input = vec![
            record("open_library", MediaType::Book, "Dune "),
            record("open_library", MediaType::Book, "dune"),
        ];
        let out = dedup(input);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn distinct_media_types_do_not_merge() {
        let input = vec![
            record("tmdb", MediaType::Movie, "Dune"),
            record("open_library", MediaType::Book, "Dune"),
        ];
        assert_eq!(dedup(input).len(), 2);
    }

    #[test]
    fn richer_record_wins() {
        let plain = record("zprovider", MediaType::Music, "Blue Hour");
        let mut rich = record("musicbrainz", MediaType::Music, "Blue Hour");
        rich.synopsis = "An album.".to_string();
        rich.poster_url = Some("https://caa/front.jpg".to_string());

        let out = dedup(vec![plain, rich.clone()]);
        assert_eq!(out, vec![rich]);
    }

    #[test]
    fn equal_richness_breaks_tie_by_provider_name() {
        let a = record("aurora", MediaType::Game, "Star Valley");
        let b = record("zenith", MediaType::Game, "Star Valley");

        let out = dedup(vec![b.clone(), a.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "aurora");
    }

    #[test]
    fn order_independent() {
        let mut rich = record("tmdb", MediaType::Movie, "The Long Walk");
        rich.synopsis = "A walk.".to_string();
        let poor = record("tmdb2", MediaType::Movie, "the long  walk");
        let other = record("jikan", MediaType::Anime, "Frieren");

        let forward = dedup(vec![rich.clone(), poor.clone(), other.clone()]);
        let backward = dedup(vec![other, poor, rich]);

        let ids = |v: &[ReleaseRecord]| v.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&forward), ids(&backward));
    }

    #[test]
    fn idempotent() {
        let input = vec![
            record("tmdb", MediaType::Movie, "Dune"),
            record("tmdb", MediaType::Movie, "DUNE"),
            record("jikan", MediaType::Anime, "Frieren"),
        ];
        let once = dedup(input);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn ids_unique_after_dedup() {
        let input = vec![
            record("tmdb", MediaType::Movie, "A"),
            record("tmdb", MediaType::Movie, "a "),
            record("tmdb", MediaType::Movie, "B"),
            record("musicbrainz", MediaType::Music, "A"),
        ];
        let out = dedup(input);
        let mut ids: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), out.len());
    }
}
