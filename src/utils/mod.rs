//! Utility functions and helpers.

pub mod http;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Normalize a title for matching: lowercase, whitespace collapsed, trimmed.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive a stable record id from the identity fields.
///
/// SHA-256 over "source:media_type:normalized_title:date", hex-truncated
/// to 16 characters. Stable across runs and input order.
pub fn stable_id(source: &str, media_type: &str, normalized_title: &str, date: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(media_type.as_bytes());
    hasher.update(b":");
    hasher.update(normalized_title.as_bytes());
    hasher.update(b":");
    hasher.update(date.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Dune  "), "dune");
        assert_eq!(normalize_title("The\tLong   Walk"), "the long walk");
        assert_eq!(normalize_title("ALREADY normal"), "already normal");
    }

    #[test]
    fn test_stable_id_deterministic() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let a = stable_id("tmdb", "movie", "dune", date);
        let b = stable_id("tmdb", "movie", "dune", date);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_stable_id_varies_by_field() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let base = stable_id("tmdb", "movie", "dune", date);
        assert_ne!(base, stable_id("tmdb", "tv", "dune", date));
        assert_ne!(base, stable_id("jikan", "movie", "dune", date));
        assert_ne!(
            base,
            stable_id("tmdb", "movie", "dune", NaiveDate::from_ymd_opt(2026, 2, 21).unwrap())
        );
    }
}
