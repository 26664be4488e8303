// src/pipeline/show.rs

//! Terminal summary of a previously written batch.

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::MediaType;
use crate::storage::ReleaseStorage;

const TITLES_PER_SECTION: usize = 5;

/// Print a summary of the batch for `date`.
pub async fn run_show(storage: &dyn ReleaseStorage, date: NaiveDate) -> Result<()> {
    let batch = storage
        .load_batch(date)
        .await?
        .ok_or_else(|| AppError::validation(format!("no batch found for {date}")))?;

    println!("{}", "━".repeat(60));
    println!("  Releases for {date} ({} total)", batch.total);
    println!("{}", "━".repeat(60));

    for media_type in MediaType::ALL {
        let section = batch.section(media_type);
        println!("\n  {} ({})", media_type, section.len());
        for record in section.iter().take(TITLES_PER_SECTION) {
            let genres = if record.genres.is_empty() {
                "—".to_string()
            } else {
                record.genres[..record.genres.len().min(3)].join(", ")
            };
            println!("    {} · {}", record.title, genres);
        }
        let remaining = section.len().saturating_sub(TITLES_PER_SECTION);
        if remaining > 0 {
            println!("    ... and {remaining} more");
        }
    }

    if !batch.errors.is_empty() {
        println!("\n  Failed sources:");
        for (source, error) in &batch.errors {
            println!("    {source}: {error}");
        }
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterConfig, OutputBatch, ReleaseRecord};
    use crate::storage::LocalStorage;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    #[tokio::test]
    async fn shows_existing_batch() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let batch = OutputBatch::new(
            date(),
            vec![ReleaseRecord::new("tmdb", MediaType::Movie, "Solo", date())],
            BTreeMap::new(),
            BTreeMap::new(),
            &FilterConfig::default(),
        );
        storage.write_batch(&batch).await.unwrap();
        assert!(run_show(&storage, date()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_batch_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(run_show(&storage, date()).await.is_err());
    }
}
