// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::{Config, Credentials};

/// Validate configuration and report which providers are enabled.
///
/// Unlike normal startup, a missing config file is an error here — the
/// point of the command is to check the file.
pub fn run_validate(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    config.validate()?;

    log::info!("Configuration OK ({})", config_path.display());
    log::info!("  user_agent: {}", config.ingest.user_agent);
    log::info!("  timeout_secs: {}", config.ingest.timeout_secs);
    log::info!("  max_concurrent: {}", config.ingest.max_concurrent);
    log::info!("  output_dir: {}", config.ingest.output_dir);
    log::info!("  min_movie_runtime: {}", config.filters.min_movie_runtime);
    log::info!(
        "  music_cover_art_limit: {}",
        config.filters.music_cover_art_limit
    );

    let credentials = Credentials::from_env();
    log::info!(
        "  tmdb: {}",
        if credentials.tmdb_api_key.is_some() {
            "enabled"
        } else {
            "disabled (TMDB_API_KEY not set)"
        }
    );
    let igdb_ready =
        credentials.igdb_client_id.is_some() && credentials.igdb_client_secret.is_some();
    log::info!(
        "  igdb: {}",
        if igdb_ready {
            "enabled"
        } else {
            "disabled (IGDB_CLIENT_ID / IGDB_CLIENT_SECRET not set)"
        }
    );
    log::info!("  open_library, jikan, musicbrainz: enabled (no key required)");

    Ok(())
}
