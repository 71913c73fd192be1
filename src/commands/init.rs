//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::info;

/// Write a default config and create the database.
///
/// Refuses to overwrite an existing config unless `force` is set.
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let config = Config::for_base_dir(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    config.save()?;
    MetaDb::connect(&config).await?;

    info!("Initialized mnemos at {:?}", config.paths.base_dir);
    Ok(config)
}

pub fn print_init(config: &Config) {
    println!("✓ mnemos initialized");
    println!("  Config:   {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!(
        "  1. Point [embedding] url at an OpenAI-compatible server (now {})",
        config.embedding.url
    );
    println!("  2. Ingest notes:   mnemos ingest text \"...\"");
    println!("  3. Index code:     mnemos index start /path/to/repo");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("data");

        let config = cmd_init(Some(base.clone()), false).await.unwrap();
        assert!(config.paths.config_file.exists());
        assert!(config.paths.db_file.exists());
        assert!(config.is_initialized());

        let err = cmd_init(Some(base.clone()), false).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized(_)));

        assert!(cmd_init(Some(base), true).await.is_ok());
    }
}
