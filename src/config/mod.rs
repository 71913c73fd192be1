//! Configuration management for mnemos
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::chunk::words_for_tokens;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Text chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Code indexing configuration
    #[serde(default)]
    pub code: CodeIndexConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Context budgeting and compaction configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Long-term memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key (optional)
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum estimated tokens per chunk
    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: usize,

    /// Overlap tokens between consecutive chunks
    #[serde(default = "default_chunk_overlap_tokens")]
    pub overlap_tokens: usize,
}

/// Code indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeIndexConfig {
    /// Maximum lines per chunk
    #[serde(default = "default_code_max_lines")]
    pub max_lines: usize,

    /// Minimum lines per chunk
    #[serde(default = "default_code_min_lines")]
    pub min_lines: usize,

    /// Lines shared between consecutive chunks
    #[serde(default = "default_code_overlap_lines")]
    pub overlap_lines: usize,

    /// How far back to look for a natural break before cutting
    #[serde(default = "default_code_break_lookback")]
    pub break_lookback: usize,

    /// Files larger than this are skipped
    #[serde(default = "default_code_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Glob patterns excluded from scanning (in addition to .gitignore)
    #[serde(default = "default_code_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results
    #[serde(default = "default_search_top_k")]
    pub default_top_k: usize,
}

/// Context window management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Whether automatic compaction is enabled
    #[serde(default = "default_context_enabled")]
    pub enabled: bool,

    /// Fraction of the context window that triggers compaction
    #[serde(default = "default_context_threshold")]
    pub threshold: f64,

    /// Trailing messages kept verbatim when compacting
    #[serde(default = "default_context_preserve_recent")]
    pub preserve_recent_messages: usize,

    /// Tokens reserved for the system prompt
    #[serde(default = "default_context_system_tokens")]
    pub system_tokens: usize,

    /// Tokens reserved for the persona block
    #[serde(default = "default_context_persona_tokens")]
    pub persona_tokens: usize,
}

/// Long-term memory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory mirroring persisted memory entries as markdown files
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for mnemos data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout(),
            api_key_env: default_embedding_api_key_env(),
        }
    }
}

impl EmbeddingConfig {
    /// Get the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env).ok()
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_chunk_max_tokens(),
            overlap_tokens: default_chunk_overlap_tokens(),
        }
    }
}

impl Default for CodeIndexConfig {
    fn default() -> Self {
        Self {
            max_lines: default_code_max_lines(),
            min_lines: default_code_min_lines(),
            overlap_lines: default_code_overlap_lines(),
            break_lookback: default_code_break_lookback(),
            max_file_bytes: default_code_max_file_bytes(),
            ignore_patterns: default_code_ignore_patterns(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_search_top_k(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: default_context_enabled(),
            threshold: default_context_threshold(),
            preserve_recent_messages: default_context_preserve_recent(),
            system_tokens: default_context_system_tokens(),
            persona_tokens: default_context_persona_tokens(),
        }
    }
}

impl Config {
    /// Get the default base directory for mnemos (~/.mnemos)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemos")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Default configuration rooted at a base directory
    pub fn for_base_dir(base_dir: Option<PathBuf>) -> Self {
        let mut config = Config::default();
        config.init_paths(base_dir);
        config
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("mnemos.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("mnemos.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::for_base_dir(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if mnemos is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be > 0".to_string()));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".to_string()));
        }

        let window_words = words_for_tokens(self.chunk.max_tokens);
        let overlap_words = words_for_tokens(self.chunk.overlap_tokens);
        if window_words == 0 || overlap_words >= window_words {
            return Err(Error::Config(
                "chunk.overlap_tokens must be smaller than chunk.max_tokens".to_string(),
            ));
        }

        if self.code.max_lines < self.code.min_lines {
            return Err(Error::Config(
                "code.max_lines must be >= code.min_lines".to_string(),
            ));
        }

        if self.code.overlap_lines >= self.code.max_lines {
            return Err(Error::Config(
                "code.overlap_lines must be < code.max_lines".to_string(),
            ));
        }

        if self.search.default_top_k == 0 {
            return Err(Error::Config("search.default_top_k must be > 0".to_string()));
        }

        if !(self.context.threshold > 0.0 && self.context.threshold <= 1.0) {
            return Err(Error::Config(
                "context.threshold must be in (0.0, 1.0]".to_string(),
            ));
        }

        Ok(())
    }
}
