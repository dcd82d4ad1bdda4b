//! Configuration loading and types for folio.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Loading configs from files and the environment (`load`)

mod load;
mod types;

pub use load::resolve_config_path;
// Re-export all types for convenient access
pub use types::{
    BlogrollConfig, BlogrollSource, BuildConfig, Config, MarkdownConfig, PluginConfig,
    SiteConfig, TaxonomyConfig,
};

/// Default config file name, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "folio.yaml";

/// Prefix for environment overrides, e.g. `FOLIO__BUILD__DRAFTS=true`.
pub const ENV_PREFIX: &str = "FOLIO";

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("config file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("{0}")]
    Validation(String),
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "invalid config: 'site.name' must not be empty".to_string(),
            ));
        }
        if self.build.fetch_concurrency == 0 {
            return Err(ConfigError::Validation(
                "invalid config: 'build.fetch_concurrency' must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "invalid config: every feed needs a 'name'".to_string(),
                ));
            }
            if !seen.insert(feed.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "invalid config: feed '{}' is defined more than once",
                    feed.name
                )));
            }
            if feed.page_size == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "invalid config: feed '{}' has page_size 0",
                    feed.name
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.blogroll.feeds {
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "invalid config: blogroll feed '{}' is defined more than once",
                    source.name
                )));
            }
        }

        Ok(())
    }
}
