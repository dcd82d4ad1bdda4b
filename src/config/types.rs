//! Configuration type definitions.
//!
//! This module contains all the data structures used in folio configuration files.
//! These types are pure data - no I/O or complex logic.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::build::feed::FeedConfig;
use crate::build::pipeline::Stage;

// =============================================================================
// Root config
// =============================================================================

/// The full site configuration, as read from `folio.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    /// Feeds derived from the item set during the collect stage
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub taxonomies: TaxonomyConfig,
    #[serde(default)]
    pub blogroll: BlogrollConfig,
    /// Per-plugin settings, keyed by plugin name
    #[serde(default)]
    pub plugins: HashMap<String, PluginConfig>,
}

// =============================================================================
// Site configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: Option<String>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Directory holding the markdown sources (relative to the config file)
    #[serde(default = "default_content")]
    pub content: PathBuf,
    /// Optional theme directory containing `templates/*.html`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "folio".to_string(),
            url: None,
            output: default_output(),
            content: default_content(),
            theme: None,
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("_site")
}

fn default_content() -> PathBuf {
    PathBuf::from("content")
}

// =============================================================================
// Build configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Render items marked `draft: true`
    #[serde(default)]
    pub drafts: bool,
    /// Render items dated in the future
    #[serde(default)]
    pub future: bool,
    /// Worker pool size for per-item work (defaults to host parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Maximum number of in-flight external fetches
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Filter expression selecting items that become private
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
}

fn default_fetch_concurrency() -> usize {
    8
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            drafts: false,
            future: false,
            workers: None,
            fetch_concurrency: default_fetch_concurrency(),
            private: None,
        }
    }
}

impl BuildConfig {
    /// The effective worker pool size.
    pub fn worker_count(&self) -> usize {
        self.workers.filter(|n| *n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

// =============================================================================
// Markdown configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Extensions to enable for markdown processing
    #[serde(default = "default_markdown_extensions")]
    pub extensions: Vec<String>,
}

fn default_markdown_extensions() -> Vec<String> {
    vec![
        "definition_lists".to_string(),
        "footnotes".to_string(),
        "gfm".to_string(),
        "heading_attributes".to_string(),
        "strikethrough".to_string(),
        "tables".to_string(),
        "tasklists".to_string(),
    ]
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: default_markdown_extensions(),
        }
    }
}

// =============================================================================
// Taxonomy configuration
// =============================================================================

/// Which synthetic listing pages the taxonomy plugin generates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default = "default_true")]
    pub tags: bool,
    #[serde(default = "default_true")]
    pub categories: bool,
    /// Monthly archive pages
    #[serde(default = "default_true")]
    pub archives: bool,
    /// Page size for taxonomy listings (unpaginated when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            tags: true,
            categories: true,
            archives: true,
            page_size: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Blogroll configuration
// =============================================================================

/// External feeds aggregated into the site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogrollConfig {
    #[serde(default)]
    pub feeds: Vec<BlogrollSource>,
    /// How long a fetched feed stays fresh
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory for the on-disk fetch memo (relative to the config file)
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Abort the build when every configured feed fails to load
    #[serde(default)]
    pub fail_if_all_fail: bool,
}

impl Default for BlogrollConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            ttl_secs: default_ttl_secs(),
            timeout_secs: default_timeout_secs(),
            cache_dir: default_cache_dir(),
            fail_if_all_fail: false,
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".folio-cache")
}

/// One external feed in the blogroll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlogrollSource {
    pub name: String,
    pub url: String,
}

// =============================================================================
// Plugin configuration
// =============================================================================

/// Settings a plugin receives from the site config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Priority overrides per stage, applied before the run starts
    #[serde(default)]
    pub priority: BTreeMap<Stage, i32>,
}
