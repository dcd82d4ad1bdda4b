//! Build context shared by every plugin invocation.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::runtime::Handle;

use super::concurrency::{self, WorkerPool};
use super::error::{BuildError, ResourceError};
use crate::build::cache::Cache;
use crate::build::feed::Feed;
use crate::build::item::Item;
use crate::config::Config;

/// A non-markdown source file to copy verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Absolute path of the source file
    pub source: PathBuf,
    /// Path relative to the content directory, reused under the output directory
    pub relative: PathBuf,
}

/// A generated output document waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Where the document is served; determines the output file
    pub href: String,
    pub contents: String,
}

/// Everything the plugins produce and consume, owned by the build.
#[derive(Debug, Default)]
pub struct ItemStore {
    pub items: Vec<Item>,
    pub feeds: Vec<Feed>,
    pub assets: Vec<Asset>,
    pub artifacts: Vec<Artifact>,
}

/// Shared context for plugin stage methods.
///
/// Plugins receive `&mut BuildContext` one at a time; the orchestrator
/// never runs two stage methods at once, so the store needs no locking.
pub struct BuildContext<'a> {
    // === Configuration ===
    /// Parsed site configuration
    pub config: &'a Config,

    /// Directory the config file lives in; relative config paths resolve here
    pub base_path: PathBuf,

    // === Build state ===
    store: ItemStore,

    // === Services ===
    cache: Cache,
    pool: WorkerPool,
    runtime: Handle,
}

impl<'a> BuildContext<'a> {
    /// Create a context with a worker pool sized from `build.workers`.
    ///
    /// `runtime` drives async work started by plugins; the build itself must
    /// run outside that runtime's worker threads (e.g. in `spawn_blocking`).
    pub fn new(config: &'a Config, base_path: PathBuf, runtime: Handle) -> Result<Self, BuildError> {
        let pool = WorkerPool::new(config.build.worker_count())?;
        Ok(Self {
            config,
            base_path,
            store: ItemStore::default(),
            cache: Cache::new(),
            pool,
            runtime,
        })
    }

    // === Items ===

    pub fn items(&self) -> &[Item] {
        &self.store.items
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.store.items
    }

    /// Replace the whole item collection.
    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.store.items = items;
    }

    pub fn append_item(&mut self, item: Item) {
        self.store.items.push(item);
    }

    /// Find an item by slug.
    pub fn item(&self, slug: &str) -> Option<&Item> {
        self.store.items.iter().find(|item| item.slug == slug)
    }

    // === Feeds ===

    pub fn feeds(&self) -> &[Feed] {
        &self.store.feeds
    }

    pub fn feed(&self, name: &str) -> Option<&Feed> {
        self.store.feeds.iter().find(|feed| feed.name == name)
    }

    pub fn replace_feeds(&mut self, feeds: Vec<Feed>) {
        self.store.feeds = feeds;
    }

    // === Assets and artifacts ===

    pub fn assets(&self) -> &[Asset] {
        &self.store.assets
    }

    pub fn add_asset(&mut self, asset: Asset) {
        self.store.assets.push(asset);
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.store.artifacts
    }

    pub fn add_artifact(&mut self, href: impl Into<String>, contents: impl Into<String>) {
        self.store.artifacts.push(Artifact {
            href: href.into(),
            contents: contents.into(),
        });
    }

    /// Consume the context, keeping what the build produced.
    pub fn into_store(self) -> ItemStore {
        self.store
    }

    // === Services ===

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run `task` over the whole item store on the worker pool.
    ///
    /// See [`WorkerPool::run_concurrently`].
    pub fn run_concurrently<E, F>(&mut self, task: F) -> Result<(), E>
    where
        E: Send,
        F: Fn(&mut Item) -> Result<(), E> + Sync,
    {
        self.pool.run_concurrently(&mut self.store.items, task)
    }

    /// Run async operations with at most `build.fetch_concurrency` in flight,
    /// blocking until every one has finished.
    pub fn fan_out<T, Fut>(&self, operations: Vec<Fut>) -> Vec<Result<T, ResourceError>>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, ResourceError>> + Send + 'static,
    {
        let limit = self.config.build.fetch_concurrency;
        self.runtime
            .block_on(concurrency::fan_out(limit, operations))
    }

    // === Paths ===

    pub fn content_dir(&self) -> PathBuf {
        self.resolve(&self.config.site.content)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.config.site.output)
    }

    /// Resolve a config-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
