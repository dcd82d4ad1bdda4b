//! External feed aggregation.
//!
//! Every configured source is fetched concurrently (bounded by
//! `build.fetch_concurrency`), each with its own timeout. Results are
//! memoized in the build cache and on disk with a TTL, so repeated builds
//! within `blogroll.ttl_secs` do not touch the network.
//!
//! A failing source never fails the stage: its feed record carries the
//! error and the last good copy, if any, is still used. Only when
//! `fail_if_all_fail` is set and no source produced anything does the
//! plugin return an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::build::cache::{DiskMemo, Stamped};
use crate::build::feed::{Feed, FeedOrigin, SortKey, sort_items};
use crate::build::item::{Item, ItemKind};
use crate::build::pipeline::{BuildContext, Collect, Plugin, Priority, ResourceError, Stage};
use crate::config::{BlogrollConfig, BlogrollSource};

/// Slug (and feed name) of the aggregate page.
pub const BLOGROLL_SLUG: &str = "blogroll";

// =============================================================================
// Fetching
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid feed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// One entry of an external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub title: String,
    pub url: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub summary: Option<String>,
}

/// The parts of an external feed the blogroll keeps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFeed {
    pub title: Option<String>,
    pub entries: Vec<RemoteEntry>,
}

impl RemoteFeed {
    /// Convert a parsed RSS/Atom/JSON feed; entries without a link are dropped.
    pub fn from_parsed(feed: feed_rs::model::Feed) -> Self {
        let entries = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry.links.first()?.href.clone();
                Some(RemoteEntry {
                    title: entry
                        .title
                        .map(|t| t.content)
                        .unwrap_or_else(|| "Untitled".to_string()),
                    url,
                    date: entry.published.or(entry.updated).map(|d| d.fixed_offset()),
                    summary: entry.summary.map(|s| s.content),
                })
            })
            .collect();

        Self {
            title: feed.title.map(|t| t.content),
            entries,
        }
    }
}

/// Retrieves and parses one external feed.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RemoteFeed, FetchError>;
}

/// Fetches feeds over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RemoteFeed, FetchError> {
        debug!("Fetching feed: {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let feed = feed_rs::parser::parse(body.as_ref())?;
        Ok(RemoteFeed::from_parsed(feed))
    }
}

// =============================================================================
// Plugin
// =============================================================================

/// What happened to one source during this build.
struct Outcome {
    feed: Option<RemoteFeed>,
    error: Option<String>,
}

pub struct BlogrollPlugin {
    config: BlogrollConfig,
    fetcher: Option<Arc<dyn FeedFetcher>>,
    timeout: Duration,
}

impl BlogrollPlugin {
    pub fn new(config: BlogrollConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self {
            config,
            fetcher: None,
            timeout,
        }
    }

    /// Use `fetcher` instead of HTTP.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn FeedFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn fetcher(&mut self) -> Result<Arc<dyn FeedFetcher>, FetchError> {
        if let Some(fetcher) = &self.fetcher {
            return Ok(Arc::clone(fetcher));
        }
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(HttpFetcher::new(self.timeout)?);
        self.fetcher = Some(Arc::clone(&fetcher));
        Ok(fetcher)
    }

    /// Resolve every source to a feed, fetching only those that are stale.
    fn load(&mut self, ctx: &BuildContext) -> anyhow::Result<Vec<Outcome>> {
        let memo = DiskMemo::new(ctx.resolve(&self.config.cache_dir));
        let ttl = chrono::Duration::from_std(Duration::from_secs(self.config.ttl_secs))
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 1000));
        let now = Utc::now();

        let mut outcomes = Vec::with_capacity(self.config.feeds.len());
        let mut stale: Vec<(usize, BlogrollSource, Option<Stamped<RemoteFeed>>)> = Vec::new();

        for (index, source) in self.config.feeds.iter().enumerate() {
            let key = cache_key(source);
            let cached = ctx
                .cache()
                .get::<Stamped<RemoteFeed>>(&key)
                .map(|hit| (*hit).clone())
                .or_else(|| memo.load::<Stamped<RemoteFeed>>(&key));

            match cached {
                Some(stamped) if stamped.is_fresh(ttl, now) => {
                    debug!("using cached copy of {}", source.url);
                    ctx.cache().set(key, stamped.clone());
                    outcomes.push(Outcome {
                        feed: Some(stamped.value),
                        error: None,
                    });
                }
                previous => {
                    stale.push((index, source.clone(), previous));
                    outcomes.push(Outcome {
                        feed: None,
                        error: None,
                    });
                }
            }
        }

        if stale.is_empty() {
            return Ok(outcomes);
        }

        let sources: Vec<BlogrollSource> = stale.iter().map(|(_, s, _)| s.clone()).collect();
        let fetcher = self.fetcher()?;
        let timeout = self.timeout;
        let operations: Vec<_> = sources
            .into_iter()
            .map(|source| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    match tokio::time::timeout(timeout, fetcher.fetch(&source.url)).await {
                        Ok(Ok(feed)) => Ok(feed),
                        Ok(Err(e)) => Err(ResourceError::new(source.name, e.to_string())),
                        Err(_) => Err(ResourceError::new(
                            source.name,
                            format!("timed out after {:?}", timeout),
                        )),
                    }
                }
            })
            .collect();

        info!("Fetching {} external feeds", operations.len());
        let results = ctx.fan_out(operations);

        // Every fetch has finished; merge results in one place
        for ((index, source, previous), result) in stale.into_iter().zip(results) {
            let outcome = &mut outcomes[index];
            match result {
                Ok(feed) => {
                    let stamped = Stamped::now(feed);
                    let key = cache_key(&source);
                    if let Err(e) = memo.store(&key, &stamped) {
                        warn!("failed to memoize {}: {e}", source.url);
                    }
                    outcome.feed = Some(stamped.value.clone());
                    ctx.cache().set(key, stamped);
                }
                Err(e) => {
                    warn!("blogroll feed {} failed: {}", source.name, e.message);
                    outcome.error = Some(e.message);
                    outcome.feed = previous.map(|stale| stale.value);
                }
            }
        }

        Ok(outcomes)
    }
}

fn cache_key(source: &BlogrollSource) -> String {
    format!("blogroll:{}", source.url)
}

fn entry_item(source: &BlogrollSource, index: usize, entry: &RemoteEntry) -> Item {
    let mut item = Item::synthetic(
        ItemKind::Remote,
        format!("{}/{}/{}", BLOGROLL_SLUG, source.name, index + 1),
        entry.title.clone(),
    );
    item.href = entry.url.clone();
    item.date = entry.date;
    item.description = entry.summary.clone();
    item.skip = true;
    item.extra.insert(
        "source".to_string(),
        serde_yaml::Value::String(source.name.clone()),
    );
    item
}

impl Collect for BlogrollPlugin {
    fn collect(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        if self.config.feeds.is_empty() {
            return Ok(());
        }

        let outcomes = self.load(ctx)?;

        let usable = outcomes.iter().filter(|o| o.feed.is_some()).count();
        if usable == 0 && self.config.fail_if_all_fail {
            let errors: Vec<String> = self
                .config
                .feeds
                .iter()
                .zip(&outcomes)
                .map(|(source, o)| format!("{}: {}", source.name, o.error.as_deref().unwrap_or("no data")))
                .collect();
            anyhow::bail!(
                "all {} blogroll feeds failed ({})",
                outcomes.len(),
                errors.join("; ")
            );
        }

        let mut entries: Vec<Item> = Vec::new();
        let mut feeds: Vec<Feed> = Vec::new();
        for (source, outcome) in self.config.feeds.iter().zip(outcomes) {
            let items: Vec<Item> = outcome
                .feed
                .iter()
                .flat_map(|feed| feed.entries.iter().enumerate())
                .map(|(index, entry)| entry_item(source, index, entry))
                .collect();
            let slugs = items.iter().map(|item| item.slug.clone()).collect();
            let mut feed = Feed::external(&source.name, &source.url, slugs, outcome.error);
            if let Some(title) = outcome.feed.and_then(|f| f.title) {
                feed.title = title;
            }
            feeds.push(feed);
            entries.extend(items);
        }

        let mut ordered: Vec<&Item> = entries.iter().collect();
        sort_items(&mut ordered, SortKey::Date, true);
        let aggregate = Feed::from_slugs(
            BLOGROLL_SLUG,
            format!("/{}/", BLOGROLL_SLUG),
            ordered.iter().map(|item| item.slug.clone()).collect(),
            FeedOrigin::Aggregate,
        );
        info!(
            "Blogroll: {} entries from {}/{} feeds",
            aggregate.slugs.len(),
            usable,
            self.config.feeds.len()
        );
        feeds.push(aggregate);

        for item in entries {
            if ctx.item(&item.slug).is_none() {
                ctx.append_item(item);
            }
        }
        if ctx.item(BLOGROLL_SLUG).is_none() {
            ctx.append_item(Item::synthetic(ItemKind::Blogroll, BLOGROLL_SLUG, "Blogroll"));
        }

        let mut all: Vec<Feed> = ctx
            .feeds()
            .iter()
            .filter(|existing| !feeds.iter().any(|f| f.name == existing.name))
            .cloned()
            .collect();
        all.extend(feeds);
        ctx.replace_feeds(all);
        Ok(())
    }
}

impl Plugin for BlogrollPlugin {
    fn name(&self) -> &str {
        "blogroll"
    }

    fn priority_for(&self, _stage: Stage) -> Priority {
        Priority::LATE
    }

    fn as_collect(&mut self) -> Option<&mut dyn Collect> {
        Some(self)
    }
}
