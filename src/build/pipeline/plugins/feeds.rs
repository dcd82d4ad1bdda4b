//! Configured feeds.

use anyhow::Context as _;
use tracing::{debug, info};

use crate::build::feed::{Feed, FeedConfig};
use crate::build::pipeline::{BuildContext, Collect, Plugin};

/// Builds every feed from the `feeds` config section.
///
/// A feed replaces any earlier feed with the same name, so re-running
/// collect is idempotent.
pub struct FeedsPlugin {
    configs: Vec<FeedConfig>,
}

impl FeedsPlugin {
    pub fn new(configs: Vec<FeedConfig>) -> Self {
        Self { configs }
    }
}

impl Collect for FeedsPlugin {
    fn collect(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let mut built = Vec::with_capacity(self.configs.len());
        for config in &self.configs {
            let feed = Feed::build(config, ctx.items())
                .with_context(|| format!("invalid filter for feed '{}'", config.name))?;
            debug!(
                "feed {}: {} items on {} pages",
                feed.name,
                feed.slugs.len(),
                feed.total_pages()
            );
            built.push(feed);
        }

        let mut feeds: Vec<Feed> = ctx
            .feeds()
            .iter()
            .filter(|existing| !built.iter().any(|f| f.name == existing.name))
            .cloned()
            .collect();
        info!("Built {} feeds", built.len());
        feeds.extend(built);
        ctx.replace_feeds(feeds);
        Ok(())
    }
}

impl Plugin for FeedsPlugin {
    fn name(&self) -> &str {
        "feeds"
    }

    fn as_collect(&mut self) -> Option<&mut dyn Collect> {
        Some(self)
    }
}
