//! Publication rules: drafts, future posts, unpublished and private items.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::build::pipeline::{BuildContext, Configure, Plugin, Priority, Stage};
use crate::filter::Expression;

/// Decides which items are rendered and which are private.
///
/// - drafts are skipped unless `build.drafts` is set
/// - items dated after `now` are skipped unless `build.future` is set
/// - items with `published: false` are always skipped
/// - items matching `build.private` are marked private
pub struct PublishPlugin {
    now: DateTime<Utc>,
}

impl PublishPlugin {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Evaluate future-dated items against a fixed instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Default for PublishPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Configure for PublishPlugin {
    fn configure(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let build = &ctx.config.build;
        let (drafts, future) = (build.drafts, build.future);
        let private = build
            .private
            .as_deref()
            .map(Expression::parse)
            .transpose()?;
        let now = self.now;

        let mut skipped = 0;
        for item in ctx.items_mut() {
            let is_future = item.date.is_some_and(|date| date > now);
            if !item.published || (item.draft && !drafts) || (is_future && !future) {
                debug!("skipping {}", item.slug);
                item.skip = true;
                skipped += 1;
            }
            if let Some(expression) = &private
                && expression.matches(item)
            {
                item.private = true;
            }
        }

        if skipped > 0 {
            info!("Skipping {} unpublished items", skipped);
        }
        Ok(())
    }
}

impl Plugin for PublishPlugin {
    fn name(&self) -> &str {
        "publish"
    }

    fn priority_for(&self, _stage: Stage) -> Priority {
        Priority::EARLY
    }

    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::build::item::{Item, parse_date};
    use crate::config::Config;

    fn run(config: &Config, items: Vec<Item>) -> Vec<Item> {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut ctx = BuildContext::new(config, PathBuf::new(), runtime.handle().clone()).unwrap();
        ctx.replace_items(items);

        let now = parse_date("2024-06-01").unwrap().to_utc();
        PublishPlugin::at(now).configure(&mut ctx).unwrap();
        ctx.into_store().items
    }

    fn item(slug: &str, f: impl FnOnce(&mut Item)) -> Item {
        let mut item = Item::new(slug);
        f(&mut item);
        item
    }

    #[test]
    fn test_default_rules() {
        let items = vec![
            item("live", |_| {}),
            item("draft", |i| i.draft = true),
            item("hidden", |i| i.published = false),
            item("future", |i| i.date = parse_date("2025-01-01")),
            item("past", |i| i.date = parse_date("2024-01-01")),
        ];

        let items = run(&Config::default(), items);
        let skipped: Vec<_> = items.iter().filter(|i| i.skip).map(|i| i.slug.as_str()).collect();
        assert_eq!(skipped, vec!["draft", "hidden", "future"]);
    }

    #[test]
    fn test_drafts_and_future_enabled() {
        let mut config = Config::default();
        config.build.drafts = true;
        config.build.future = true;

        let items = run(
            &config,
            vec![
                item("draft", |i| i.draft = true),
                item("future", |i| i.date = parse_date("2030-01-01")),
            ],
        );
        assert!(items.iter().all(|i| !i.skip));
    }

    #[test]
    fn test_private_filter() {
        let mut config = Config::default();
        config.build.private = Some(r#"category == "Journal""#.to_string());

        let items = run(
            &config,
            vec![
                item("diary", |i| i.category = Some("Journal".to_string())),
                item("post", |i| i.category = Some("Blog".to_string())),
            ],
        );
        assert!(items[0].private);
        assert!(!items[1].private);
    }

    #[test]
    fn test_invalid_private_filter_fails() {
        let mut config = Config::default();
        config.build.private = Some("category = 'x'".to_string());

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut ctx = BuildContext::new(&config, PathBuf::new(), runtime.handle().clone()).unwrap();
        assert!(PublishPlugin::new().configure(&mut ctx).is_err());
    }
}
