//! Tag, category and monthly archive listings.
//!
//! During configure one synthetic listing item is registered per term; during
//! collect each listing gets a feed built from a generated filter, so the
//! listing pages go through exactly the same selection path as configured
//! feeds.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context as _;
use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::build::feed::{Feed, FeedConfig, FeedOrigin, SortKey};
use crate::build::item::{Item, ItemKind};
use crate::build::pipeline::{BuildContext, Collect, Configure, Plugin, Priority, Stage};
use crate::config::TaxonomyConfig;
use crate::util::{quote_literal, slugify};

/// Extension key holding the term a listing stands for, as first spelled.
const TERM: &str = "term";
/// Extension key holding every spelling that maps to the listing's slug.
const SPELLINGS: &str = "spellings";

/// Distinct spellings of each term, grouped by slug in first-seen order.
type Terms = BTreeMap<String, Vec<String>>;

fn add_spelling(terms: &mut Terms, term: &str) {
    let spellings = terms.entry(slugify(term)).or_default();
    if !spellings.iter().any(|s| s == term) {
        spellings.push(term.to_string());
    }
}

pub struct TaxonomyPlugin {
    config: TaxonomyConfig,
}

impl TaxonomyPlugin {
    pub fn new(config: TaxonomyConfig) -> Self {
        Self { config }
    }

    /// Listing items for the current item set, in a stable order.
    fn listings(&self, items: &[Item]) -> Vec<Item> {
        let mut tags = Terms::new();
        let mut categories = Terms::new();
        let mut months: BTreeSet<(i32, u32)> = BTreeSet::new();

        for item in items
            .iter()
            .filter(|item| item.kind == ItemKind::Page && item.is_listed(false))
        {
            if self.config.tags {
                for tag in &item.tags {
                    add_spelling(&mut tags, tag);
                }
            }
            if self.config.categories
                && let Some(category) = &item.category
            {
                add_spelling(&mut categories, category);
            }
            if self.config.archives
                && let Some(date) = item.date
            {
                // Archive filters compare in UTC, so bucket in UTC too
                let date = date.to_utc();
                months.insert((date.year(), date.month()));
            }
        }

        let mut listings = Vec::new();
        for (slug, spellings) in tags.into_iter().filter(|(slug, _)| !slug.is_empty()) {
            listings.push(term_item(ItemKind::Tag, format!("tags/{slug}"), &spellings));
        }
        for (slug, spellings) in categories.into_iter().filter(|(slug, _)| !slug.is_empty()) {
            listings.push(term_item(
                ItemKind::Category,
                format!("categories/{slug}"),
                &spellings,
            ));
        }
        for (year, month) in months {
            listings.push(archive_item(year, month));
        }
        listings
    }
}

/// A tag or category listing titled after the first spelling seen.
fn term_item(kind: ItemKind, slug: String, spellings: &[String]) -> Item {
    let term = spellings.first().cloned().unwrap_or_default();
    let mut item = Item::synthetic(kind, slug, term.clone());
    item.extra.insert(TERM.to_string(), term.into());
    item.extra.insert(
        SPELLINGS.to_string(),
        serde_yaml::Value::Sequence(spellings.iter().map(|s| s.as_str().into()).collect()),
    );
    item
}

/// `spellings` joined into one alternative per spelling.
fn any_spelling(item: &Item, clause: impl Fn(&str) -> String) -> Option<String> {
    let spellings: Vec<String> = item
        .extra
        .get(SPELLINGS)?
        .as_sequence()?
        .iter()
        .filter_map(|v| v.as_str())
        .map(|term| clause(&quote_literal(term)))
        .collect();
    (!spellings.is_empty()).then(|| spellings.join(" or "))
}

fn archive_item(year: i32, month: u32) -> Item {
    let title = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"));
    let mut item = Item::synthetic(ItemKind::Archive, format!("archive/{year}/{month:02}"), title);
    item.extra.insert("year".to_string(), year.into());
    item.extra.insert("month".to_string(), month.into());
    item
}

/// The filter selecting the members of a listing.
fn listing_filter(item: &Item) -> Option<String> {
    match item.kind {
        ItemKind::Tag => any_spelling(item, |term| format!("{term} in tags")),
        ItemKind::Category => any_spelling(item, |term| format!("category == {term}")),
        ItemKind::Archive => {
            let year = item.extra.get("year")?.as_i64()?;
            let month = item.extra.get("month")?.as_i64()?;
            let (next_year, next_month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            Some(format!(
                r#"date >= "{year:04}-{month:02}-01" and date < "{next_year:04}-{next_month:02}-01""#
            ))
        }
        _ => None,
    }
}

impl Configure for TaxonomyPlugin {
    fn configure(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let listings = self.listings(ctx.items());
        let mut added = 0;
        for listing in listings {
            if ctx.item(&listing.slug).is_some() {
                warn!("not generating {}: slug already in use", listing.slug);
                continue;
            }
            ctx.append_item(listing);
            added += 1;
        }
        info!("Registered {} taxonomy pages", added);
        Ok(())
    }
}

impl Collect for TaxonomyPlugin {
    fn collect(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let mut feeds = Vec::new();
        for listing in ctx
            .items()
            .iter()
            .filter(|item| matches!(item.kind, ItemKind::Tag | ItemKind::Category | ItemKind::Archive))
        {
            let Some(filter) = listing_filter(listing) else {
                continue;
            };
            let mut config = FeedConfig::new(listing.slug.clone());
            config.title = Some(listing.title());
            config.filter = Some(filter);
            config.sort = SortKey::Date;
            config.reverse = true;
            config.page_size = self.config.page_size;

            let mut feed = Feed::build(&config, ctx.items())
                .with_context(|| format!("building listing '{}'", listing.slug))?;
            feed.origin = FeedOrigin::Taxonomy;
            feeds.push(feed);
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

impl Plugin for TaxonomyPlugin {
    fn name(&self) -> &str {
        "taxonomy"
    }

    fn priority_for(&self, stage: Stage) -> Priority {
        match stage {
            Stage::Collect => Priority::EARLY,
            _ => Priority::DEFAULT,
        }
    }

    fn as_configure(&mut self) -> Option<&mut dyn Configure> {
        Some(self)
    }

    fn as_collect(&mut self) -> Option<&mut dyn Collect> {
        Some(self)
    }
}
