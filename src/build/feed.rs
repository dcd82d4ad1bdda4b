//! Feeds: named, filtered, sorted, paginated views over items.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::item::Item;
use crate::filter::{Expression, SyntaxError};

// =============================================================================
// Feed configuration
// =============================================================================

/// The attribute a feed is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Updated,
    Title,
    Slug,
}

/// Output documents generated for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Paginated listing pages
    Html,
    /// RSS 2.0 at `<href>index.xml`
    Rss,
    /// JSON Feed 1.1 at `<href>feed.json`
    Json,
}

/// One entry of the `feeds` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Filter expression; every listed item matches when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
    /// Reverse the sort (newest first for dates)
    #[serde(default)]
    pub reverse: bool,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// A trailing page with at most this many items is merged into the previous one
    #[serde(default)]
    pub orphans: usize,
    #[serde(default)]
    pub include_private: bool,
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Html]
}

impl FeedConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            filter: None,
            sort: SortKey::default(),
            reverse: false,
            formats: default_formats(),
            page_size: None,
            orphans: 0,
            include_private: false,
        }
    }
}

// =============================================================================
// Feeds
// =============================================================================

/// Where a feed came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrigin {
    /// The `feeds` config section
    #[default]
    Configured,
    /// A tag, category or archive listing
    Taxonomy,
    /// One external blogroll source
    External,
    /// Several feeds merged into one
    Aggregate,
}

/// One page of a paginated feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub href: String,
    /// Index range into the feed's `slugs`
    pub start: usize,
    pub end: usize,
}

/// A derived, ordered view over items.
///
/// Feeds reference items by slug; the items themselves stay in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub name: String,
    pub title: String,
    /// Base path of the feed's outputs, e.g. `/posts/`
    pub href: String,
    pub slugs: Vec<String>,
    pub pages: Vec<Page>,
    pub formats: Vec<OutputFormat>,
    pub origin: FeedOrigin,
    /// Remote location, for external feeds
    pub source_url: Option<String>,
    /// Why the feed could not be loaded, if it could not
    pub error: Option<String>,
}

impl Feed {
    /// Derive a feed from its configuration.
    ///
    /// Only listed items are considered (see [`Item::is_listed`]), and
    /// listing pages never list each other. Building twice from the same
    /// config and items yields the same feed.
    pub fn build(config: &FeedConfig, items: &[Item]) -> Result<Feed, SyntaxError> {
        let expression = config.filter.as_deref().map(Expression::parse).transpose()?;

        let mut selected: Vec<&Item> = items
            .iter()
            .filter(|item| !item.kind.is_listing() && item.is_listed(config.include_private))
            .filter(|item| expression.as_ref().is_none_or(|e| e.matches(item)))
            .collect();
        sort_items(&mut selected, config.sort, config.reverse);

        let href = format!("/{}/", config.name.trim_matches('/'));
        let slugs = selected.iter().map(|item| item.slug.clone()).collect();
        let mut feed = Feed::from_slugs(&config.name, href, slugs, FeedOrigin::Configured);
        feed.title = config.title.clone().unwrap_or_else(|| config.name.clone());
        feed.formats = config.formats.clone();
        feed.paginate(config.page_size, config.orphans);
        Ok(feed)
    }

    /// A single-page feed over `slugs`, in the given order.
    pub fn from_slugs(
        name: impl Into<String>,
        href: impl Into<String>,
        slugs: Vec<String>,
        origin: FeedOrigin,
    ) -> Feed {
        let name = name.into();
        let href = href.into();
        let pages = vec![Page {
            number: 1,
            href: href.clone(),
            start: 0,
            end: slugs.len(),
        }];
        Feed {
            title: name.clone(),
            name,
            href,
            slugs,
            pages,
            formats: Vec::new(),
            origin,
            source_url: None,
            error: None,
        }
    }

    /// The record for one external source, successful or not.
    pub fn external(
        name: impl Into<String>,
        source_url: impl Into<String>,
        slugs: Vec<String>,
        error: Option<String>,
    ) -> Feed {
        let name = name.into();
        let href = format!("/blogroll/{}/", name);
        let mut feed = Feed::from_slugs(name, href, slugs, FeedOrigin::External);
        feed.source_url = Some(source_url.into());
        feed.error = error;
        feed
    }

    /// Split the feed into pages of `page_size`, merging a short trailing page.
    pub fn paginate(&mut self, page_size: Option<usize>, orphans: usize) {
        self.pages = paginate(self.slugs.len(), page_size, orphans)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Page {
                number: i + 1,
                href: page_href(&self.href, i + 1),
                start,
                end,
            })
            .collect();
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Slugs on the given page.
    pub fn page_slugs(&self, page: &Page) -> &[String] {
        &self.slugs[page.start.min(self.slugs.len())..page.end.min(self.slugs.len())]
    }

    pub fn has_format(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.iter().any(|s| s == slug)
    }
}

/// Compute page ranges for `len` items.
///
/// Always yields at least one (possibly empty) page. A trailing page with
/// `orphans` or fewer items is folded into the page before it.
pub fn paginate(len: usize, page_size: Option<usize>, orphans: usize) -> Vec<(usize, usize)> {
    let size = match page_size {
        Some(size) if size > 0 && size < len => size,
        _ => return vec![(0, len)],
    };

    let mut pages = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + size).min(len);
        pages.push((start, end));
        start = end;
    }

    if pages.len() > 1 {
        let (last_start, last_end) = pages[pages.len() - 1];
        if last_end - last_start <= orphans {
            pages.pop();
            if let Some(previous) = pages.last_mut() {
                previous.1 = last_end;
            }
        }
    }
    pages
}

/// Href of page `number` of a feed rooted at `base`.
pub fn page_href(base: &str, number: usize) -> String {
    if number <= 1 {
        base.to_string()
    } else {
        format!("{}page/{}/", base, number)
    }
}

/// Stable sort of items by `key`.
///
/// Items missing the key always go last, in their original order, whether
/// or not `reverse` is set.
pub fn sort_items(items: &mut [&Item], key: SortKey, reverse: bool) {
    items.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Date => compare_present(a.date.as_ref(), b.date.as_ref()),
            SortKey::Updated => compare_present(
                a.updated.as_ref().or(a.date.as_ref()),
                b.updated.as_ref().or(b.date.as_ref()),
            ),
            SortKey::Title => Some(a.title().cmp(&b.title())),
            SortKey::Slug => Some(a.slug.cmp(&b.slug)),
        };
        match ordering {
            Some(ordering) if reverse => ordering.reverse(),
            Some(ordering) => ordering,
            None => missing_last(a, b, key),
        }
    });
}

fn compare_present<T: Ord>(a: Option<&T>, b: Option<&T>) -> Option<Ordering> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn missing_last(a: &Item, b: &Item, key: SortKey) -> Ordering {
    let present = |item: &Item| match key {
        SortKey::Date => item.date.is_some(),
        SortKey::Updated => item.updated.is_some() || item.date.is_some(),
        SortKey::Title | SortKey::Slug => true,
    };
    present(b).cmp(&present(a))
}
