use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::document::FrontMatter;
use super::render::TocEntry;
use crate::util::title_case;

// =============================================================================
// Items
// =============================================================================

/// What produced an item.
///
/// Every item shares the same shape; the kind only tells templates and
/// later stages how it came to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A markdown file from the content directory
    #[default]
    Page,
    /// Listing page for one tag
    Tag,
    /// Listing page for one category
    Category,
    /// Listing page for one calendar month
    Archive,
    /// Aggregate page for the external feeds
    Blogroll,
    /// One entry of an external feed
    Remote,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Page => "page",
            ItemKind::Tag => "tag",
            ItemKind::Category => "category",
            ItemKind::Archive => "archive",
            ItemKind::Blogroll => "blogroll",
            ItemKind::Remote => "remote",
        }
    }

    /// Kinds rendered as a list of their feed's entries.
    pub fn is_listing(self) -> bool {
        matches!(
            self,
            ItemKind::Tag | ItemKind::Category | ItemKind::Archive | ItemKind::Blogroll
        )
    }
}

/// Cross-references between items, filled in by the transform stage.
///
/// Links are stored as slugs so they stay valid when the item collection
/// is replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    pub prev: Option<String>,
    pub next: Option<String>,
    /// Items this item links to, in document order
    pub outbound: Vec<String>,
    /// Items linking to this item, in store order
    pub inbound: Vec<String>,
}

/// A unit of content flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier, unique across the store
    pub slug: String,
    /// Output URL path (internal items) or external URL (remote entries)
    pub href: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,
    pub published: bool,
    pub draft: bool,
    pub private: bool,
    /// Keep the item resolvable but never render or write it
    pub skip: bool,
    pub kind: ItemKind,
    /// Plugin-specific metadata (front matter fields not modelled above)
    pub extra: BTreeMap<String, serde_yaml::Value>,
    pub links: Links,
    /// Path relative to the content directory; `None` for synthetic items
    pub source_path: Option<PathBuf>,
    /// Markdown body (front matter removed)
    pub content: String,
    /// Rendered HTML fragment, set by the markdown plugin
    pub html: Option<String>,
    pub toc: Vec<TocEntry>,
}

impl Item {
    /// Create a published page item with the default href for `slug`.
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        let href = slug_to_href(&slug);
        Self {
            slug,
            href,
            title: None,
            description: None,
            tags: Vec::new(),
            category: None,
            date: None,
            updated: None,
            published: true,
            draft: false,
            private: false,
            skip: false,
            kind: ItemKind::Page,
            extra: BTreeMap::new(),
            links: Links::default(),
            source_path: None,
            content: String::new(),
            html: None,
            toc: Vec::new(),
        }
    }

    /// Create a synthetic item registered by a plugin.
    pub fn synthetic(kind: ItemKind, slug: impl Into<String>, title: impl Into<String>) -> Self {
        let mut item = Self::new(slug);
        item.kind = kind;
        item.title = Some(title.into());
        item
    }

    /// Build an item from a source file's front matter and body.
    pub fn from_source(
        slug: String,
        source_path: PathBuf,
        front_matter: FrontMatter,
        content: String,
    ) -> Self {
        let mut item = Self::new(slug);
        item.source_path = Some(source_path);
        item.content = content;
        item.title = front_matter.title;
        item.description = front_matter.description;
        item.tags = front_matter.tags;
        item.category = front_matter.category;
        item.date = front_matter.date.as_deref().and_then(parse_date);
        item.updated = front_matter.updated.as_deref().and_then(parse_date);
        item.published = front_matter.published.unwrap_or(true);
        item.draft = front_matter.draft;
        item.private = front_matter.private;
        item.extra = front_matter.extra;
        item
    }

    /// Get the item title, falling back to the last slug segment.
    pub fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            let last = self.slug.rsplit('/').next().unwrap_or(&self.slug);
            if last.is_empty() {
                "Untitled".to_string()
            } else {
                title_case(last)
            }
        })
    }

    /// Returns true if this item should be rendered and written.
    pub fn is_rendered(&self) -> bool {
        !self.skip
    }

    /// Returns true if this item may appear in feeds and listings.
    ///
    /// Private items only qualify when `include_private` is set.
    pub fn is_listed(&self, include_private: bool) -> bool {
        !self.skip && self.published && !self.draft && (include_private || !self.private)
    }

    /// Look up a (possibly nested) extension field.
    pub fn extra_path(&self, path: &[String]) -> Option<&serde_yaml::Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.extra.get(first)?;
        for key in rest {
            value = value.as_mapping()?.get(key.as_str())?;
        }
        Some(value)
    }
}

/// Default href for a slug: `/<slug>/`, with `index` mapping to the site root.
pub fn slug_to_href(slug: &str) -> String {
    let slug = slug.trim_matches('/');
    if slug.is_empty() || slug == "index" {
        "/".to_string()
    } else {
        format!("/{slug}/")
    }
}

/// Parse a date from front matter or a filter literal.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00+01:00`), a naive date-time
/// (`2024-03-01 10:00:00`, read as UTC) and a bare date (`2024-03-01`,
/// midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date);
    }
    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    let naive = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    utc.from_local_datetime(&naive.and_hms_opt(0, 0, 0)?).single()
}

/// Convert a UTC timestamp to the fixed-offset form items carry.
pub fn to_fixed(date: DateTime<Utc>) -> DateTime<FixedOffset> {
    date.fixed_offset()
}
