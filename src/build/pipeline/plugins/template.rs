//! Template rendering.
//!
//! Turns every rendered item and every configured feed output into an
//! artifact keyed by href. Nothing touches the filesystem here; the write
//! plugin does that.

use std::collections::{HashMap, HashSet};

use anyhow::Context as _;
use serde::Serialize;
use tracing::{debug, info};

use crate::build::feed::{Feed, FeedOrigin, OutputFormat, page_href};
use crate::build::item::{Item, ItemKind};
use crate::build::pipeline::{BuildContext, Plugin, Render};
use crate::build::render::{
    EntryInfo, GroupInfo, LinkInfo, LinksContext, ListContext, PageContext, PageInfo, PagerInfo,
    Renderer, RssChannel, RssContext, SiteContext,
};

/// File name of a feed's RSS output, relative to the feed href.
pub const RSS_FILE: &str = "index.xml";
/// File name of a feed's JSON Feed output, relative to the feed href.
pub const JSON_FEED_FILE: &str = "feed.json";

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

pub struct TemplatePlugin;

/// Read-only view of the store used while rendering.
struct Site<'a> {
    context: SiteContext,
    by_slug: HashMap<&'a str, &'a Item>,
    feeds: &'a [Feed],
}

impl<'a> Site<'a> {
    fn new(ctx: &'a BuildContext) -> Self {
        Self {
            context: SiteContext {
                name: ctx.config.site.name.clone(),
                url: ctx.config.site.url.clone(),
            },
            by_slug: ctx.items().iter().map(|i| (i.slug.as_str(), i)).collect(),
            feeds: ctx.feeds(),
        }
    }

    /// Absolute URL for `href` when the site URL is configured.
    fn absolute(&self, href: &str) -> String {
        match &self.context.url {
            Some(base) if href.starts_with('/') => {
                format!("{}{}", base.trim_end_matches('/'), href)
            }
            _ => href.to_string(),
        }
    }

    /// Link to `slug`, or `None` when that item is never written.
    fn link(&self, slug: &str) -> Option<LinkInfo> {
        self.by_slug
            .get(slug)
            .filter(|item| item.is_rendered())
            .map(|item| LinkInfo {
            title: item.title(),
            href: item.href.clone(),
        })
    }

    fn links(&self, item: &Item) -> LinksContext {
        let resolve = |slugs: &[String]| slugs.iter().filter_map(|s| self.link(s)).collect();
        LinksContext {
            prev: item.links.prev.as_deref().and_then(|s| self.link(s)),
            next: item.links.next.as_deref().and_then(|s| self.link(s)),
            outbound: resolve(&item.links.outbound),
            inbound: resolve(&item.links.inbound),
        }
    }

    fn entries(&self, slugs: &[String]) -> Vec<EntryInfo> {
        slugs
            .iter()
            .filter_map(|slug| self.by_slug.get(slug.as_str()))
            .map(|item| self.entry(item))
            .collect()
    }

    fn entry(&self, item: &Item) -> EntryInfo {
        EntryInfo {
            title: item.title(),
            href: item.href.clone(),
            url: self.absolute(&item.href),
            description: item.description.clone(),
            date: item.date.map(|d| d.format("%Y-%m-%d").to_string()),
            datetime: item.date.map(|d| d.to_rfc3339()),
            rfc2822: item.date.map(|d| d.to_rfc2822()),
            source: item
                .extra
                .get("source")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }

    /// External feeds shown as groups on the blogroll page.
    fn groups(&self) -> Vec<GroupInfo> {
        self.feeds
            .iter()
            .filter(|feed| feed.origin == FeedOrigin::External)
            .map(|feed| GroupInfo {
                title: feed.title.clone(),
                url: feed.source_url.clone(),
                error: feed.error.clone(),
            })
            .collect()
    }
}

fn page_info(item: &Item) -> PageInfo {
    PageInfo {
        title: item.title(),
        url: item.href.clone(),
        description: item.description.clone(),
        kind: item.kind.as_str(),
        tags: item.tags.clone(),
        category: item.category.clone(),
        date: item.date.map(|d| d.format("%Y-%m-%d").to_string()),
        datetime: item.date.map(|d| d.to_rfc3339()),
        extra: item.extra.clone(),
    }
}

/// Render every page of `feed` through `list.html`.
///
/// `intro` supplies the page title and the text shown above the entries.
fn render_listing(
    renderer: &Renderer,
    site: &Site,
    feed: &Feed,
    intro: &Item,
    out: &mut Vec<(String, String)>,
) -> anyhow::Result<()> {
    let groups = if intro.kind == ItemKind::Blogroll {
        site.groups()
    } else {
        Vec::new()
    };
    let total = feed.total_pages();

    for page in &feed.pages {
        let context = ListContext {
            site: site.context.clone(),
            page: page_info(intro),
            content: intro.html.clone().unwrap_or_default(),
            entries: site.entries(feed.page_slugs(page)),
            groups: groups.clone(),
            error: feed.error.clone(),
            pager: PagerInfo {
                number: page.number,
                total,
                prev: (page.number > 1).then(|| page_href(&feed.href, page.number - 1)),
                next: (page.number < total).then(|| page_href(&feed.href, page.number + 1)),
            },
        };
        let html = renderer
            .render_list(&context)
            .with_context(|| format!("rendering {}", page.href))?;
        out.push((page.href.clone(), html));
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed_url: Option<String>,
    items: Vec<JsonFeedItem>,
}

#[derive(Serialize)]
struct JsonFeedItem {
    id: String,
    url: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_modified: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

fn json_feed(site: &Site, feed: &Feed) -> serde_json::Result<String> {
    let items = feed
        .slugs
        .iter()
        .filter_map(|slug| site.by_slug.get(slug.as_str()))
        .map(|item| {
            let url = site.absolute(&item.href);
            JsonFeedItem {
                id: url.clone(),
                url,
                title: item.title(),
                summary: item.description.clone(),
                content_html: item.html.clone(),
                date_published: item.date.map(|d| d.to_rfc3339()),
                date_modified: item.updated.map(|d| d.to_rfc3339()),
                tags: item.tags.clone(),
            }
        })
        .collect();

    let document = JsonFeed {
        version: JSON_FEED_VERSION,
        title: &feed.title,
        home_page_url: site.context.url.clone(),
        feed_url: site
            .context
            .url
            .as_ref()
            .map(|_| site.absolute(&format!("{}{}", feed.href, JSON_FEED_FILE))),
        items,
    };
    serde_json::to_string_pretty(&document)
}

impl Render for TemplatePlugin {
    fn render(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let theme = ctx.config.site.theme.as_deref().map(|t| ctx.resolve(t));
        let renderer = Renderer::new(theme.as_deref())?;
        let site = Site::new(ctx);
        let mut out: Vec<(String, String)> = Vec::new();

        // Configured HTML feeds own their href; a page at the same href
        // becomes the listing's introduction instead of a page of its own.
        let html_feeds: Vec<&Feed> = site
            .feeds
            .iter()
            .filter(|f| f.origin == FeedOrigin::Configured && f.has_format(OutputFormat::Html))
            .collect();
        let claimed: HashSet<&str> = html_feeds.iter().map(|f| f.href.as_str()).collect();

        for item in ctx.items().iter().filter(|i| i.is_rendered()) {
            if item.kind.is_listing() {
                let fallback;
                let feed = match site.feeds.iter().find(|f| f.name == item.slug) {
                    Some(feed) => feed,
                    None => {
                        fallback = Feed::from_slugs(&item.slug, &item.href, Vec::new(), FeedOrigin::Aggregate);
                        &fallback
                    }
                };
                render_listing(&renderer, &site, feed, item, &mut out)?;
            } else if !claimed.contains(item.href.as_str()) {
                let context = PageContext {
                    site: site.context.clone(),
                    page: page_info(item),
                    content: item.html.clone().unwrap_or_default(),
                    toc: item.toc.clone(),
                    links: site.links(item),
                };
                let html = renderer
                    .render_page(&context)
                    .with_context(|| format!("rendering {}", item.href))?;
                out.push((item.href.clone(), html));
            }
        }

        for feed in site.feeds.iter().filter(|f| f.origin == FeedOrigin::Configured) {
            if feed.has_format(OutputFormat::Html) {
                let intro = ctx
                    .items()
                    .iter()
                    .find(|i| i.href == feed.href && i.is_rendered() && !i.kind.is_listing())
                    .cloned()
                    .unwrap_or_else(|| Item::synthetic(ItemKind::Page, &feed.name, &feed.title));
                render_listing(&renderer, &site, feed, &intro, &mut out)?;
            }
            if feed.has_format(OutputFormat::Rss) {
                let context = RssContext {
                    site: site.context.clone(),
                    feed: RssChannel {
                        title: feed.title.clone(),
                        link: site.absolute(&feed.href),
                    },
                    entries: site.entries(&feed.slugs),
                };
                let xml = renderer
                    .render_rss(&context)
                    .with_context(|| format!("rendering RSS for feed '{}'", feed.name))?;
                out.push((format!("{}{}", feed.href, RSS_FILE), xml));
            }
            if feed.has_format(OutputFormat::Json) {
                let json = json_feed(&site, feed)?;
                out.push((format!("{}{}", feed.href, JSON_FEED_FILE), json));
            }
            debug!("rendered feed {}", feed.name);
        }

        let count = out.len();
        for (href, contents) in out {
            ctx.add_artifact(href, contents);
        }
        info!("Rendered {} artifacts", count);
        Ok(())
    }
}

impl Plugin for TemplatePlugin {
    fn name(&self) -> &str {
        "template"
    }

    fn as_render(&mut self) -> Option<&mut dyn Render> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::build::feed::FeedConfig;
    use crate::build::item::parse_date;
    use crate::config::Config;

    fn post(slug: &str, date: &str, html: &str) -> Item {
        let mut item = Item::new(slug);
        item.title = Some(format!("Post {slug}"));
        item.date = parse_date(date);
        item.html = Some(html.to_string());
        item
    }

    fn artifact<'a>(ctx: &'a BuildContext, href: &str) -> Option<&'a str> {
        ctx.artifacts()
            .iter()
            .find(|a| a.href == href)
            .map(|a| a.contents.as_str())
    }

    #[test]
    fn test_renders_pages_listings_and_feed_formats() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut config = Config::default();
        config.site.url = Some("https://example.com/".to_string());
        let mut ctx = BuildContext::new(&config, PathBuf::new(), runtime.handle().clone()).unwrap();

        let mut a = post("a", "2024-01-01", "<p>first</p>");
        a.links.next = Some("b".to_string());
        let b = post("b", "2024-02-01", "<p>second</p>");
        let mut hidden = post("hidden", "2024-03-01", "<p>x</p>");
        hidden.skip = true;
        ctx.replace_items(vec![a, b, hidden]);

        let mut posts = FeedConfig::new("posts");
        posts.formats = vec![OutputFormat::Html, OutputFormat::Rss, OutputFormat::Json];
        posts.reverse = true;
        posts.page_size = Some(1);
        ctx.replace_feeds(vec![Feed::build(&posts, ctx.items()).unwrap()]);

        TemplatePlugin.render(&mut ctx).unwrap();

        let page = artifact(&ctx, "/a/").unwrap();
        assert!(page.contains("<p>first</p>"));
        // Tera escapes '/' in attribute values, so match on the title
        assert!(page.contains(r#"rel="next""#));
        assert!(page.contains("Post b"));
        assert!(artifact(&ctx, "/hidden/").is_none());

        let first = artifact(&ctx, "/posts/").unwrap();
        assert!(first.contains("Post b"));
        assert!(!first.contains("Post a"));
        assert!(first.contains("Page 1 of 2"));
        assert!(artifact(&ctx, "/posts/page/2/").unwrap().contains("Post a"));

        let rss = artifact(&ctx, "/posts/index.xml").unwrap();
        assert!(rss.contains("<title>Post b</title>"));
        assert!(rss.contains("example.com"));

        let json: serde_json::Value =
            serde_json::from_str(artifact(&ctx, "/posts/feed.json").unwrap()).unwrap();
        assert_eq!(json["version"], JSON_FEED_VERSION);
        assert_eq!(json["items"][0]["url"], "https://example.com/b/");
        assert_eq!(json["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_skipped_items_are_left_out_of_page_links() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = Config::default();
        let mut ctx = BuildContext::new(&config, PathBuf::new(), runtime.handle().clone()).unwrap();

        let mut live = post("live", "2024-01-01", "<p>live</p>");
        live.links.inbound = vec!["draft".to_string()];
        live.links.prev = Some("draft".to_string());
        let mut draft = post("draft", "2024-02-01", "<p>wip</p>");
        draft.skip = true;
        draft.links.outbound = vec!["live".to_string()];
        ctx.replace_items(vec![live, draft]);

        TemplatePlugin.render(&mut ctx).unwrap();

        assert!(artifact(&ctx, "/draft/").is_none());
        let page = artifact(&ctx, "/live/").unwrap();
        assert!(!page.contains("Post draft"));
        assert!(!page.contains(r#"rel="prev""#));
    }

    #[test]
    fn test_blogroll_page_lists_source_errors() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = Config::default();
        let mut ctx = BuildContext::new(&config, PathBuf::new(), runtime.handle().clone()).unwrap();

        ctx.replace_items(vec![Item::synthetic(ItemKind::Blogroll, "blogroll", "Blogroll")]);
        ctx.replace_feeds(vec![
            Feed::external("down", "https://down.example/feed", vec![], Some("timed out".into())),
            Feed::from_slugs("blogroll", "/blogroll/", vec![], FeedOrigin::Aggregate),
        ]);

        TemplatePlugin.render(&mut ctx).unwrap();

        let html = artifact(&ctx, "/blogroll/").unwrap();
        assert!(html.contains("timed out"));
        assert!(html.contains("down.example"));
    }
}
