use std::path::Path;

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("theme not found: {0}")]
    ThemeNotFound(String),
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{ page.title }} | {{ site.name }}</title>
  {% if page.description %}<meta name="description" content="{{ page.description }}">{% endif %}
</head>
<body>
  <header><a href="/">{{ site.name }}</a></header>
  <main>
    <article>
      <h1>{{ page.title }}</h1>
      {% if page.date %}<time datetime="{{ page.datetime }}">{{ page.date }}</time>{% endif %}
      {% if page.tags %}<ul class="tags">{% for tag in page.tags %}<li>{{ tag }}</li>{% endfor %}</ul>{% endif %}
      {{ content | safe }}
    </article>
    {% if links.inbound %}
    <aside class="backlinks">
      <h2>Linked from</h2>
      <ul>{% for link in links.inbound %}<li><a href="{{ link.href }}">{{ link.title }}</a></li>{% endfor %}</ul>
    </aside>
    {% endif %}
    <nav class="sequence">
      {% if links.prev %}<a rel="prev" href="{{ links.prev.href }}">{{ links.prev.title }}</a>{% endif %}
      {% if links.next %}<a rel="next" href="{{ links.next.href }}">{{ links.next.title }}</a>{% endif %}
    </nav>
  </main>
</body>
</html>
"#;

const LIST_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{ page.title }} | {{ site.name }}</title>
</head>
<body>
  <header><a href="/">{{ site.name }}</a></header>
  <main>
    <h1>{{ page.title }}</h1>
    {{ content | safe }}
    {% if error %}<p class="error">{{ error }}</p>{% endif %}
    <ul class="entries">
      {% for entry in entries %}
      <li><a href="{{ entry.href }}">{{ entry.title }}</a>{% if entry.date %} <time datetime="{{ entry.datetime }}">{{ entry.date }}</time>{% endif %}{% if entry.source %} <span class="source">{{ entry.source }}</span>{% endif %}</li>
      {% endfor %}
    </ul>
    {% for group in groups %}
    <section class="feed">
      <h2>{% if group.url %}<a href="{{ group.url }}">{{ group.title }}</a>{% else %}{{ group.title }}{% endif %}</h2>
      {% if group.error %}<p class="error">{{ group.error }}</p>{% endif %}
    </section>
    {% endfor %}
    <nav class="pager">
      {% if pager.prev %}<a rel="prev" href="{{ pager.prev }}">Previous</a>{% endif %}
      {% if pager.total > 1 %}<span>Page {{ pager.number }} of {{ pager.total }}</span>{% endif %}
      {% if pager.next %}<a rel="next" href="{{ pager.next }}">Next</a>{% endif %}
    </nav>
  </main>
</body>
</html>
"#;

const RSS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>{{ feed.title }}</title>
  <link>{{ feed.link }}</link>
  <description>{{ feed.title }} | {{ site.name }}</description>
  {% for entry in entries %}
  <item>
    <title>{{ entry.title }}</title>
    <link>{{ entry.url }}</link>
    <guid>{{ entry.url }}</guid>
    {% if entry.rfc2822 %}<pubDate>{{ entry.rfc2822 }}</pubDate>{% endif %}
    {% if entry.description %}<description>{{ entry.description }}</description>{% endif %}
  </item>
  {% endfor %}
</channel>
</rss>
"#;

/// Renders items and listings through Tera.
///
/// Built-in templates (`page.html`, `list.html`, `rss.xml`) are always
/// available; a theme directory overrides any of them by name.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Create a renderer, loading theme templates when a theme is configured.
    pub fn new(theme_path: Option<&Path>) -> Result<Self, RenderError> {
        let builtin = builtin_templates()?;

        let Some(theme_path) = theme_path else {
            return Ok(Self { tera: builtin });
        };

        let templates_path = theme_path.join("templates");
        if !templates_path.exists() {
            return Err(RenderError::ThemeNotFound(
                theme_path.display().to_string(),
            ));
        }

        let glob = templates_path.join("**/*");
        let glob_str = glob.to_string_lossy();
        let mut tera = Tera::new(&glob_str)?;
        // extend() keeps existing names, so theme templates win
        tera.extend(&builtin)?;

        Ok(Self { tera })
    }

    /// Render a content page.
    pub fn render_page(&self, context: &PageContext) -> Result<String, RenderError> {
        let mut tera_context = Context::new();
        tera_context.insert("site", &context.site);
        tera_context.insert("page", &context.page);
        tera_context.insert("content", &context.content);
        tera_context.insert("toc", &context.toc);
        tera_context.insert("links", &context.links);

        Ok(self.tera.render("page.html", &tera_context)?)
    }

    /// Render one page of a listing (taxonomy, archive, feed or blogroll).
    pub fn render_list(&self, context: &ListContext) -> Result<String, RenderError> {
        let mut tera_context = Context::new();
        tera_context.insert("site", &context.site);
        tera_context.insert("page", &context.page);
        tera_context.insert("content", &context.content);
        tera_context.insert("entries", &context.entries);
        tera_context.insert("groups", &context.groups);
        tera_context.insert("error", &context.error);
        tera_context.insert("pager", &context.pager);

        Ok(self.tera.render("list.html", &tera_context)?)
    }

    /// Render an RSS 2.0 document for a feed.
    pub fn render_rss(&self, context: &RssContext) -> Result<String, RenderError> {
        let mut tera_context = Context::new();
        tera_context.insert("site", &context.site);
        tera_context.insert("feed", &context.feed);
        tera_context.insert("entries", &context.entries);

        Ok(self.tera.render("rss.xml", &tera_context)?)
    }
}

fn builtin_templates() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("page.html", PAGE_TEMPLATE),
        ("list.html", LIST_TEMPLATE),
        ("rss.xml", RSS_TEMPLATE),
    ])?;
    Ok(tera)
}

// =============================================================================
// Template contexts
// =============================================================================

/// Values exposed to every template as `site`.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    pub name: String,
    pub url: Option<String>,
}

/// The item being rendered, exposed as `page`.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub kind: &'static str,
    pub tags: Vec<String>,
    pub category: Option<String>,
    /// `YYYY-MM-DD`, for display
    pub date: Option<String>,
    /// RFC 3339, for `datetime` attributes
    pub datetime: Option<String>,
    /// Unrecognised front matter keys, readable as `page.<key>`
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_yaml::Value>,
}

/// A resolved reference to another item.
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    pub title: String,
    pub href: String,
}

/// Cross-references available to page templates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinksContext {
    pub prev: Option<LinkInfo>,
    pub next: Option<LinkInfo>,
    pub outbound: Vec<LinkInfo>,
    pub inbound: Vec<LinkInfo>,
}

/// Context passed to `page.html`.
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub site: SiteContext,
    pub page: PageInfo,
    pub content: String,
    /// Headings in document order
    pub toc: Vec<TocEntry>,
    pub links: LinksContext,
}

/// One entry in a listing or feed document.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub title: String,
    pub href: String,
    /// Absolute URL when the site URL is known, otherwise the href
    pub url: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub datetime: Option<String>,
    pub rfc2822: Option<String>,
    /// Originating external feed, for blogroll entries
    pub source: Option<String>,
}

/// An external feed shown on the blogroll page.
#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    pub title: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Pagination links for a listing page.
#[derive(Debug, Clone, Serialize)]
pub struct PagerInfo {
    pub number: usize,
    pub total: usize,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Context passed to `list.html`.
#[derive(Debug, Serialize)]
pub struct ListContext {
    pub site: SiteContext,
    pub page: PageInfo,
    pub content: String,
    pub entries: Vec<EntryInfo>,
    pub groups: Vec<GroupInfo>,
    pub error: Option<String>,
    pub pager: PagerInfo,
}

/// Channel information for `rss.xml`.
#[derive(Debug, Clone, Serialize)]
pub struct RssChannel {
    pub title: String,
    pub link: String,
}

/// Context passed to `rss.xml`.
#[derive(Debug, Serialize)]
pub struct RssContext {
    pub site: SiteContext,
    pub feed: RssChannel,
    pub entries: Vec<EntryInfo>,
}

/// One heading collected while rendering markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    /// The heading text
    pub text: String,
    /// Anchor target in the rendered HTML
    pub id: String,
    /// 1 for `<h1>` through 6 for `<h6>`
    pub level: u8,
}
