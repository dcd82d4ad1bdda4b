//! Markdown rendering with TOC extraction and link discovery.

use std::collections::HashSet;

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use super::render::TocEntry;
use crate::config::MarkdownConfig;
use crate::util::slugify;

#[derive(thiserror::Error, Debug)]
pub enum MarkdownError {
    #[error("invalid markdown extension: {0}")]
    InvalidExtension(String),
}

/// Rendered HTML plus the headings it contains.
pub struct MarkdownOutput {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Translate configured extension names into parser options.
pub fn parser_options(markdown_config: &MarkdownConfig) -> Result<Options, MarkdownError> {
    let mut options = Options::empty();
    for extension in &markdown_config.extensions {
        match extension.as_str() {
            "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
            "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
            "gfm" => options.insert(Options::ENABLE_GFM),
            "heading_attributes" => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
            "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
            "tables" => options.insert(Options::ENABLE_TABLES),
            "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
            other => return Err(MarkdownError::InvalidExtension(other.to_string())),
        }
    }
    Ok(options)
}

/// A heading whose id is generated once its text is known.
struct OpenHeading {
    level: HeadingLevel,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    text: String,
}

impl OpenHeading {
    fn start(level: HeadingLevel, classes: &[CowStr], attrs: &[(CowStr, Option<CowStr>)]) -> Self {
        Self {
            level,
            classes: classes.iter().map(|c| c.to_string()).collect(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.as_ref().map(|v| v.to_string())))
                .collect(),
            text: String::new(),
        }
    }

    fn to_html(&self, id: &str) -> String {
        let level = self.level as usize;
        let mut open = format!("<h{level} id=\"{id}\"");
        if !self.classes.is_empty() {
            open.push_str(&format!(" class=\"{}\"", self.classes.join(" ")));
        }
        for (key, value) in &self.attrs {
            match value {
                Some(value) => open.push_str(&format!(" {key}=\"{value}\"")),
                None => open.push_str(&format!(" {key}")),
            }
        }
        format!(
            "{open}>{} <a class=\"header-anchor\" href=\"#{id}\" aria-label=\"Link to this heading\">#</a></h{level}>",
            escape_text(&self.text)
        )
    }
}

/// Ids already present on the page; generated ids get a numeric suffix on collision.
#[derive(Default)]
struct HeadingIds(HashSet<String>);

impl HeadingIds {
    fn reserve(&mut self, id: &str) {
        self.0.insert(id.to_string());
    }

    fn claim(&mut self, text: &str) -> String {
        let base = match slugify(text) {
            slug if slug.is_empty() => "section".to_string(),
            slug => slug,
        };
        let mut id = base.clone();
        let mut n = 1;
        while self.0.contains(&id) {
            id = format!("{base}-{n}");
            n += 1;
        }
        self.0.insert(id.clone());
        id
    }
}

/// Render markdown to HTML using pulldown-cmark.
///
/// Headings without an explicit id get a unique slug id and a permalink
/// anchor, and are collected into the table of contents.
pub fn render_markdown(markdown: &str, options: Options) -> MarkdownOutput {
    let mut ids = HeadingIds::default();
    let mut open: Option<OpenHeading> = None;
    let mut toc = Vec::new();
    let mut events = Vec::new();

    for event in Parser::new_ext(markdown, options) {
        if let Some(heading) = open.as_mut() {
            match event {
                Event::Text(text) | Event::Code(text) => heading.text.push_str(&text),
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(heading) = open.take() {
                        let id = ids.claim(&heading.text);
                        events.push(Event::Html(heading.to_html(&id).into()));
                        toc.push(TocEntry {
                            level: heading.level as u8,
                            id,
                            text: heading.text,
                        });
                    }
                }
                // Inline markup inside a generated heading is flattened to its text
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::Heading {
                level,
                id: None,
                classes,
                attrs,
            }) => open = Some(OpenHeading::start(level, &classes, &attrs)),
            Event::Start(Tag::Heading {
                id: Some(ref id), ..
            }) => {
                ids.reserve(id);
                events.push(event);
            }
            event => events.push(event),
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());
    MarkdownOutput {
        html: html_output,
        toc,
    }
}

/// Collect link destinations from markdown, in document order.
pub fn extract_links(markdown: &str) -> Vec<String> {
    Parser::new(markdown)
        .filter_map(|event| match event {
            Event::Start(Tag::Link { dest_url, .. }) => Some(dest_url.to_string()),
            _ => None,
        })
        .collect()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
