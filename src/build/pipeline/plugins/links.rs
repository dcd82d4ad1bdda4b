//! Cross-references between items.
//!
//! Outbound links are extracted from every item's markdown on the worker
//! pool; inbound links and prev/next neighbours are derived afterwards in a
//! single pass over the store.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

use tracing::debug;

use crate::build::feed::{Feed, FeedOrigin};
use crate::build::item::{Item, ItemKind};
use crate::build::markdown::extract_links;
use crate::build::paths::resolve_link;
use crate::build::pipeline::{BuildContext, Plugin, Transform};

pub struct LinksPlugin;

/// Map every internal href to its item's slug.
fn href_index(items: &[Item]) -> HashMap<String, String> {
    items
        .iter()
        .filter(|item| item.kind != ItemKind::Remote)
        .map(|item| (item.href.clone(), item.slug.clone()))
        .collect()
}

/// Slugs `item` links to, in document order, without duplicates or self-links.
fn outbound(item: &Item, hrefs: &HashMap<String, String>) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_links(&item.content)
        .iter()
        .filter_map(|dest| resolve_link(dest, &item.href))
        .filter_map(|href| hrefs.get(&href).cloned())
        .filter(|slug| *slug != item.slug && seen.insert(slug.clone()))
        .collect()
}

/// Fill `inbound` from every item's `outbound`, in store order.
fn fill_inbound(items: &mut [Item]) {
    let mut inbound: HashMap<String, Vec<String>> = HashMap::new();
    for item in items.iter() {
        for target in &item.links.outbound {
            inbound
                .entry(target.clone())
                .or_default()
                .push(item.slug.clone());
        }
    }
    for item in items.iter_mut() {
        item.links.inbound = inbound.remove(&item.slug).unwrap_or_default();
    }
}

/// Set prev/next along configured feeds; the first feed listing an item wins.
fn fill_sequence(items: &mut [Item], feeds: &[Feed]) {
    let index: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.slug.clone(), i))
        .collect();
    let mut assigned: HashSet<&str> = HashSet::new();

    for feed in feeds.iter().filter(|f| f.origin == FeedOrigin::Configured) {
        for (position, slug) in feed.slugs.iter().enumerate() {
            if !assigned.insert(slug.as_str()) {
                continue;
            }
            let Some(&i) = index.get(slug) else {
                continue;
            };
            let links = &mut items[i].links;
            links.prev = position
                .checked_sub(1)
                .and_then(|p| feed.slugs.get(p))
                .cloned();
            links.next = feed.slugs.get(position + 1).cloned();
        }
    }
}

impl Transform for LinksPlugin {
    fn transform(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let hrefs = href_index(ctx.items());

        ctx.run_concurrently(|item| {
            if item.source_path.is_some() {
                item.links.outbound = outbound(item, &hrefs);
            }
            Ok::<(), Infallible>(())
        })?;

        let feeds = ctx.feeds().to_vec();
        let items = ctx.items_mut();
        fill_inbound(items);
        fill_sequence(items, &feeds);

        let edges: usize = ctx.items().iter().map(|i| i.links.outbound.len()).sum();
        debug!("resolved {} internal links", edges);
        Ok(())
    }
}

impl Plugin for LinksPlugin {
    fn name(&self) -> &str {
        "links"
    }

    fn as_transform(&mut self) -> Option<&mut dyn Transform> {
        Some(self)
    }
}
