//! Output writing.
//!
//! Writes rendered artifacts, copies assets, and emits the link graph.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use tracing::info;

use crate::build::item::{Item, ItemKind};
use crate::build::paths::href_to_output_path;
use crate::build::pipeline::{BuildContext, Plugin, Write};

/// Href of the JSON link graph.
pub const GRAPH_HREF: &str = "/graph.json";

pub struct WritePlugin;

#[derive(Debug, Serialize)]
struct GraphNode<'a> {
    slug: &'a str,
    href: &'a str,
    title: String,
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct GraphEdge<'a> {
    source: &'a str,
    target: &'a str,
}

#[derive(Debug, Serialize)]
struct Graph<'a> {
    nodes: Vec<GraphNode<'a>>,
    edges: Vec<GraphEdge<'a>>,
}

/// Nodes are rendered internal items; edges are outbound links between nodes.
fn link_graph(items: &[Item]) -> serde_json::Result<String> {
    let nodes: Vec<GraphNode> = items
        .iter()
        .filter(|item| item.is_rendered() && item.kind != ItemKind::Remote)
        .map(|item| GraphNode {
            slug: &item.slug,
            href: &item.href,
            title: item.title(),
            kind: item.kind.as_str(),
        })
        .collect();
    let written: HashSet<&str> = nodes.iter().map(|node| node.slug).collect();
    let edges = items
        .iter()
        .filter(|item| written.contains(item.slug.as_str()))
        .flat_map(|item| {
            item.links
                .outbound
                .iter()
                .filter(|target| written.contains(target.as_str()))
                .map(move |target| GraphEdge {
                    source: &item.slug,
                    target,
                })
        })
        .collect();
    serde_json::to_string_pretty(&Graph { nodes, edges })
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

impl Write for WritePlugin {
    fn write(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let output_dir = ctx.output_dir();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;

        for artifact in ctx.artifacts() {
            let path = href_to_output_path(&artifact.href, &output_dir);
            write_file(&path, &artifact.contents)?;
        }

        for asset in ctx.assets() {
            let target = output_dir.join(&asset.relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::copy(&asset.source, &target)
                .with_context(|| format!("copying {}", asset.source.display()))?;
        }

        let graph = link_graph(ctx.items())?;
        write_file(&href_to_output_path(GRAPH_HREF, &output_dir), &graph)?;

        info!(
            "Wrote {} files and copied {} assets to {}",
            ctx.artifacts().len() + 1,
            ctx.assets().len(),
            output_dir.display()
        );
        Ok(())
    }
}

impl Plugin for WritePlugin {
    fn name(&self) -> &str {
        "write"
    }

    fn as_write(&mut self) -> Option<&mut dyn Write> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::pipeline::Asset;
    use crate::config::Config;

    #[test]
    fn test_writes_artifacts_assets_and_graph() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("content/img/logo.png");
        std::fs::create_dir_all(image.parent().unwrap()).unwrap();
        std::fs::write(&image, b"png").unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = Config::default();
        let mut ctx =
            BuildContext::new(&config, dir.path().to_path_buf(), runtime.handle().clone()).unwrap();

        let mut a = Item::new("a");
        a.links.outbound = vec!["draft".to_string(), "b".to_string()];
        let mut draft = Item::new("draft");
        draft.skip = true;
        draft.links.outbound = vec!["a".to_string()];
        let mut remote = Item::new("blogroll/x/1");
        remote.kind = ItemKind::Remote;
        remote.skip = true;
        ctx.replace_items(vec![a, Item::new("b"), draft, remote]);
        ctx.add_artifact("/a/", "<p>a</p>");
        ctx.add_artifact("/posts/index.xml", "<rss/>");
        ctx.add_asset(Asset {
            source: image,
            relative: "img/logo.png".into(),
        });

        WritePlugin.write(&mut ctx).unwrap();

        let out = dir.path().join("_site");
        assert_eq!(std::fs::read_to_string(out.join("a/index.html")).unwrap(), "<p>a</p>");
        assert_eq!(std::fs::read_to_string(out.join("posts/index.xml")).unwrap(), "<rss/>");
        assert_eq!(std::fs::read(out.join("img/logo.png")).unwrap(), b"png");

        let graph: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("graph.json")).unwrap()).unwrap();
        assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);
        // Links touching the unwritten draft are left out
        assert_eq!(graph["edges"].as_array().unwrap().len(), 1);
        assert_eq!(graph["edges"][0]["source"], "a");
        assert_eq!(graph["edges"][0]["target"], "b");
    }
}
