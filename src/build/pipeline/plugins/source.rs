//! Source discovery.
//!
//! Walks the content directory and registers one item per markdown file.
//! Every other file is recorded as an asset to copy verbatim.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::build::document::parse_front_matter;
use crate::build::item::Item;
use crate::build::paths::source_path_to_slug;
use crate::build::pipeline::{Asset, BuildContext, Discover, Plugin, Priority, Stage};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("content path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("content path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read directory entry in {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("slug '{slug}' is used by both {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

// =============================================================================
// Discovery
// =============================================================================

/// A file found under the content directory.
#[derive(Debug)]
enum SourceFile {
    Markdown { full: PathBuf, relative: PathBuf },
    Asset { full: PathBuf, relative: PathBuf },
}

/// Recursively walk `dir`, collecting files in sorted order.
fn walk_directory(
    dir: &Path,
    relative_path: &Path,
    files: &mut Vec<SourceFile>,
) -> Result<(), SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SourceError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut entries = entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SourceError::ReadEntry {
            path: dir.to_path_buf(),
            source: e,
        })?;
    // read_dir order is platform-dependent
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_name = entry.file_name();

        // Skip hidden files and directories
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let item_relative_path = relative_path.join(&file_name);
        let file_type = entry.file_type().map_err(|e| SourceError::ReadEntry {
            path: path.clone(),
            source: e,
        })?;

        // Linked directories are not followed; a link back up the tree would never end
        if file_type.is_dir() {
            walk_directory(&path, &item_relative_path, files)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            files.push(classify_file(path, item_relative_path));
        } else if file_type.is_symlink() {
            debug!("not following symlink {}", path.display());
        }
    }

    Ok(())
}

fn classify_file(full: PathBuf, relative: PathBuf) -> SourceFile {
    let extension = relative
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("md" | "markdown") => SourceFile::Markdown { full, relative },
        _ => SourceFile::Asset { full, relative },
    }
}

/// Read and parse one markdown file into an item.
fn load_item(full: &Path, relative: &Path) -> Result<Item, SourceError> {
    let text = std::fs::read_to_string(full).map_err(|e| SourceError::ReadFile {
        path: full.to_path_buf(),
        source: e,
    })?;
    let parsed = parse_front_matter(&text);

    let slug = parsed
        .front_matter
        .slug
        .as_deref()
        .map(|s| s.trim_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| source_path_to_slug(relative));

    Ok(Item::from_source(
        slug,
        relative.to_path_buf(),
        parsed.front_matter,
        parsed.content,
    ))
}

/// Walk `content_dir` and build items and assets.
pub fn discover(content_dir: &Path) -> Result<(Vec<Item>, Vec<Asset>), SourceError> {
    if !content_dir.exists() {
        return Err(SourceError::PathNotFound(content_dir.to_path_buf()));
    }
    if !content_dir.is_dir() {
        return Err(SourceError::NotADirectory(content_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    walk_directory(content_dir, Path::new(""), &mut files)?;

    let mut items: Vec<Item> = Vec::new();
    let mut assets = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for file in files {
        match file {
            SourceFile::Markdown { full, relative } => {
                let item = load_item(&full, &relative)?;
                if !seen.insert(item.slug.clone()) {
                    let first = items
                        .iter()
                        .find(|other| other.slug == item.slug)
                        .and_then(|other| other.source_path.clone())
                        .unwrap_or_default();
                    return Err(SourceError::DuplicateSlug {
                        slug: item.slug,
                        first,
                        second: relative,
                    });
                }
                debug!("discovered {} -> {}", relative.display(), item.href);
                items.push(item);
            }
            SourceFile::Asset { full, relative } => assets.push(Asset {
                source: full,
                relative,
            }),
        }
    }

    Ok((items, assets))
}

// =============================================================================
// Plugin
// =============================================================================

/// Registers source items and assets during discover.
pub struct SourcePlugin;

impl Discover for SourcePlugin {
    fn discover(&mut self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        let content_dir = ctx.content_dir();
        let (items, assets) = discover(&content_dir)?;
        info!(
            "Found {} items and {} assets in {}",
            items.len(),
            assets.len(),
            content_dir.display()
        );

        for item in items {
            ctx.append_item(item);
        }
        for asset in assets {
            ctx.add_asset(asset);
        }
        Ok(())
    }
}

impl Plugin for SourcePlugin {
    fn name(&self) -> &str {
        "source"
    }

    fn priority_for(&self, _stage: Stage) -> Priority {
        Priority::EARLY
    }

    fn as_discover(&mut self) -> Option<&mut dyn Discover> {
        Some(self)
    }
}
