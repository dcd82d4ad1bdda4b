//! Path and URL conversion utilities.
//!
//! This module handles conversions between:
//! - Source file paths (relative paths within the content directory)
//! - Slugs and hrefs (the URL path at which an item is served)
//! - Output file paths (where files are written in the output directory)

use std::path::{Component, Path, PathBuf};

/// Convert a markdown source path to a slug.
///
/// The extension is dropped and separators become `/`. `index` files take
/// the slug of their directory; the root index keeps the slug `index`.
///
/// # Examples
/// ```ignore
/// source_path_to_slug("blog/hello.md") => "blog/hello"
/// source_path_to_slug("guides/index.md") => "guides"
/// source_path_to_slug("index.md") => "index"
/// ```
pub fn source_path_to_slug(path: &Path) -> String {
    let path_str = path.with_extension("").to_string_lossy().replace('\\', "/");

    if path_str == "index" {
        return path_str;
    }
    match path_str.strip_suffix("/index") {
        Some(dir) => dir.to_string(),
        None => path_str,
    }
}

/// Convert an href to an output file path.
///
/// Directory hrefs (trailing `/`) become `dir/index.html`. Hrefs whose last
/// segment has an extension are written as-is.
///
/// # Examples
/// ```ignore
/// href_to_output_path("/blog/hello/", output_dir) => output_dir/blog/hello/index.html
/// href_to_output_path("/", output_dir) => output_dir/index.html
/// href_to_output_path("/posts/index.xml", output_dir) => output_dir/posts/index.xml
/// ```
pub fn href_to_output_path(href: &str, output_dir: &Path) -> PathBuf {
    let trimmed = href.trim_start_matches('/');

    if trimmed.is_empty() {
        return output_dir.join("index.html");
    }

    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if !href.ends_with('/') && last.contains('.') {
        output_dir.join(trimmed)
    } else {
        output_dir.join(trimmed.trim_end_matches('/')).join("index.html")
    }
}

/// Resolve a link destination found in an item's markdown to a site href.
///
/// Returns `None` for external URLs, `mailto:` links and pure fragments.
/// Relative destinations resolve against the directory of `from_href`.
/// Query strings and fragments are dropped, and the result always ends
/// in `/` unless it names a file.
pub fn resolve_link(dest: &str, from_href: &str) -> Option<String> {
    let dest = dest.split(['#', '?']).next().unwrap_or("");
    if dest.is_empty() || dest.contains("://") || dest.starts_with("mailto:") {
        return None;
    }

    let joined = if dest.starts_with('/') {
        dest.to_string()
    } else {
        format!("{}{}", from_href, dest)
    };

    let mut segments: Vec<&str> = Vec::new();
    for component in Path::new(&joined).components() {
        match component {
            Component::Normal(s) => segments.push(s.to_str()?),
            Component::ParentDir => {
                segments.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }

    // `/notes/intro.md` style links point at the rendered page
    if let Some(last) = segments.last_mut()
        && let Some(stem) = last.strip_suffix(".md")
    {
        *last = stem;
        if *last == "index" {
            segments.pop();
        }
    }

    let path = segments.join("/");
    if path.is_empty() {
        return Some("/".to_string());
    }
    let is_file = segments.last().is_some_and(|s| s.contains('.'));
    if is_file {
        Some(format!("/{path}"))
    } else {
        Some(format!("/{path}/"))
    }
}

/// Get the base path from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_source_path_to_slug_simple() {
        assert_eq!(source_path_to_slug(Path::new("about.md")), "about");
    }

    #[test]
    fn test_source_path_to_slug_nested() {
        assert_eq!(
            source_path_to_slug(Path::new("blog/2024/hello.md")),
            "blog/2024/hello"
        );
    }

    #[test]
    fn test_source_path_to_slug_index() {
        assert_eq!(source_path_to_slug(Path::new("index.md")), "index");
        assert_eq!(source_path_to_slug(Path::new("guides/index.md")), "guides");
    }

    #[test]
    fn test_href_to_output_path_document() {
        let output = Path::new("/site");
        assert_eq!(
            href_to_output_path("/blog/hello/", output),
            PathBuf::from("/site/blog/hello/index.html")
        );
    }

    #[test]
    fn test_href_to_output_path_root() {
        let output = Path::new("/site");
        assert_eq!(
            href_to_output_path("/", output),
            PathBuf::from("/site/index.html")
        );
    }

    #[test]
    fn test_href_to_output_path_file() {
        let output = Path::new("/site");
        assert_eq!(
            href_to_output_path("/posts/index.xml", output),
            PathBuf::from("/site/posts/index.xml")
        );
        assert_eq!(
            href_to_output_path("/v1.2/", output),
            PathBuf::from("/site/v1.2/index.html")
        );
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(resolve_link("/one/", "/blog/a/"), Some("/one/".to_string()));
        assert_eq!(resolve_link("/one", "/blog/a/"), Some("/one/".to_string()));
        assert_eq!(resolve_link("../b/", "/blog/a/"), Some("/blog/b/".to_string()));
        assert_eq!(resolve_link("/one/#top", "/"), Some("/one/".to_string()));
        assert_eq!(resolve_link("/blog/b.md", "/"), Some("/blog/b/".to_string()));
        assert_eq!(resolve_link("/img/a.png", "/"), Some("/img/a.png".to_string()));
        assert_eq!(resolve_link("/", "/blog/a/"), Some("/".to_string()));
        assert_eq!(resolve_link("https://example.com", "/"), None);
        assert_eq!(resolve_link("#section", "/"), None);
        assert_eq!(resolve_link("mailto:me@example.com", "/"), None);
    }

    #[test]
    fn test_base_path_from_config() {
        assert_eq!(
            base_path_from_config(Path::new("/project/folio.yaml")),
            PathBuf::from("/project")
        );
        assert_eq!(
            base_path_from_config(Path::new("folio.yaml")),
            PathBuf::from("")
        );
    }
}
