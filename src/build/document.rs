use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

// =============================================================================
// Front matter
// =============================================================================

/// Front matter metadata parsed from a source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontMatter {
    /// Overrides the title derived from the file name
    pub title: Option<String>,
    /// Summary used by listings and syndication formats
    pub description: Option<String>,
    /// Replaces the path-derived slug
    pub slug: Option<String>,
    /// Tags; a single string is accepted as a one-element list
    #[serde(default, deserialize_with = "string_or_list")]
    pub tags: Vec<String>,
    pub category: Option<String>,
    /// Publication date (RFC 3339 or `YYYY-MM-DD`)
    #[serde(default, deserialize_with = "scalar_string")]
    pub date: Option<String>,
    /// Last-modified date
    #[serde(default, deserialize_with = "scalar_string")]
    pub updated: Option<String>,
    #[serde(default)]
    pub draft: bool,
    pub published: Option<bool>,
    #[serde(default)]
    pub private: bool,
    /// Every other key, reachable from filters as `extra.<key>`
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A source file split into its metadata and body.
#[derive(Debug)]
pub struct ParsedContent {
    pub front_matter: FrontMatter,
    /// Markdown following the metadata block, or the whole file without one
    pub content: String,
}

/// Split a leading `---` fenced YAML block from the body.
///
/// Returns `None` when the source has no complete block, in which case the
/// whole source is body text.
fn split_front_matter(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix("---")?;
    let close = rest.find("\n---")?;
    let yaml = rest[..close].trim_start_matches('\n');
    let body = rest[close + "\n---".len()..].trim_start_matches('\n');
    Some((yaml, body))
}

/// Read the metadata block at the top of a source file.
///
/// ```markdown
/// ---
/// title: My Page
/// tags: [rust, notes]
/// date: 2024-03-01
/// ---
///
/// # Content starts here
/// ```
///
/// Malformed YAML is logged and replaced by empty front matter.
pub fn parse_front_matter(content: &str) -> ParsedContent {
    let source = content.trim_start();
    let Some((yaml, body)) = split_front_matter(source) else {
        return ParsedContent {
            front_matter: FrontMatter::default(),
            content: source.to_string(),
        };
    };

    let front_matter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml).unwrap_or_else(|e| {
            warn!("ignoring malformed front matter: {e}");
            FrontMatter::default()
        })
    };

    ParsedContent {
        front_matter,
        content: body.to_string(),
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Accept dates written as plain YAML scalars of any type.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
