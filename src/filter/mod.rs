//! Boolean filter expressions over item attributes.
//!
//! Feeds, taxonomies, access rules and plugins select items with short
//! predicate strings instead of code:
//!
//! ```text
//! "rust" in tags and not draft
//! category == "News" or (date >= "2024-01-01" and extra.featured)
//! ```
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" expr ")" | literal "in" field | field op literal
//!          | field | "true" | "false"
//! op      := "==" | "!=" | ">=" | "<=" | ">" | "<"
//! ```
//!
//! Identifiers name built-in attributes (`slug`, `href`, `title`,
//! `description`, `tags`, `category`, `date`, `updated`, `published`,
//! `draft`, `private`, `skip`, `kind`); any other identifier is a dotted
//! path into the item's extension map, optionally prefixed with `extra.`.

mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::str::FromStr;

use crate::build::item::Item;

pub use eval::Value;
pub use lexer::CmpOp;
pub use parser::{Field, Literal, Node};

/// A malformed filter expression.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at position {position} near '{token}': {message}")]
pub struct SyntaxError {
    /// Character offset of the offending token
    pub position: usize,
    /// The offending token as written
    pub token: String,
    pub message: String,
}

impl SyntaxError {
    pub fn new(position: usize, token: &str, message: &str) -> Self {
        Self {
            position,
            token: token.to_string(),
            message: message.to_string(),
        }
    }

    /// Render the source with a caret under the offending position.
    pub fn annotate(&self, source: &str) -> String {
        format!("{source}\n{}^ {}", " ".repeat(self.position), self.message)
    }
}

/// A parsed, immutable predicate.
///
/// Evaluation is pure: the same expression against the same item always
/// yields the same result.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse an expression string.
    pub fn parse(source: &str) -> Result<Self, SyntaxError> {
        let root = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// True if `item` satisfies the predicate.
    pub fn matches(&self, item: &Item) -> bool {
        eval::eval(&self.root, item)
    }

    /// The text this expression was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }
}

impl FromStr for Expression {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Keep the items `expression` matches, preserving input order.
///
/// Visibility (private, unpublished, skipped) is not considered here;
/// callers filter for it separately.
pub fn match_all<'a>(expression: &Expression, items: &'a [Item]) -> Vec<&'a Item> {
    items
        .iter()
        .filter(|item| expression.matches(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(slug: &str, tags: &[&str]) -> Item {
        let mut item = Item::new(slug);
        item.tags = tags.iter().map(|t| t.to_string()).collect();
        item
    }

    #[test]
    fn test_match_all_tags() {
        let items = vec![tagged("first", &["go", "rust"]), tagged("second", &["go"])];

        let go = Expression::parse(r#""go" in tags"#).unwrap();
        let rust = Expression::parse(r#""rust" in tags"#).unwrap();

        let slugs = |matched: Vec<&Item>| -> Vec<String> {
            matched.into_iter().map(|i| i.slug.clone()).collect()
        };
        assert_eq!(slugs(match_all(&go, &items)), vec!["first", "second"]);
        assert_eq!(slugs(match_all(&rust, &items)), vec!["first"]);
    }

    #[test]
    fn test_match_all_preserves_order() {
        let items: Vec<Item> = (0..20)
            .map(|i| tagged(&format!("item-{i:02}"), if i % 3 == 0 { &["x"] } else { &[] }))
            .collect();
        let expr = Expression::parse(r#""x" in tags"#).unwrap();

        let matched: Vec<_> = match_all(&expr, &items).iter().map(|i| i.slug.clone()).collect();
        let mut sorted = matched.clone();
        sorted.sort();
        assert_eq!(matched, sorted);
        assert_eq!(matched.len(), 7);
    }

    #[test]
    fn test_match_all_ignores_visibility() {
        let mut hidden = tagged("hidden", &["go"]);
        hidden.private = true;
        hidden.skip = true;
        let items = vec![hidden];

        let expr = Expression::parse(r#""go" in tags"#).unwrap();
        assert_eq!(match_all(&expr, &items).len(), 1);
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let item = tagged("a", &["go"]);
        let expr = Expression::parse(r#""go" in tags and not draft"#).unwrap();
        let first = expr.matches(&item);
        for _ in 0..100 {
            assert_eq!(expr.matches(&item), first);
        }
    }

    #[test]
    fn test_from_str_and_display() {
        let expr: Expression = r#"category == "News""#.parse().unwrap();
        assert_eq!(expr.to_string(), r#"category == "News""#);
        assert_eq!(expr.source(), r#"category == "News""#);
    }

    #[test]
    fn test_syntax_error_annotation() {
        let source = r#"category = "News""#;
        let err = Expression::parse(source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "syntax error at position 9 near '=': unknown operator"
        );
        assert_eq!(
            err.annotate(source),
            "category = \"News\"\n         ^ unknown operator"
        );
    }
}
