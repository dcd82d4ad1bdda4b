//! Recursive-descent parser producing the expression tree.
//!
//! Precedence, loosest first: `or`, `and`, `not`, then terms and
//! parenthesized groups. Binary operators associate to the left.

use chrono::{DateTime, FixedOffset};

use super::SyntaxError;
use super::lexer::{CmpOp, Token, TokenKind, tokenize};
use crate::build::item::parse_date;

/// An item attribute an expression can refer to.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Slug,
    Href,
    Title,
    Description,
    Tags,
    Category,
    Date,
    Updated,
    Published,
    Draft,
    Private,
    Skip,
    Kind,
    /// Dotted path into the extension map
    Extra(Vec<String>),
}

impl Field {
    /// Resolve an identifier. Anything that is not a built-in attribute
    /// addresses the extension map; `extra.` is an explicit prefix for it.
    pub fn resolve(name: &str) -> Field {
        match name {
            "slug" => Field::Slug,
            "href" => Field::Href,
            "title" => Field::Title,
            "description" => Field::Description,
            "tags" => Field::Tags,
            "category" => Field::Category,
            "date" => Field::Date,
            "updated" => Field::Updated,
            "published" => Field::Published,
            "draft" => Field::Draft,
            "private" => Field::Private,
            "skip" => Field::Skip,
            "kind" => Field::Kind,
            other => {
                let path = other.strip_prefix("extra.").unwrap_or(other);
                Field::Extra(path.split('.').map(str::to_string).collect())
            }
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Field::Date | Field::Updated)
    }
}

/// A literal operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<FixedOffset>),
}

/// The parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Const(bool),
    Compare {
        field: Field,
        op: CmpOp,
        literal: Literal,
    },
    /// `literal in field`
    Member {
        literal: Literal,
        field: Field,
    },
    /// A bare field, true when it holds a truthy value
    Truthy(Field),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// Parse an expression string into a tree.
pub fn parse(input: &str) -> Result<Node, SyntaxError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new(0, "", "empty expression"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.chars().count(),
    };
    let node = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        return Err(SyntaxError::new(
            token.position,
            &token.kind.describe(),
            "unexpected token",
        ));
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Character length of the input, reported for errors at end of input
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_of_input(&self, message: &str) -> SyntaxError {
        SyntaxError::new(self.end, "end of input", message)
    }

    fn parse_or(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == Some(&TokenKind::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_unary()?;
        while self.peek_kind() == Some(&TokenKind::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, SyntaxError> {
        if self.peek_kind() == Some(&TokenKind::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let Some(token) = self.next() else {
            return Err(self.end_of_input("expected a condition"));
        };

        match token.kind {
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(SyntaxError::new(
                        token.position,
                        "(",
                        "unbalanced parenthesis",
                    )),
                }
            }
            TokenKind::True | TokenKind::False
                if self.peek_kind() != Some(&TokenKind::In) =>
            {
                Ok(Node::Const(token.kind == TokenKind::True))
            }
            TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::True | TokenKind::False => {
                let literal = literal_of(&token.kind).ok_or_else(|| {
                    SyntaxError::new(token.position, &token.kind.describe(), "expected a literal")
                })?;
                self.parse_membership(token, literal)
            }
            TokenKind::Ident(name) => self.parse_field_term(Field::resolve(&name), &name),
            TokenKind::RParen => Err(SyntaxError::new(
                token.position,
                ")",
                "unbalanced parenthesis",
            )),
            other => Err(SyntaxError::new(
                token.position,
                &other.describe(),
                "unexpected token",
            )),
        }
    }

    /// `literal in field`
    fn parse_membership(&mut self, literal_token: Token, literal: Literal) -> Result<Node, SyntaxError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::In,
                ..
            }) => {}
            Some(other) => {
                return Err(SyntaxError::new(
                    other.position,
                    &other.kind.describe(),
                    "expected 'in' after literal",
                ));
            }
            None => {
                return Err(SyntaxError::new(
                    literal_token.position,
                    &literal_token.kind.describe(),
                    "expected 'in' after literal",
                ));
            }
        }

        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(Node::Member {
                literal,
                field: Field::resolve(&name),
            }),
            Some(other) => Err(SyntaxError::new(
                other.position,
                &other.kind.describe(),
                "expected a field name after 'in'",
            )),
            None => Err(self.end_of_input("expected a field name after 'in'")),
        }
    }

    /// `field op literal`, or a bare `field`.
    fn parse_field_term(&mut self, field: Field, name: &str) -> Result<Node, SyntaxError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Op(op)) => *op,
            Some(TokenKind::In) => {
                let position = self.peek().map(|t| t.position).unwrap_or(self.end);
                return Err(SyntaxError::new(
                    position,
                    "in",
                    &format!("'in' takes a literal on the left, e.g. \"value\" in {name}"),
                ));
            }
            _ => return Ok(Node::Truthy(field)),
        };
        let op_position = self.peek().map(|t| t.position).unwrap_or(self.end);
        self.pos += 1;

        let Some(token) = self.next() else {
            return Err(SyntaxError::new(
                op_position,
                op.as_str(),
                "expected a literal after operator",
            ));
        };
        let Some(literal) = literal_of(&token.kind) else {
            return Err(SyntaxError::new(
                token.position,
                &token.kind.describe(),
                "expected a literal after operator",
            ));
        };

        let literal = if field.is_date() {
            match literal {
                Literal::Str(s) => Literal::Date(parse_date(&s).ok_or_else(|| {
                    SyntaxError::new(token.position, &token.kind.describe(), "invalid date literal")
                })?),
                _ => {
                    return Err(SyntaxError::new(
                        token.position,
                        &token.kind.describe(),
                        "date fields compare against quoted dates",
                    ));
                }
            }
        } else {
            literal
        };

        Ok(Node::Compare { field, op, literal })
    }
}

fn literal_of(kind: &TokenKind) -> Option<Literal> {
    match kind {
        TokenKind::Str(s) => Some(Literal::Str(s.clone())),
        TokenKind::Number(n) => Some(Literal::Number(*n)),
        TokenKind::True => Some(Literal::Bool(true)),
        TokenKind::False => Some(Literal::Bool(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(field: Field, op: CmpOp, literal: Literal) -> Node {
        Node::Compare { field, op, literal }
    }

    #[test]
    fn test_parse_membership() {
        assert_eq!(
            parse(r#""go" in tags"#).unwrap(),
            Node::Member {
                literal: Literal::Str("go".to_string()),
                field: Field::Tags,
            }
        );
    }

    #[test]
    fn test_parse_comparison() {
        assert_eq!(
            parse(r#"category == "News""#).unwrap(),
            compare(Field::Category, CmpOp::Eq, Literal::Str("News".to_string()))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let node = parse("a or b and c").unwrap();
        let a = Node::Truthy(Field::Extra(vec!["a".to_string()]));
        let b = Node::Truthy(Field::Extra(vec!["b".to_string()]));
        let c = Node::Truthy(Field::Extra(vec!["c".to_string()]));
        assert_eq!(
            node,
            Node::Or(
                Box::new(a),
                Box::new(Node::And(Box::new(b), Box::new(c)))
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let node = parse("(draft or private) and published").unwrap();
        assert_eq!(
            node,
            Node::And(
                Box::new(Node::Or(
                    Box::new(Node::Truthy(Field::Draft)),
                    Box::new(Node::Truthy(Field::Private)),
                )),
                Box::new(Node::Truthy(Field::Published)),
            )
        );
    }

    #[test]
    fn test_not_and_constants() {
        assert_eq!(
            parse("not true").unwrap(),
            Node::Not(Box::new(Node::Const(true)))
        );
    }

    #[test]
    fn test_date_literal_is_parsed() {
        let node = parse(r#"date >= "2024-01-01""#).unwrap();
        let Node::Compare {
            literal: Literal::Date(date),
            ..
        } = node
        else {
            panic!("expected a date comparison, got {node:?}");
        };
        assert_eq!(date.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_invalid_date_literal() {
        let err = parse(r#"date > "yesterday""#).unwrap_err();
        assert_eq!(err.position, 7);
        assert!(err.message.contains("invalid date"));
    }

    #[test]
    fn test_extra_paths() {
        assert_eq!(
            Field::resolve("extra.author.name"),
            Field::Extra(vec!["author".to_string(), "name".to_string()])
        );
        assert_eq!(
            Field::resolve("series"),
            Field::Extra(vec!["series".to_string()])
        );
    }

    #[test]
    fn test_empty_expression() {
        let err = parse("   ").unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse("(draft or private").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("unbalanced"));

        let err = parse("draft)").unwrap_err();
        assert_eq!(err.position, 5);
    }

    #[test]
    fn test_dangling_operators() {
        assert!(parse("draft and").is_err());
        assert!(parse("category ==").is_err());
        assert!(parse(r#""go" in"#).is_err());
        assert!(parse(r#""go""#).is_err());
        assert!(parse("tags in \"go\"").is_err());
        assert!(parse("category == tags").is_err());
    }

    #[test]
    fn test_trailing_tokens() {
        let err = parse("draft private").unwrap_err();
        assert_eq!(err.position, 6);
        assert_eq!(err.token, "private");
    }
}
