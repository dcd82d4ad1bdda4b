//! Tokenizer for filter expressions.

use super::SyntaxError;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    True,
    False,
    And,
    Or,
    Not,
    In,
    Op(CmpOp),
    LParen,
    RParen,
}

impl TokenKind {
    /// How the token reads in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Number(n) => n.to_string(),
            TokenKind::True => "true".to_string(),
            TokenKind::False => "false".to_string(),
            TokenKind::And => "and".to_string(),
            TokenKind::Or => "or".to_string(),
            TokenKind::Not => "not".to_string(),
            TokenKind::In => "in".to_string(),
            TokenKind::Op(op) => op.as_str().to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
        }
    }
}

/// A token and the character offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Split an expression into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let start = pos;

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let kind = match c {
            '(' => {
                pos += 1;
                TokenKind::LParen
            }
            ')' => {
                pos += 1;
                TokenKind::RParen
            }
            '"' | '\'' => {
                let (value, end) = read_string(&chars, pos)?;
                pos = end;
                TokenKind::Str(value)
            }
            '=' | '!' | '<' | '>' => {
                let (op, end) = read_operator(&chars, pos)?;
                pos = end;
                TokenKind::Op(op)
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let end = scan(&chars, pos + 1, |c| c.is_ascii_digit() || c == '.');
                let text: String = chars[pos..end].iter().collect();
                let number = text.parse::<f64>().map_err(|_| {
                    SyntaxError::new(start, &text, "invalid number literal")
                })?;
                pos = end;
                TokenKind::Number(number)
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = scan(&chars, pos + 1, |c| {
                    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
                });
                let word: String = chars[pos..end].iter().collect();
                pos = end;
                keyword(&word).unwrap_or(TokenKind::Ident(word))
            }
            other => {
                return Err(SyntaxError::new(
                    start,
                    &other.to_string(),
                    "unexpected character",
                ));
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
    }

    Ok(tokens)
}

fn scan(chars: &[char], mut pos: usize, accept: impl Fn(char) -> bool) -> usize {
    while pos < chars.len() && accept(chars[pos]) {
        pos += 1;
    }
    pos
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word.to_ascii_lowercase().as_str() {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Not),
        "in" => Some(TokenKind::In),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        _ => None,
    }
}

/// Read a quoted string starting at `start`; returns the value and the
/// offset just past the closing quote. Backslash escapes the next char.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), SyntaxError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        match chars[pos] {
            '\\' if pos + 1 < chars.len() => {
                value.push(chars[pos + 1]);
                pos += 2;
            }
            c if c == quote => return Ok((value, pos + 1)),
            c => {
                value.push(c);
                pos += 1;
            }
        }
    }

    let fragment: String = chars[start..].iter().collect();
    Err(SyntaxError::new(start, &fragment, "unterminated string literal"))
}

fn read_operator(chars: &[char], start: usize) -> Result<(CmpOp, usize), SyntaxError> {
    let end = scan(chars, start, |c| matches!(c, '=' | '!' | '<' | '>' | '~'));
    let text: String = chars[start..end].iter().collect();
    let op = match text.as_str() {
        "==" => CmpOp::Eq,
        "!=" => CmpOp::Ne,
        ">=" => CmpOp::Ge,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        "<" => CmpOp::Lt,
        _ => return Err(SyntaxError::new(start, &text, "unknown operator")),
    };
    Ok((op, end))
}
