//! Evaluation of expression trees against a single item.
//!
//! Evaluation never fails: a field the item does not define resolves to
//! [`Value::Absent`], and every comparison involving an absent value or
//! mismatched types is false.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};

use super::lexer::CmpOp;
use super::parser::{Field, Literal, Node};
use crate::build::item::Item;

/// A field value as seen by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Absent,
    Str(&'a str),
    Num(f64),
    Bool(bool),
    Date(DateTime<FixedOffset>),
    List(Vec<&'a str>),
}

impl Value<'_> {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Absent => false,
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Date(_) => true,
            Value::List(items) => !items.is_empty(),
        }
    }
}

/// Evaluate `node` against `item`.
pub fn eval(node: &Node, item: &Item) -> bool {
    match node {
        Node::Const(value) => *value,
        Node::Compare { field, op, literal } => compare(&resolve(field, item), *op, literal),
        Node::Member { literal, field } => member(literal, &resolve(field, item)),
        Node::Truthy(field) => resolve(field, item).is_truthy(),
        Node::Not(inner) => !eval(inner, item),
        Node::And(left, right) => eval(left, item) && eval(right, item),
        Node::Or(left, right) => eval(left, item) || eval(right, item),
    }
}

/// Look up a field on an item.
pub fn resolve<'a>(field: &Field, item: &'a Item) -> Value<'a> {
    match field {
        Field::Slug => Value::Str(&item.slug),
        Field::Href => Value::Str(&item.href),
        Field::Title => optional_str(item.title.as_deref()),
        Field::Description => optional_str(item.description.as_deref()),
        Field::Tags => Value::List(item.tags.iter().map(String::as_str).collect()),
        Field::Category => optional_str(item.category.as_deref()),
        Field::Date => item.date.map_or(Value::Absent, Value::Date),
        Field::Updated => item.updated.map_or(Value::Absent, Value::Date),
        Field::Published => Value::Bool(item.published),
        Field::Draft => Value::Bool(item.draft),
        Field::Private => Value::Bool(item.private),
        Field::Skip => Value::Bool(item.skip),
        Field::Kind => Value::Str(item.kind.as_str()),
        Field::Extra(path) => item.extra_path(path).map_or(Value::Absent, from_yaml),
    }
}

fn optional_str(value: Option<&str>) -> Value<'_> {
    value.map_or(Value::Absent, Value::Str)
}

fn from_yaml(value: &serde_yaml::Value) -> Value<'_> {
    match value {
        serde_yaml::Value::String(s) => Value::Str(s),
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => n.as_f64().map_or(Value::Absent, Value::Num),
        serde_yaml::Value::Sequence(seq) => {
            Value::List(seq.iter().filter_map(serde_yaml::Value::as_str).collect())
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(&tagged.value),
        serde_yaml::Value::Null | serde_yaml::Value::Mapping(_) => Value::Absent,
    }
}

fn compare(value: &Value<'_>, op: CmpOp, literal: &Literal) -> bool {
    let ordering = match (value, literal) {
        (Value::List(items), Literal::Str(s)) => {
            return match op {
                CmpOp::Eq => items.contains(&s.as_str()),
                CmpOp::Ne => !items.contains(&s.as_str()),
                _ => false,
            };
        }
        (Value::Bool(a), Literal::Bool(b)) => {
            return match op {
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
                _ => false,
            };
        }
        (Value::Str(a), Literal::Str(b)) => Some((*a).cmp(b.as_str())),
        (Value::Num(a), Literal::Number(b)) => a.partial_cmp(b),
        (Value::Date(a), Literal::Date(b)) => Some(a.cmp(b)),
        _ => None,
    };

    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Lt => ordering == Ordering::Less,
    }
}

fn member(literal: &Literal, value: &Value<'_>) -> bool {
    match (literal, value) {
        (Literal::Str(s), Value::List(items)) => items.contains(&s.as_str()),
        _ => false,
    }
}
