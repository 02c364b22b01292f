//! Predicates attached to filter clauses.
//!
//! A tagged variant per predicate family: comparison, conjunction,
//! disjunction, membership, and text. The classifier pattern-matches on
//! these variants to decide foldability; the SQL builder renders them; the
//! in-memory backend evaluates them with [`Predicate::test`].

use std::cmp::Ordering;

use crate::value::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Compare {
    pub fn sql_operator(self) -> &'static str {
        match self {
            Compare::Eq => "=",
            Compare::Neq => "<>",
            Compare::Lt => "<",
            Compare::Lte => "<=",
            Compare::Gt => ">",
            Compare::Gte => ">=",
        }
    }

    fn admits(self, ordering: Ordering) -> bool {
        match self {
            Compare::Eq => ordering == Ordering::Equal,
            Compare::Neq => ordering != Ordering::Equal,
            Compare::Lt => ordering == Ordering::Less,
            Compare::Lte => ordering != Ordering::Greater,
            Compare::Gt => ordering == Ordering::Greater,
            Compare::Gte => ordering != Ordering::Less,
        }
    }
}

/// Text matching operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Contains,
    NotContains,
    ContainsCi,
    NotContainsCi,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
}

impl TextMatch {
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            TextMatch::NotContains
                | TextMatch::NotContainsCi
                | TextMatch::NotStartsWith
                | TextMatch::NotEndsWith
        )
    }

    pub fn is_case_insensitive(self) -> bool {
        matches!(self, TextMatch::ContainsCi | TextMatch::NotContainsCi)
    }
}

/// A predicate over a single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(Compare, Value),
    Within(Vec<Value>),
    Without(Vec<Value>),
    Text(TextMatch, String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn eq(value: impl Into<Value>) -> Self {
        Predicate::Compare(Compare::Eq, value.into())
    }

    pub fn neq(value: impl Into<Value>) -> Self {
        Predicate::Compare(Compare::Neq, value.into())
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Predicate::Compare(Compare::Lt, value.into())
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Predicate::Compare(Compare::Lte, value.into())
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Predicate::Compare(Compare::Gt, value.into())
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Predicate::Compare(Compare::Gte, value.into())
    }

    pub fn within<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Predicate::Within(values.into_iter().map(Into::into).collect())
    }

    pub fn without<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Predicate::Without(values.into_iter().map(Into::into).collect())
    }

    pub fn text(op: TextMatch, needle: impl Into<String>) -> Self {
        Predicate::Text(op, needle.into())
    }

    pub fn starts_with(needle: impl Into<String>) -> Self {
        Predicate::Text(TextMatch::StartsWith, needle.into())
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        Predicate::Text(TextMatch::Contains, needle.into())
    }

    pub fn ends_with(needle: impl Into<String>) -> Self {
        Predicate::Text(TextMatch::EndsWith, needle.into())
    }

    /// `value < low OR value > high`.
    pub fn outside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Or(
            Box::new(Predicate::lt(low)),
            Box::new(Predicate::gt(high)),
        )
    }

    /// Evaluate the predicate against a present column value.
    ///
    /// Callers are responsible for NULL semantics: an absent value admits
    /// nothing, so `test` is only invoked on present values.
    pub fn test(&self, value: &Value) -> bool {
        match self {
            Predicate::Compare(op, rhs) => match value.compare(rhs) {
                Some(ordering) => op.admits(ordering),
                None => false,
            },
            Predicate::Within(values) => values
                .iter()
                .any(|v| value.compare(v) == Some(Ordering::Equal)),
            Predicate::Without(values) => !values
                .iter()
                .any(|v| value.compare(v) == Some(Ordering::Equal)),
            Predicate::Text(op, needle) => {
                let Some(haystack) = value.as_str() else {
                    return false;
                };
                test_text(*op, haystack, needle)
            }
            Predicate::And(a, b) => a.test(value) && b.test(value),
            Predicate::Or(a, b) => a.test(value) || b.test(value),
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Compare(op, value) => write!(f, "{} {value}", op.sql_operator()),
            Predicate::Within(values) => {
                write!(f, "within [{}]", join_values(values))
            }
            Predicate::Without(values) => {
                write!(f, "without [{}]", join_values(values))
            }
            Predicate::Text(op, needle) => write!(f, "{op:?} '{needle}'"),
            Predicate::And(a, b) => write!(f, "({a} AND {b})"),
            Predicate::Or(a, b) => write!(f, "({a} OR {b})"),
        }
    }
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn test_text(op: TextMatch, haystack: &str, needle: &str) -> bool {
    match op {
        TextMatch::Contains => haystack.contains(needle),
        TextMatch::NotContains => !haystack.contains(needle),
        TextMatch::ContainsCi => haystack.to_lowercase().contains(&needle.to_lowercase()),
        TextMatch::NotContainsCi => !haystack.to_lowercase().contains(&needle.to_lowercase()),
        TextMatch::StartsWith => haystack.starts_with(needle),
        TextMatch::NotStartsWith => !haystack.starts_with(needle),
        TextMatch::EndsWith => haystack.ends_with(needle),
        TextMatch::NotEndsWith => !haystack.ends_with(needle),
    }
}
