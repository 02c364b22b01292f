//! Foldable-shape recognition for filter clauses.
//!
//! A host filter step is pushdown-eligible only when its clause list
//! matches exactly one of six shapes; anything else leaves the step to the
//! host interpreter. Reserved keys (`label`, `id`) are excluded from the
//! membership and text shapes because they are handled structurally, by
//! table selection, rather than as column filters.

use trellis_core::{Compare, HasContainer, Predicate};

/// The shape a foldable clause list was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foldable {
    /// One clause, one comparison operator.
    Comparison,
    /// Two clauses `(>=, <)` on the same key.
    Between,
    /// Two clauses `(>, <)` on the same key.
    Inside,
    /// One clause whose predicate is `< low OR > high`.
    Outside,
    /// One `within`/`without` clause on a non-reserved key.
    Membership,
    /// One text-operator clause on a non-reserved key.
    Text,
}

/// Classify the clause list of a single filter step.
pub fn classify(containers: &[HasContainer]) -> Option<Foldable> {
    match containers {
        [single] => classify_single(single),
        [first, second] => classify_pair(first, second),
        _ => None,
    }
}

fn classify_single(container: &HasContainer) -> Option<Foldable> {
    match &container.predicate {
        Predicate::Compare(..) => Some(Foldable::Comparison),
        Predicate::Or(left, right) => match (left.as_ref(), right.as_ref()) {
            (Predicate::Compare(Compare::Lt, _), Predicate::Compare(Compare::Gt, _)) => {
                Some(Foldable::Outside)
            }
            _ => None,
        },
        Predicate::Within(_) | Predicate::Without(_) if !container.key.is_reserved() => {
            Some(Foldable::Membership)
        }
        Predicate::Text(..) if !container.key.is_reserved() => Some(Foldable::Text),
        _ => None,
    }
}

fn classify_pair(first: &HasContainer, second: &HasContainer) -> Option<Foldable> {
    if first.key != second.key {
        return None;
    }
    match (&first.predicate, &second.predicate) {
        (Predicate::Compare(Compare::Gte, _), Predicate::Compare(Compare::Lt, _)) => {
            Some(Foldable::Between)
        }
        (Predicate::Compare(Compare::Gt, _), Predicate::Compare(Compare::Lt, _)) => {
            Some(Foldable::Inside)
        }
        _ => None,
    }
}
