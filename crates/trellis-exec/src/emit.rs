//! The result unit: a path of elements with the traversal labels attached
//! at each position.

use indexmap::IndexSet;

use crate::element::Element;

/// One path position: the decoded element plus the labels bound there.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitEntry {
    pub element: Element,
    pub labels: IndexSet<String>,
}

/// A single path-and-label unit. The last entry is the traversal output;
/// the full path backs `path()`-style consumers and label selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Emit {
    pub path: Vec<EmitEntry>,
}

impl Emit {
    /// The element the traversal emits.
    pub fn terminal(&self) -> &Element {
        &self.path.last().expect("emit paths are never empty").element
    }

    /// The first element bound to a label, for `select('x')` consumers.
    pub fn select(&self, label: &str) -> Option<&Element> {
        self.path
            .iter()
            .find(|entry| entry.labels.contains(label))
            .map(|entry| &entry.element)
    }
}
