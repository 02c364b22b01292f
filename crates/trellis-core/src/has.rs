//! Filter clauses: the `(key, predicate, value)` triples absorbed by the
//! strategy rewriter.

use crate::predicate::Predicate;

/// The key side of a filter clause.
///
/// `Label` and `Id` are reserved: they are handled structurally (table
/// selection for labels, the identity column for ids) rather than as
/// ordinary property columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HasKey {
    Label,
    Id,
    Property(String),
}

impl HasKey {
    pub fn property(name: impl Into<String>) -> Self {
        HasKey::Property(name.into())
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, HasKey::Label | HasKey::Id)
    }

    /// The column this key filters on, if any. Label filters have no
    /// column; they constrain which tables resolve.
    pub fn column(&self) -> Option<&str> {
        match self {
            HasKey::Label => None,
            HasKey::Id => Some(crate::schema::ID_COLUMN),
            HasKey::Property(name) => Some(name),
        }
    }
}

/// A single filter clause.
#[derive(Debug, Clone, PartialEq)]
pub struct HasContainer {
    pub key: HasKey,
    pub predicate: Predicate,
}

impl std::fmt::Display for HasKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HasKey::Label => write!(f, "label"),
            HasKey::Id => write!(f, "id"),
            HasKey::Property(name) => write!(f, "{name}"),
        }
    }
}

impl std::fmt::Display for HasContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key, self.predicate)
    }
}

impl HasContainer {
    pub fn new(key: HasKey, predicate: Predicate) -> Self {
        Self { key, predicate }
    }

    pub fn property(name: impl Into<String>, predicate: Predicate) -> Self {
        Self::new(HasKey::property(name), predicate)
    }

    pub fn label(predicate: Predicate) -> Self {
        Self::new(HasKey::Label, predicate)
    }

    pub fn id(predicate: Predicate) -> Self {
        Self::new(HasKey::Id, predicate)
    }
}
