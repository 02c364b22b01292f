//! Graph elements decoded from result rows.

use indexmap::IndexMap;
use trellis_core::Value;

pub type ElementId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: ElementId,
    pub label: String,
    pub properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: ElementId,
    pub label: String,
    pub out_id: Option<ElementId>,
    pub in_id: Option<ElementId>,
    pub properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Vertex(v) => v.id,
            Element::Edge(e) => e.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Element::Vertex(v) => &v.label,
            Element::Edge(e) => &e.label,
        }
    }

    pub fn properties(&self) -> &IndexMap<String, Value> {
        match self {
            Element::Vertex(v) => &v.properties,
            Element::Edge(e) => &e.properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties().get(key)
    }
}
