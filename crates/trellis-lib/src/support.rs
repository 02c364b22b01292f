//! Shared test fixtures: the sample graph and a reference interpreter
//! that evaluates unrewritten pipelines directly over the in-memory data.

use std::sync::Arc;

use indexmap::IndexMap;
use trellis_core::{Topology, Value};
use trellis_exec::{ElementId, MemBackend};
use trellis_plan::SortOrder;

use crate::{Compiler, Direction, ElementKind, HasKey, Pipeline, Step};

pub const TOPOLOGY: &str = r#"{
    "schemas": [{
        "name": "public",
        "vertices": [
            {"label": "person", "columns": {"name": "text", "age": "int"}},
            {"label": "software", "columns": {"name": "text", "lang": "text"}}
        ],
        "edges": [
            {"label": "knows", "columns": {"weight": "float"},
             "connections": [{"out": "person", "in": "person"}]},
            {"label": "created", "columns": {"weight": "float"},
             "connections": [{"out": "person", "in": "software"}]}
        ]
    }]
}"#;

pub fn topology() -> Arc<Topology> {
    Arc::new(Topology::from_json(TOPOLOGY).expect("valid sample topology"))
}

pub fn compiler() -> Compiler {
    Compiler::new(topology())
}

fn props(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// The classic six-element sample graph.
pub fn sample_backend() -> MemBackend {
    let mut backend = MemBackend::new();
    let marko = backend.insert_vertex(
        "public",
        "person",
        props(&[("name", "marko".into()), ("age", 29.into())]),
    );
    let vadas = backend.insert_vertex(
        "public",
        "person",
        props(&[("name", "vadas".into()), ("age", 27.into())]),
    );
    let josh = backend.insert_vertex(
        "public",
        "person",
        props(&[("name", "josh".into()), ("age", 32.into())]),
    );
    let peter = backend.insert_vertex(
        "public",
        "person",
        props(&[("name", "peter".into()), ("age", 35.into())]),
    );
    let lop = backend.insert_vertex(
        "public",
        "software",
        props(&[("name", "lop".into()), ("lang", "java".into())]),
    );
    let ripple = backend.insert_vertex(
        "public",
        "software",
        props(&[("name", "ripple".into()), ("lang", "java".into())]),
    );

    let pairs = [
        ("knows", marko, "person", vadas, "person", 0.5),
        ("knows", marko, "person", josh, "person", 1.0),
        ("created", marko, "person", lop, "software", 0.4),
        ("created", josh, "person", ripple, "software", 1.0),
        ("created", josh, "person", lop, "software", 0.4),
        ("created", peter, "person", lop, "software", 0.2),
    ];
    for (label, out_id, out_label, in_id, in_label, weight) in pairs {
        backend.insert_edge(
            "public",
            label,
            (out_label, out_id),
            (in_label, in_id),
            props(&[("weight", weight.into())]),
        );
    }
    backend
}

// ============================================================================
// Reference Interpreter
// ============================================================================

#[derive(Debug, Clone)]
pub struct RefVertex {
    pub id: ElementId,
    pub label: String,
    pub properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct RefEdge {
    pub id: ElementId,
    pub label: String,
    pub out_id: ElementId,
    pub in_id: ElementId,
    pub properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefElem {
    Vertex(usize),
    Edge(usize),
}

/// A direct, step-by-step evaluator for unrewritten pipelines. Kept
/// deliberately naive: it is the oracle the compiled execution is checked
/// against.
pub struct RefGraph {
    vertices: Vec<RefVertex>,
    edges: Vec<RefEdge>,
}

impl RefGraph {
    pub fn from_backend(backend: &MemBackend) -> Self {
        let mut vertices = Vec::new();
        for (table, row) in backend.vertex_rows() {
            let id = row_id(row);
            let properties = row
                .iter()
                .filter(|(k, _)| k.as_str() != "ID")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            vertices.push(RefVertex {
                id,
                label: table.label().to_string(),
                properties,
            });
        }
        let mut edges = Vec::new();
        for (table, row) in backend.edge_rows() {
            let id = row_id(row);
            let mut out_id = 0;
            let mut in_id = 0;
            let mut properties = IndexMap::new();
            for (key, value) in row {
                if key == "ID" {
                    continue;
                } else if key.ends_with("__O") {
                    out_id = value.as_int().expect("endpoint id");
                } else if key.ends_with("__I") {
                    in_id = value.as_int().expect("endpoint id");
                } else {
                    properties.insert(key.clone(), value.clone());
                }
            }
            edges.push(RefEdge {
                id,
                label: table.label().to_string(),
                out_id,
                in_id,
                properties,
            });
        }
        Self { vertices, edges }
    }

    /// Evaluate a pipeline and return the terminal element ids, in order.
    pub fn eval(&self, pipeline: &Pipeline) -> Vec<ElementId> {
        let mut current: Vec<RefElem> = Vec::new();
        for step in &pipeline.steps {
            match &step.step {
                Step::Graph { element } => {
                    current = match element {
                        ElementKind::Vertex => {
                            (0..self.vertices.len()).map(RefElem::Vertex).collect()
                        }
                        ElementKind::Edge => (0..self.edges.len()).map(RefElem::Edge).collect(),
                    };
                }
                Step::Has { containers } => {
                    current.retain(|elem| {
                        containers.iter().all(|c| self.admits(*elem, &c.key, &c.predicate))
                    });
                }
                Step::Navigate {
                    direction,
                    edge_labels,
                    emit,
                } => {
                    let mut next = Vec::new();
                    for elem in &current {
                        let RefElem::Vertex(v) = elem else { continue };
                        let vertex_id = self.vertices[*v].id;
                        for dir in direction.expand() {
                            for (ei, edge) in self.edges.iter().enumerate() {
                                if !edge_labels.is_empty()
                                    && !edge_labels.iter().any(|l| l == &edge.label)
                                {
                                    continue;
                                }
                                let near = match dir {
                                    Direction::Out => edge.out_id,
                                    _ => edge.in_id,
                                };
                                if near != vertex_id {
                                    continue;
                                }
                                match emit {
                                    ElementKind::Edge => next.push(RefElem::Edge(ei)),
                                    ElementKind::Vertex => {
                                        let far = match dir {
                                            Direction::Out => edge.in_id,
                                            _ => edge.out_id,
                                        };
                                        if let Some(vi) =
                                            self.vertices.iter().position(|v| v.id == far)
                                        {
                                            next.push(RefElem::Vertex(vi));
                                        }
                                    }
                                }
                            }
                        }
                    }
                    current = next;
                }
                Step::Endpoint { direction, .. } => {
                    let mut next = Vec::new();
                    for elem in &current {
                        let RefElem::Edge(e) = elem else { continue };
                        let edge = &self.edges[*e];
                        for dir in direction.expand() {
                            let id = match dir {
                                Direction::Out => edge.out_id,
                                _ => edge.in_id,
                            };
                            if let Some(vi) = self.vertices.iter().position(|v| v.id == id) {
                                next.push(RefElem::Vertex(vi));
                            }
                        }
                    }
                    current = next;
                }
                Step::Order { keys, custom } => {
                    if !custom {
                        let keys = keys.clone();
                        current.sort_by(|a, b| {
                            for (column, order) in &keys {
                                let av = self.property(*a, column);
                                let bv = self.property(*b, column);
                                let ordering = match (av, bv) {
                                    (Some(x), Some(y)) => {
                                        x.compare(y).unwrap_or(std::cmp::Ordering::Equal)
                                    }
                                    (None, Some(_)) => std::cmp::Ordering::Greater,
                                    (Some(_), None) => std::cmp::Ordering::Less,
                                    (None, None) => std::cmp::Ordering::Equal,
                                };
                                let ordering = match order {
                                    SortOrder::Asc => ordering,
                                    SortOrder::Desc => ordering.reverse(),
                                };
                                if ordering != std::cmp::Ordering::Equal {
                                    return ordering;
                                }
                            }
                            std::cmp::Ordering::Equal
                        });
                    }
                }
                Step::Limit { count } => {
                    current.truncate(*count as usize);
                }
                // Neutral for the terminal multiset.
                Step::Identity | Step::Values { .. } | Step::Path | Step::Tree
                | Step::Select { .. } => {}
                Step::Compiled(_) => {
                    unreachable!("reference interpreter evaluates unrewritten pipelines")
                }
            }
        }
        current.iter().map(|e| self.elem_id(*e)).collect()
    }

    fn elem_id(&self, elem: RefElem) -> ElementId {
        match elem {
            RefElem::Vertex(i) => self.vertices[i].id,
            RefElem::Edge(i) => self.edges[i].id,
        }
    }

    fn property(&self, elem: RefElem, key: &str) -> Option<&Value> {
        match elem {
            RefElem::Vertex(i) => self.vertices[i].properties.get(key),
            RefElem::Edge(i) => self.edges[i].properties.get(key),
        }
    }

    fn admits(&self, elem: RefElem, key: &HasKey, predicate: &crate::Predicate) -> bool {
        match key {
            HasKey::Label => {
                let label = match elem {
                    RefElem::Vertex(i) => &self.vertices[i].label,
                    RefElem::Edge(i) => &self.edges[i].label,
                };
                predicate.test(&Value::Str(label.clone()))
            }
            HasKey::Id => predicate.test(&Value::Int(self.elem_id(elem))),
            HasKey::Property(name) => match self.property(elem, name) {
                Some(value) => predicate.test(value),
                None => false,
            },
        }
    }
}

fn row_id(row: &IndexMap<String, Value>) -> ElementId {
    row.get("ID").and_then(Value::as_int).expect("row id")
}

// ============================================================================
// Pipeline Generator
// ============================================================================

use proptest::prelude::*;

use crate::{Predicate, Traversal};

/// Random pushdown-shaped pipelines over the sample vocabulary.
///
/// `both()` is deliberately absent: combined with a folded row limit its
/// per-vertex interleaving has no single SQL emission order, so it is
/// covered by fixed tests instead.
pub fn arb_pipeline() -> impl Strategy<Value = Pipeline> {
    (
        proptest::collection::vec(0usize..8, 0..3),
        proptest::option::of(0usize..6),
        proptest::collection::vec(0usize..8, 0..2),
        proptest::option::of(1u64..5),
    )
        .prop_map(|(pre, nav, post, limit)| {
            let mut t = Traversal::v();
            for choice in pre {
                t = apply_filter(t, choice);
            }
            if let Some(nav) = nav {
                t = apply_nav(t, nav);
                for choice in post {
                    t = apply_filter(t, choice);
                }
            }
            if let Some(n) = limit {
                t = t.limit(n);
            }
            t.into_pipeline()
        })
}

fn apply_filter(t: Traversal, choice: usize) -> Traversal {
    match choice {
        0 => t.has("name", Predicate::eq("marko")),
        1 => t.has("age", Predicate::gt(30)),
        2 => t.has_between("age", 27, 33),
        3 => t.has_inside("age", 27, 33),
        4 => t.has_outside("age", 28, 33),
        5 => t.has("name", Predicate::within(["marko", "josh", "lop"])),
        6 => t.has("name", Predicate::starts_with("m")),
        _ => t.has("weight", Predicate::gte(0.5)),
    }
}

fn apply_nav(t: Traversal, choice: usize) -> Traversal {
    match choice {
        0 => t.out(&["knows"]),
        1 => t.out(&["created"]),
        2 => t.in_(&["knows"]),
        3 => t.in_(&["created"]),
        4 => t.out_e(&["created"]),
        _ => t.out_e(&["created"]).in_v(),
    }
}
