//! The host step pipeline and the fluent builder that assembles it.
//!
//! The pipeline is plain data: a source tag plus an ordered list of steps,
//! each optionally carrying traversal labels (`as('x')`). The builder only
//! assembles steps; all compilation happens in the strategy rewriter.

use indexmap::IndexSet;
use trellis_core::{Direction, ElementKind, HasContainer, HasKey, Predicate};
use trellis_plan::{ReplacedStep, ReplacedStepTree, SortOrder};

/// Which graph implementation a pipeline was spawned from. The rewriter
/// only touches pipelines rooted in a relational graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphSource {
    Relational,
    Foreign,
}

/// One host traversal step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `V()` / `E()`.
    Graph { element: ElementKind },
    /// A filter step holding one or more filter clauses.
    Has { containers: Vec<HasContainer> },
    /// `out()`/`in()`/`both()` and their edge-emitting `outE()` variants.
    Navigate {
        direction: Direction,
        edge_labels: Vec<String>,
        emit: ElementKind,
    },
    /// `outV()`/`inV()` off an edge-producing step.
    Endpoint {
        direction: Direction,
        vertex_labels: Vec<String>,
    },
    Identity,
    /// An ordering step; `custom` marks a comparator that has no SQL form.
    Order {
        keys: Vec<(String, SortOrder)>,
        custom: bool,
    },
    /// `limit(n)`.
    Limit { count: u64 },
    /// `values(keys)` property projection.
    Values { keys: Vec<String> },
    /// Path materialization.
    Path,
    /// Tree materialization.
    Tree,
    /// `select('x')` label consumption.
    Select { label: String },
    /// The compiled source step installed by the rewriter.
    Compiled(CompiledSource),
}

/// A step plus the traversal labels attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStep {
    pub step: Step,
    pub labels: IndexSet<String>,
}

impl PipelineStep {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            labels: IndexSet::new(),
        }
    }
}

/// A host step pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub source: GraphSource,
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(source: GraphSource) -> Self {
        Self {
            source,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(PipelineStep::new(step));
    }

    /// The compiled source step, if the rewriter installed one.
    pub fn compiled(&self) -> Option<&CompiledSource> {
        self.steps.iter().find_map(|s| match &s.step {
            Step::Compiled(compiled) => Some(compiled),
            _ => None,
        })
    }
}

/// The compiled source step: stands in for the folded prefix and carries
/// the replaced-step tree the SQL builder consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSource {
    element: ElementKind,
    tree: ReplacedStepTree,
}

impl CompiledSource {
    pub(crate) fn new(element: ElementKind, tree: ReplacedStepTree) -> Self {
        Self { element, tree }
    }

    pub fn element(&self) -> ElementKind {
        self.element
    }

    /// The absorbed steps, in insertion order.
    pub fn replaced_steps(&self) -> &[ReplacedStep] {
        self.tree.steps()
    }

    pub fn replaced_step_tree(&self) -> &ReplacedStepTree {
        &self.tree
    }
}

/// Fluent builder for pipelines, reading the way traversals read.
#[derive(Debug, Clone)]
pub struct Traversal {
    pipeline: Pipeline,
}

impl Traversal {
    fn source(source: GraphSource, element: ElementKind) -> Self {
        let mut pipeline = Pipeline::new(source);
        pipeline.push(Step::Graph { element });
        Self { pipeline }
    }

    /// `g.V()`.
    pub fn v() -> Self {
        Self::source(GraphSource::Relational, ElementKind::Vertex)
    }

    /// `g.E()`.
    pub fn e() -> Self {
        Self::source(GraphSource::Relational, ElementKind::Edge)
    }

    /// A `V()` source on a graph this adapter does not own.
    pub fn foreign_v() -> Self {
        Self::source(GraphSource::Foreign, ElementKind::Vertex)
    }

    fn push(mut self, step: Step) -> Self {
        self.pipeline.push(step);
        self
    }

    pub fn has(self, key: &str, predicate: Predicate) -> Self {
        self.push(Step::Has {
            containers: vec![HasContainer::property(key, predicate)],
        })
    }

    pub fn has_label(self, label: &str) -> Self {
        self.push(Step::Has {
            containers: vec![HasContainer::label(Predicate::eq(label))],
        })
    }

    pub fn has_id(self, predicate: Predicate) -> Self {
        self.push(Step::Has {
            containers: vec![HasContainer::id(predicate)],
        })
    }

    /// A filter step carrying an explicit clause list, for shapes that put
    /// several clauses on one step.
    pub fn has_containers(self, containers: Vec<HasContainer>) -> Self {
        self.push(Step::Has { containers })
    }

    /// `has(key, between(low, high))`: `low <= key < high`.
    pub fn has_between(
        self,
        key: &str,
        low: impl Into<trellis_core::Value>,
        high: impl Into<trellis_core::Value>,
    ) -> Self {
        self.has_containers(vec![
            HasContainer::property(key, Predicate::gte(low)),
            HasContainer::property(key, Predicate::lt(high)),
        ])
    }

    /// `has(key, inside(low, high))`: `low < key < high`.
    pub fn has_inside(
        self,
        key: &str,
        low: impl Into<trellis_core::Value>,
        high: impl Into<trellis_core::Value>,
    ) -> Self {
        self.has_containers(vec![
            HasContainer::property(key, Predicate::gt(low)),
            HasContainer::property(key, Predicate::lt(high)),
        ])
    }

    /// `has(key, outside(low, high))`: `key < low OR key > high`.
    pub fn has_outside(
        self,
        key: &str,
        low: impl Into<trellis_core::Value>,
        high: impl Into<trellis_core::Value>,
    ) -> Self {
        self.has_containers(vec![HasContainer::new(
            HasKey::property(key),
            Predicate::outside(low, high),
        )])
    }

    fn navigate(self, direction: Direction, labels: &[&str], emit: ElementKind) -> Self {
        self.push(Step::Navigate {
            direction,
            edge_labels: labels.iter().map(|l| l.to_string()).collect(),
            emit,
        })
    }

    pub fn out(self, labels: &[&str]) -> Self {
        self.navigate(Direction::Out, labels, ElementKind::Vertex)
    }

    pub fn in_(self, labels: &[&str]) -> Self {
        self.navigate(Direction::In, labels, ElementKind::Vertex)
    }

    pub fn both(self, labels: &[&str]) -> Self {
        self.navigate(Direction::Both, labels, ElementKind::Vertex)
    }

    pub fn out_e(self, labels: &[&str]) -> Self {
        self.navigate(Direction::Out, labels, ElementKind::Edge)
    }

    pub fn in_e(self, labels: &[&str]) -> Self {
        self.navigate(Direction::In, labels, ElementKind::Edge)
    }

    pub fn both_e(self, labels: &[&str]) -> Self {
        self.navigate(Direction::Both, labels, ElementKind::Edge)
    }

    pub fn out_v(self) -> Self {
        self.push(Step::Endpoint {
            direction: Direction::Out,
            vertex_labels: Vec::new(),
        })
    }

    pub fn in_v(self) -> Self {
        self.push(Step::Endpoint {
            direction: Direction::In,
            vertex_labels: Vec::new(),
        })
    }

    pub fn identity(self) -> Self {
        self.push(Step::Identity)
    }

    pub fn order_by(self, keys: &[(&str, SortOrder)]) -> Self {
        self.push(Step::Order {
            keys: keys.iter().map(|(k, o)| (k.to_string(), *o)).collect(),
            custom: false,
        })
    }

    /// An ordering step whose comparator has no SQL form.
    pub fn order_custom(self) -> Self {
        self.push(Step::Order {
            keys: Vec::new(),
            custom: true,
        })
    }

    pub fn limit(self, count: u64) -> Self {
        self.push(Step::Limit { count })
    }

    pub fn values(self, keys: &[&str]) -> Self {
        self.push(Step::Values {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        })
    }

    pub fn path(self) -> Self {
        self.push(Step::Path)
    }

    pub fn tree(self) -> Self {
        self.push(Step::Tree)
    }

    pub fn select(self, label: &str) -> Self {
        self.push(Step::Select {
            label: label.to_string(),
        })
    }

    /// Attach a traversal label to the most recent step.
    pub fn as_(mut self, label: &str) -> Self {
        if let Some(last) = self.pipeline.steps.last_mut() {
            last.labels.insert(label.to_string());
        }
        self
    }

    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }
}
