//! Replaced steps: plan nodes standing in for folded traversal steps.

use indexmap::IndexSet;
use trellis_core::{Direction, ElementKind, HasContainer};

/// The original step kind a replaced step stands in for.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// `V()` or `E()`.
    Source { element: ElementKind },
    /// An out/in/both edge traversal; `emit` records whether the step
    /// produces the edge itself or hops through to the opposite vertex.
    EdgeNav { direction: Direction, emit: ElementKind },
    /// An out-vertex/in-vertex hop off an edge-producing step.
    VertexNav { direction: Direction },
    /// A property projection narrowing the emitted element's columns.
    PropertyProjection { keys: Vec<String> },
}

impl StepKind {
    /// What this step emits when it is the last step of the plan.
    pub fn emitted_element(&self) -> ElementKind {
        match self {
            StepKind::Source { element } => *element,
            StepKind::EdgeNav { emit, .. } => *emit,
            StepKind::VertexNav { .. } => ElementKind::Vertex,
            StepKind::PropertyProjection { .. } => ElementKind::Vertex,
        }
    }
}

/// Sort direction for a folded ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One node of the compilation plan.
///
/// Depth, source flag, and the emits flag are maintained by
/// [`crate::ReplacedStepTree`]; construction only fills the step's own
/// attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacedStep {
    pub kind: StepKind,
    /// Target labels to navigate to (edge labels for edge navigation,
    /// vertex labels for endpoint hops); empty means unconstrained.
    pub target_labels: Vec<String>,
    /// Absorbed filter clauses, in absorption order.
    pub filters: Vec<HasContainer>,
    /// Traversal labels carried over from folded host steps.
    pub step_labels: IndexSet<String>,
    /// Distance from the source step.
    pub depth: usize,
    pub is_source: bool,
    /// Whether this step's element is the traversal output.
    pub emits: bool,
    /// Folded ordering keys on this step's element.
    pub order_by: Vec<(String, SortOrder)>,
    /// Folded row limit; only meaningful on the emitting step.
    pub limit: Option<u64>,
}

impl ReplacedStep {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            target_labels: Vec::new(),
            filters: Vec::new(),
            step_labels: IndexSet::new(),
            depth: 0,
            is_source: false,
            emits: false,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn source(element: ElementKind) -> Self {
        Self::new(StepKind::Source { element })
    }

    pub fn edge_nav(
        direction: Direction,
        emit: ElementKind,
        target_labels: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut step = Self::new(StepKind::EdgeNav { direction, emit });
        step.target_labels = target_labels.into_iter().collect();
        step
    }

    pub fn vertex_nav(
        direction: Direction,
        target_labels: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut step = Self::new(StepKind::VertexNav { direction });
        step.target_labels = target_labels.into_iter().collect();
        step
    }

    pub fn property_projection(keys: impl IntoIterator<Item = String>) -> Self {
        Self::new(StepKind::PropertyProjection {
            keys: keys.into_iter().collect(),
        })
    }

    /// Label-keyed filters, used to narrow table enumeration.
    pub fn label_filters(&self) -> impl Iterator<Item = &HasContainer> {
        self.filters
            .iter()
            .filter(|c| matches!(c.key, trellis_core::HasKey::Label))
    }

    /// Column-backed filters (ids and properties).
    pub fn column_filters(&self) -> impl Iterator<Item = &HasContainer> {
        self.filters.iter().filter(|c| c.key.column().is_some())
    }
}

impl std::fmt::Display for ReplacedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StepKind::Source {
                element: ElementKind::Vertex,
            } => write!(f, "V()")?,
            StepKind::Source {
                element: ElementKind::Edge,
            } => write!(f, "E()")?,
            StepKind::EdgeNav { direction, emit } => {
                let arrow = match emit {
                    ElementKind::Vertex => "vertex",
                    ElementKind::Edge => "edge",
                };
                write!(f, "{direction:?}->{arrow}")?;
            }
            StepKind::VertexNav { direction } => write!(f, "{direction:?}V")?,
            StepKind::PropertyProjection { keys } => {
                write!(f, "values({})", keys.join(", "))?;
            }
        }
        if !self.target_labels.is_empty() {
            write!(f, " [{}]", self.target_labels.join(", "))?;
        }
        for filter in &self.filters {
            write!(f, " has({filter})")?;
        }
        for label in &self.step_labels {
            write!(f, " @{label}")?;
        }
        if self.emits {
            write!(f, " emit")?;
        }
        Ok(())
    }
}
