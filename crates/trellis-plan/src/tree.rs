//! The replaced-step tree: an arena of plan nodes with stable indices.
//!
//! Steps are append-only; parent/child links are stored as indices, never
//! as owning references, so the host pipeline can refer back into the plan
//! without cycles. The tree carries an insertion cursor: appends attach as
//! children of the cursor and advance it.

use trellis_core::HasContainer;

use crate::step::ReplacedStep;

/// Stable handle to a step in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u32);

impl StepId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Tree of replaced steps rooted at the source step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacedStepTree {
    steps: Vec<ReplacedStep>,
    parents: Vec<Option<StepId>>,
    children: Vec<Vec<StepId>>,
    cursor: Option<StepId>,
}

impl ReplacedStepTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step as a child of the cursor and advance the cursor to it.
    /// The first call establishes the root (the source step).
    ///
    /// Depth, the source flag, and the emits flag are maintained here: the
    /// newest step along the cursor chain is the emitting one.
    pub fn add_replaced(&mut self, mut step: ReplacedStep) -> StepId {
        let id = StepId(self.steps.len() as u32);
        match self.cursor {
            None => {
                step.depth = 0;
                step.is_source = true;
                step.emits = true;
                self.parents.push(None);
            }
            Some(cursor) => {
                step.depth = self.steps[cursor.index()].depth + 1;
                step.is_source = false;
                step.emits = true;
                self.steps[cursor.index()].emits = false;
                self.parents.push(Some(cursor));
                self.children[cursor.index()].push(id);
            }
        }
        self.steps.push(step);
        self.children.push(Vec::new());
        self.cursor = Some(id);
        id
    }

    /// Append filters to a step's absorbed list.
    pub fn add_filters(&mut self, id: StepId, filters: impl IntoIterator<Item = HasContainer>) {
        self.steps[id.index()].filters.extend(filters);
    }

    /// Record a traversal label carried over from a folded host step.
    pub fn add_label(&mut self, id: StepId, label: impl Into<String>) {
        self.steps[id.index()].step_labels.insert(label.into());
    }

    pub fn root(&self) -> Option<StepId> {
        if self.steps.is_empty() {
            None
        } else {
            Some(StepId(0))
        }
    }

    pub fn cursor(&self) -> Option<StepId> {
        self.cursor
    }

    pub fn get(&self, id: StepId) -> &ReplacedStep {
        &self.steps[id.index()]
    }

    pub fn get_mut(&mut self, id: StepId) -> &mut ReplacedStep {
        &mut self.steps[id.index()]
    }

    pub fn parent(&self, id: StepId) -> Option<StepId> {
        self.parents[id.index()]
    }

    pub fn children(&self, id: StepId) -> &[StepId] {
        &self.children[id.index()]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All steps in insertion order.
    pub fn steps(&self) -> &[ReplacedStep] {
        &self.steps
    }

    /// Preorder walk from the root.
    pub fn walk_depth_first(&self, mut visitor: impl FnMut(StepId, &ReplacedStep)) {
        let Some(root) = self.root() else {
            return;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            visitor(id, self.get(id));
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
    }
}

impl std::fmt::Display for ReplacedStepTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut result = Ok(());
        self.walk_depth_first(|_, step| {
            if result.is_ok() {
                result = writeln!(f, "{:indent$}{step}", "", indent = step.depth * 2);
            }
        });
        result
    }
}
