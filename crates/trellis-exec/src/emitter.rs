//! The result emitter: a state machine that drives statements through the
//! backend and yields path units.
//!
//! States: `Init` → `Streaming` → `Done`, with `Failed` reachable from
//! anywhere on a backend error. An error is surfaced exactly once; the
//! iterator is permanently exhausted afterwards. `reset()` returns to
//! `Init` and releases every handle, so the next call re-executes from
//! scratch.
//!
//! When a plan carries several partitions per group (a chain split at the
//! dialect's join ceiling), partition rows are merged by the leading
//! element-id column; ties keep partition row order. Emission order is
//! `(group, partition-0 row, continuation row)`, which preserves the
//! `(partition, row)` contract.

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::{debug, trace};
use trellis_core::{ElementKind, ID_COLUMN, Value, is_fk_column};
use trellis_plan::{SqlPlan, SqlStatement};

use crate::backend::{Backend, BackendError, Row, RowStream};
use crate::element::{Edge, Element, ElementId, Vertex};
use crate::emit::{Emit, EmitEntry};

/// Errors surfaced while executing a plan.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Execution attempted while the owning transaction is mid-stream.
    #[error("execution attempted while the backend is mid-stream")]
    InvalidState,

    /// The backend reported an error during streaming.
    #[error("backend error: {0}")]
    Execution(#[from] BackendError),

    /// A result row did not decode into elements.
    #[error("malformed result row: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    Init,
    Streaming,
    Done,
    Failed,
}

/// A continuation row decoded from a partition after the first: the path
/// entries it contributes plus its boundary ids.
struct Continuation {
    entries: Vec<EmitEntry>,
    leaf_id: ElementId,
}

/// Streams a plan's result rows as [`Emit`] units.
pub struct Emitter<'a, B: Backend> {
    plan: SqlPlan,
    backend: &'a mut B,
    state: EmitterState,
    group: usize,
    stream: Option<Box<dyn RowStream>>,
    /// For the current group: continuation rows of partitions `1..`,
    /// keyed by their leading element id.
    continuations: Vec<IndexMap<ElementId, Vec<Continuation>>>,
    pending: VecDeque<Emit>,
    scratches: Vec<String>,
    emitted: u64,
}

impl<'a, B: Backend> Emitter<'a, B> {
    pub fn new(plan: SqlPlan, backend: &'a mut B) -> Self {
        Self {
            plan,
            backend,
            state: EmitterState::Init,
            group: 0,
            stream: None,
            continuations: Vec::new(),
            pending: VecDeque::new(),
            scratches: Vec::new(),
            emitted: 0,
        }
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    /// Drive the plan until one path unit is ready or the stream ends.
    pub fn next_emit(&mut self) -> Option<Result<Emit, RuntimeError>> {
        loop {
            match self.state {
                EmitterState::Done | EmitterState::Failed => return None,
                EmitterState::Init => {
                    if let Err(error) = self.start() {
                        return Some(Err(self.fail(error)));
                    }
                }
                EmitterState::Streaming => {
                    if let Some(limit) = self.plan.residual_limit {
                        if self.emitted >= limit {
                            self.finish();
                            return None;
                        }
                    }
                    if let Some(emit) = self.pending.pop_front() {
                        self.emitted += 1;
                        return Some(Ok(emit));
                    }
                    match self.advance() {
                        Ok(true) => {}
                        Ok(false) => {
                            self.finish();
                            return None;
                        }
                        Err(error) => return Some(Err(self.fail(error))),
                    }
                }
            }
        }
    }

    /// Return to `Init`: release the result set and all derived state;
    /// the next call re-executes from scratch.
    pub fn reset(&mut self) {
        debug!("emitter reset");
        self.release();
        self.state = EmitterState::Init;
    }

    /// Release all statement handles; the emitter is permanently
    /// exhausted afterwards.
    pub fn close(&mut self) {
        self.release();
        self.state = EmitterState::Done;
    }

    fn release(&mut self) {
        self.stream = None;
        self.continuations.clear();
        self.pending.clear();
        self.group = 0;
        self.emitted = 0;
        self.drop_scratches();
    }

    fn start(&mut self) -> Result<(), RuntimeError> {
        if !self.backend.ready() {
            return Err(RuntimeError::InvalidState);
        }
        let scratches: Vec<_> = self
            .plan
            .statements()
            .flat_map(|s| s.scratch.iter().cloned())
            .collect();
        for scratch in &scratches {
            self.backend.create_scratch(scratch)?;
            self.scratches.push(scratch.name.clone());
        }
        self.state = EmitterState::Streaming;
        self.group = 0;
        self.open_group()?;
        Ok(())
    }

    /// Execute the current group: continuations for partitions after the
    /// first are materialized up front, partition zero is streamed.
    fn open_group(&mut self) -> Result<(), RuntimeError> {
        self.stream = None;
        self.continuations.clear();
        let Some(group) = self.plan.groups.get(self.group) else {
            return Ok(());
        };
        let partitions = group.partitions.clone();
        for statement in &partitions[1..] {
            let mut by_root: IndexMap<ElementId, Vec<Continuation>> = IndexMap::new();
            let mut stream = self.backend.execute(statement)?;
            while let Some(row) = stream.next_row()? {
                let root_id = row_id(statement, &row, statement.root_id_select)?;
                let continuation = decode_continuation(statement, &row)?;
                by_root.entry(root_id).or_default().push(continuation);
            }
            self.continuations.push(by_root);
        }
        trace!(group = self.group, partitions = partitions.len(), "group opened");
        self.stream = Some(self.backend.execute(&partitions[0])?);
        Ok(())
    }

    /// Pull one row from the current partition-zero stream, expanding it
    /// through the continuation maps into pending emits. Returns false
    /// when every group is exhausted.
    fn advance(&mut self) -> Result<bool, RuntimeError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(false);
            };
            match stream.next_row()? {
                Some(row) => {
                    let statement = &self.plan.groups[self.group].partitions[0];
                    let leaf_id = row_id(statement, &row, statement.leaf_id_select)?;
                    let entries = decode_row(statement, &row)?;
                    let mut emits = Vec::new();
                    expand(&self.continuations, 0, leaf_id, entries, &mut emits);
                    self.pending.extend(emits.into_iter().map(|path| Emit { path }));
                    return Ok(true);
                }
                None => {
                    self.group += 1;
                    if self.group >= self.plan.groups.len() {
                        self.stream = None;
                        return Ok(false);
                    }
                    self.open_group()?;
                }
            }
        }
    }

    fn finish(&mut self) {
        debug!(emitted = self.emitted, "emitter done");
        self.stream = None;
        self.continuations.clear();
        self.drop_scratches();
        self.state = EmitterState::Done;
    }

    fn fail(&mut self, error: RuntimeError) -> RuntimeError {
        self.stream = None;
        self.continuations.clear();
        self.pending.clear();
        self.drop_scratches();
        self.state = EmitterState::Failed;
        error
    }

    fn drop_scratches(&mut self) {
        for name in std::mem::take(&mut self.scratches) {
            if let Err(error) = self.backend.drop_scratch(&name) {
                debug!(%name, %error, "failed to drop scratch table");
            }
        }
    }
}

impl<B: Backend> Iterator for Emitter<'_, B> {
    type Item = Result<Emit, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_emit()
    }
}

/// Join a partition-zero path with continuation rows, level by level.
/// Continuations at each level keep their row order, so ties break by
/// partition order.
fn expand(
    continuations: &[IndexMap<ElementId, Vec<Continuation>>],
    level: usize,
    leaf_id: ElementId,
    entries: Vec<EmitEntry>,
    out: &mut Vec<Vec<EmitEntry>>,
) {
    if level >= continuations.len() {
        out.push(entries);
        return;
    }
    let Some(matches) = continuations[level].get(&leaf_id) else {
        return;
    };
    for continuation in matches {
        let mut next = entries.clone();
        next.extend(continuation.entries.iter().cloned());
        expand(continuations, level + 1, continuation.leaf_id, next, out);
    }
}

fn row_id(statement: &SqlStatement, row: &Row, select_idx: usize) -> Result<ElementId, RuntimeError> {
    match row.get(select_idx) {
        Some(Some(Value::Int(id))) => Ok(*id),
        _ => Err(RuntimeError::Decode(format!(
            "missing element id in column '{}'",
            statement
                .select
                .get(select_idx)
                .map(|c| c.alias.as_str())
                .unwrap_or("?"),
        ))),
    }
}

fn decode_continuation(statement: &SqlStatement, row: &Row) -> Result<Continuation, RuntimeError> {
    let leaf_id = row_id(statement, row, statement.leaf_id_select)?;
    let entries = decode_row(statement, row)?;
    Ok(Continuation { entries, leaf_id })
}

/// Decode one row into path entries, one per participating table (the
/// repeated boundary table of a continuation partition is skipped).
fn decode_row(statement: &SqlStatement, row: &Row) -> Result<Vec<EmitEntry>, RuntimeError> {
    let mut entries = Vec::new();
    for (idx, table) in statement.tables.iter().enumerate() {
        if statement.skip_first_table && idx == 0 {
            continue;
        }
        let mut id = None;
        let mut out_id = None;
        let mut in_id = None;
        let mut properties = indexmap::IndexMap::new();
        for (pos, column) in statement.select.iter().enumerate() {
            if column.table != idx {
                continue;
            }
            let value = row.get(pos).cloned().flatten();
            if column.column == ID_COLUMN {
                id = value.as_ref().and_then(Value::as_int);
            } else if is_fk_column(&column.column) {
                let endpoint = value.as_ref().and_then(Value::as_int);
                if endpoint.is_some() {
                    if column.column.ends_with("__O") {
                        out_id = endpoint;
                    } else {
                        in_id = endpoint;
                    }
                }
            } else if let Some(value) = value {
                properties.insert(column.column.clone(), value);
            }
        }
        let Some(id) = id else {
            return Err(RuntimeError::Decode(format!(
                "row carries no id for table {}",
                table.table,
            )));
        };
        let element = match table.kind {
            ElementKind::Vertex => Element::Vertex(Vertex {
                id,
                label: table.label.clone(),
                properties,
            }),
            ElementKind::Edge => Element::Edge(Edge {
                id,
                label: table.label.clone(),
                out_id,
                in_id,
                properties,
            }),
        };
        entries.push(EmitEntry {
            element,
            labels: table.step_labels.clone(),
        });
    }
    Ok(entries)
}
