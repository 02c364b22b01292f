//! The topology catalog: which tables back which labels.
//!
//! Two layers:
//! - **Deserialization layer**: 1:1 mapping to a topology JSON document
//! - **Catalog layer**: label-keyed structures behind the [`Catalog`] trait
//!
//! Concurrency contract: many compilers may read the catalog concurrently
//! while a single writer mutates it. Readers see only committed state; the
//! writer additionally sees its own uncommitted additions until it commits
//! or rolls back. Committed state sits behind an `RwLock`; uncommitted
//! additions live in a separate overlay that only the writer thread
//! consults, so concurrent readers never contend on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::schema::{Direction, ElementKind, ID_COLUMN, SchemaTable, fk_column};
use crate::value::ColumnType;

// ============================================================================
// Deserialization Layer
// ============================================================================

/// Raw topology document.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawTopology {
    pub schemas: Vec<RawSchema>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawSchema {
    pub name: String,
    #[serde(default)]
    pub vertices: Vec<RawVertexLabel>,
    #[serde(default)]
    pub edges: Vec<RawEdgeLabel>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawVertexLabel {
    pub label: String,
    #[serde(default)]
    pub columns: IndexMap<String, ColumnType>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawEdgeLabel {
    pub label: String,
    #[serde(default)]
    pub columns: IndexMap<String, ColumnType>,
    pub connections: Vec<RawConnection>,
}

/// One `(out vertex-label, in vertex-label)` pair an edge label connects.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawConnection {
    pub out: String,
    #[serde(rename = "in")]
    pub in_: String,
}

/// Parse a topology JSON document into its raw form.
pub fn parse_topology(json: &str) -> Result<RawTopology, serde_json::Error> {
    serde_json::from_str(json)
}

// ============================================================================
// Catalog Layer
// ============================================================================

/// A vertex label bound to its backing table and typed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLabelDef {
    pub schema: String,
    pub label: String,
    pub columns: IndexMap<String, ColumnType>,
}

impl VertexLabelDef {
    pub fn table(&self) -> SchemaTable {
        SchemaTable::vertex(self.schema.clone(), &self.label)
    }
}

/// An edge label bound to its backing table, typed columns, and endpoint
/// label pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLabelDef {
    pub schema: String,
    pub label: String,
    pub columns: IndexMap<String, ColumnType>,
    pub connections: Vec<EdgeConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeConnection {
    pub out_label: String,
    pub in_label: String,
}

impl EdgeLabelDef {
    pub fn table(&self) -> SchemaTable {
        SchemaTable::edge(self.schema.clone(), &self.label)
    }
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    // Keyed by "schema.label".
    vertices: IndexMap<String, VertexLabelDef>,
    edges: IndexMap<String, EdgeLabelDef>,
}

fn state_key(schema: &str, label: &str) -> String {
    format!("{schema}.{label}")
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("invalid topology JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),

    #[error("edge label '{edge}' references unknown vertex label '{vertex}'")]
    UnknownEndpoint { edge: String, vertex: String },
}

/// Read operations the compiler performs against the catalog.
pub trait Catalog {
    fn resolve_vertex_table(&self, label: &str) -> Option<SchemaTable>;
    fn resolve_edge_table(&self, label: &str) -> Option<SchemaTable>;

    /// All vertex tables, in definition order.
    fn vertex_tables(&self) -> Vec<SchemaTable>;
    /// All edge tables, in definition order.
    fn edge_tables(&self) -> Vec<SchemaTable>;

    /// Edge tables reachable from a vertex table in a concrete direction,
    /// with the opposite endpoint's vertex table. An empty constraint
    /// matches every edge label.
    fn edge_tables_from(
        &self,
        vertex: &SchemaTable,
        direction: Direction,
        label_constraint: &[String],
    ) -> Vec<(SchemaTable, SchemaTable)>;

    /// Endpoint vertex tables of an edge table on the given side,
    /// optionally constrained by vertex label.
    fn edge_endpoints(
        &self,
        edge: &SchemaTable,
        direction: Direction,
        label_constraint: &[String],
    ) -> Vec<SchemaTable>;

    fn column_type(&self, table: &SchemaTable, column: &str) -> Option<ColumnType>;

    /// Every column of a table in row layout order: the identity column,
    /// then property columns, then (for edge tables) endpoint foreign keys.
    fn columns(&self, table: &SchemaTable) -> Vec<(String, ColumnType)>;
}

// ============================================================================
// Concrete Topology
// ============================================================================

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn thread_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide catalog with single-writer / many-reader visibility.
#[derive(Debug)]
pub struct Topology {
    committed: RwLock<CatalogState>,
    pending: Mutex<CatalogState>,
    writer: AtomicU64,
    write_session: Mutex<()>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(CatalogState::default()),
            pending: Mutex::new(CatalogState::default()),
            writer: AtomicU64::new(0),
            write_session: Mutex::new(()),
        }
    }

    /// Build a catalog from a raw topology document.
    pub fn from_raw(raw: &RawTopology) -> Result<Self, TopologyError> {
        let mut state = CatalogState::default();
        for schema in &raw.schemas {
            for vertex in &schema.vertices {
                let key = state_key(&schema.name, &vertex.label);
                let def = VertexLabelDef {
                    schema: schema.name.clone(),
                    label: vertex.label.clone(),
                    columns: vertex.columns.clone(),
                };
                if state.vertices.insert(key, def).is_some() {
                    return Err(TopologyError::DuplicateLabel(vertex.label.clone()));
                }
            }
        }
        for schema in &raw.schemas {
            for edge in &schema.edges {
                let mut connections = Vec::new();
                for connection in &edge.connections {
                    for endpoint in [&connection.out, &connection.in_] {
                        if !state
                            .vertices
                            .contains_key(&state_key(&schema.name, endpoint))
                        {
                            return Err(TopologyError::UnknownEndpoint {
                                edge: edge.label.clone(),
                                vertex: endpoint.clone(),
                            });
                        }
                    }
                    connections.push(EdgeConnection {
                        out_label: connection.out.clone(),
                        in_label: connection.in_.clone(),
                    });
                }
                let key = state_key(&schema.name, &edge.label);
                let def = EdgeLabelDef {
                    schema: schema.name.clone(),
                    label: edge.label.clone(),
                    columns: edge.columns.clone(),
                    connections,
                };
                if state.edges.insert(key, def).is_some() {
                    return Err(TopologyError::DuplicateLabel(edge.label.clone()));
                }
            }
        }
        Ok(Self {
            committed: RwLock::new(state),
            pending: Mutex::new(CatalogState::default()),
            writer: AtomicU64::new(0),
            write_session: Mutex::new(()),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        Self::from_raw(&parse_topology(json)?)
    }

    /// Open an update session. Blocks until any other writer finishes.
    /// Additions made through the returned guard are visible to this thread
    /// only, until [`TopologyWriter::commit`].
    pub fn begin_update(&self) -> TopologyWriter<'_> {
        let session = self
            .write_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.writer.store(thread_token(), Ordering::SeqCst);
        TopologyWriter {
            topology: self,
            _session: session,
        }
    }

    /// Run `f` against the visible catalog state: committed state, plus the
    /// uncommitted overlay iff the current thread is the active writer.
    fn read<R>(&self, f: impl FnOnce(&CatalogState, Option<&CatalogState>) -> R) -> R {
        let committed = read_lock(&self.committed);
        if self.writer.load(Ordering::SeqCst) == thread_token() {
            let pending = mutex_lock(&self.pending);
            f(&committed, Some(&pending))
        } else {
            f(&committed, None)
        }
    }

    fn find_vertex<R>(&self, label: &str, f: impl FnOnce(&VertexLabelDef) -> R) -> Option<R> {
        self.read(|committed, pending| {
            pending
                .and_then(|p| p.vertices.values().find(|v| v.label == label))
                .or_else(|| committed.vertices.values().find(|v| v.label == label))
                .map(f)
        })
    }

    fn find_edge<R>(&self, label: &str, f: impl FnOnce(&EdgeLabelDef) -> R) -> Option<R> {
        self.read(|committed, pending| {
            pending
                .and_then(|p| p.edges.values().find(|e| e.label == label))
                .or_else(|| committed.edges.values().find(|e| e.label == label))
                .map(f)
        })
    }

    fn columns_of(def_columns: &IndexMap<String, ColumnType>) -> Vec<(String, ColumnType)> {
        let mut columns = vec![(ID_COLUMN.to_string(), ColumnType::Int)];
        for (name, kind) in def_columns {
            columns.push((name.clone(), *kind));
        }
        columns
    }
}

impl Catalog for Topology {
    fn resolve_vertex_table(&self, label: &str) -> Option<SchemaTable> {
        self.find_vertex(label, VertexLabelDef::table)
    }

    fn resolve_edge_table(&self, label: &str) -> Option<SchemaTable> {
        self.find_edge(label, EdgeLabelDef::table)
    }

    fn vertex_tables(&self) -> Vec<SchemaTable> {
        self.read(|committed, pending| {
            let mut tables: Vec<SchemaTable> =
                committed.vertices.values().map(VertexLabelDef::table).collect();
            if let Some(pending) = pending {
                tables.extend(pending.vertices.values().map(VertexLabelDef::table));
            }
            tables
        })
    }

    fn edge_tables(&self) -> Vec<SchemaTable> {
        self.read(|committed, pending| {
            let mut tables: Vec<SchemaTable> =
                committed.edges.values().map(EdgeLabelDef::table).collect();
            if let Some(pending) = pending {
                tables.extend(pending.edges.values().map(EdgeLabelDef::table));
            }
            tables
        })
    }

    fn edge_tables_from(
        &self,
        vertex: &SchemaTable,
        direction: Direction,
        label_constraint: &[String],
    ) -> Vec<(SchemaTable, SchemaTable)> {
        debug_assert!(direction != Direction::Both, "BOTH is expanded by the caller");
        let vertex_label = vertex.label();
        self.read(|committed, pending| {
            let mut result = Vec::new();
            let pending_edges = pending.iter().flat_map(|p| p.edges.values());
            for edge in committed.edges.values().chain(pending_edges) {
                if edge.schema != vertex.schema {
                    continue;
                }
                if !label_constraint.is_empty()
                    && !label_constraint.iter().any(|l| l == &edge.label)
                {
                    continue;
                }
                for connection in &edge.connections {
                    let (near, far) = match direction {
                        Direction::Out => (&connection.out_label, &connection.in_label),
                        _ => (&connection.in_label, &connection.out_label),
                    };
                    if near == vertex_label {
                        result.push((
                            edge.table(),
                            SchemaTable::vertex(edge.schema.clone(), far),
                        ));
                    }
                }
            }
            result
        })
    }

    fn edge_endpoints(
        &self,
        edge: &SchemaTable,
        direction: Direction,
        label_constraint: &[String],
    ) -> Vec<SchemaTable> {
        debug_assert!(direction != Direction::Both, "BOTH is expanded by the caller");
        let edge_label = edge.label();
        self.read(|committed, pending| {
            let mut result = Vec::new();
            let pending_edges = pending.iter().flat_map(|p| p.edges.values());
            for def in committed.edges.values().chain(pending_edges) {
                if def.label != edge_label || def.schema != edge.schema {
                    continue;
                }
                for connection in &def.connections {
                    let endpoint = match direction {
                        Direction::Out => &connection.out_label,
                        _ => &connection.in_label,
                    };
                    if !label_constraint.is_empty()
                        && !label_constraint.iter().any(|l| l == endpoint)
                    {
                        continue;
                    }
                    let table = SchemaTable::vertex(def.schema.clone(), endpoint);
                    if !result.contains(&table) {
                        result.push(table);
                    }
                }
            }
            result
        })
    }

    fn column_type(&self, table: &SchemaTable, column: &str) -> Option<ColumnType> {
        self.columns(table)
            .into_iter()
            .find(|(name, _)| name == column)
            .map(|(_, kind)| kind)
    }

    fn columns(&self, table: &SchemaTable) -> Vec<(String, ColumnType)> {
        let label = table.label();
        match table.kind() {
            ElementKind::Vertex => self
                .find_vertex(label, |def| Self::columns_of(&def.columns))
                .unwrap_or_default(),
            ElementKind::Edge => self
                .find_edge(label, |def| {
                    let mut columns = Self::columns_of(&def.columns);
                    for connection in &def.connections {
                        for (endpoint, direction) in [
                            (&connection.out_label, Direction::Out),
                            (&connection.in_label, Direction::In),
                        ] {
                            let fk = fk_column(&def.schema, endpoint, direction);
                            if !columns.iter().any(|(name, _)| name == &fk) {
                                columns.push((fk, ColumnType::Int));
                            }
                        }
                    }
                    columns
                })
                .unwrap_or_default(),
        }
    }
}

/// Guard for a topology update session.
///
/// Dropping the guard without calling [`TopologyWriter::commit`] rolls the
/// uncommitted additions back.
pub struct TopologyWriter<'a> {
    topology: &'a Topology,
    _session: MutexGuard<'a, ()>,
}

impl TopologyWriter<'_> {
    /// Record a vertex label. No-op if the label already exists.
    pub fn ensure_vertex_label(
        &mut self,
        schema: &str,
        label: &str,
        columns: impl IntoIterator<Item = (String, ColumnType)>,
    ) {
        let key = state_key(schema, label);
        let committed = read_lock(&self.topology.committed);
        if committed.vertices.contains_key(&key) {
            return;
        }
        drop(committed);
        let mut pending = mutex_lock(&self.topology.pending);
        pending.vertices.entry(key).or_insert_with(|| VertexLabelDef {
            schema: schema.to_string(),
            label: label.to_string(),
            columns: columns.into_iter().collect(),
        });
    }

    /// Record an edge label connecting two existing vertex labels.
    pub fn ensure_edge_label(
        &mut self,
        schema: &str,
        label: &str,
        columns: impl IntoIterator<Item = (String, ColumnType)>,
        out_label: &str,
        in_label: &str,
    ) -> Result<(), TopologyError> {
        for endpoint in [out_label, in_label] {
            let key = state_key(schema, endpoint);
            let known = {
                let committed = read_lock(&self.topology.committed);
                committed.vertices.contains_key(&key)
            } || {
                let pending = mutex_lock(&self.topology.pending);
                pending.vertices.contains_key(&key)
            };
            if !known {
                return Err(TopologyError::UnknownEndpoint {
                    edge: label.to_string(),
                    vertex: endpoint.to_string(),
                });
            }
        }

        let key = state_key(schema, label);
        let connection = EdgeConnection {
            out_label: out_label.to_string(),
            in_label: in_label.to_string(),
        };

        let committed = read_lock(&self.topology.committed);
        let existing = committed.edges.get(&key).cloned();
        drop(committed);

        let mut pending = mutex_lock(&self.topology.pending);
        let def = pending.edges.entry(key).or_insert_with(|| {
            existing.unwrap_or_else(|| EdgeLabelDef {
                schema: schema.to_string(),
                label: label.to_string(),
                columns: IndexMap::new(),
                connections: Vec::new(),
            })
        });
        for (name, kind) in columns {
            def.columns.entry(name).or_insert(kind);
        }
        if !def.connections.contains(&connection) {
            def.connections.push(connection);
        }
        Ok(())
    }

    /// Publish the uncommitted additions to all readers.
    pub fn commit(self) {
        let mut committed = write_lock(&self.topology.committed);
        let mut pending = mutex_lock(&self.topology.pending);
        let additions = std::mem::take(&mut *pending);
        for (key, def) in additions.vertices {
            committed.vertices.insert(key, def);
        }
        for (key, def) in additions.edges {
            committed.edges.insert(key, def);
        }
        drop(pending);
        drop(committed);
        self.topology.writer.store(0, Ordering::SeqCst);
        // Drop runs next; pending is already empty and writer cleared.
    }

    /// Discard the uncommitted additions.
    pub fn rollback(self) {}
}

impl Drop for TopologyWriter<'_> {
    fn drop(&mut self) {
        let mut pending = mutex_lock(&self.topology.pending);
        *pending = CatalogState::default();
        drop(pending);
        self.topology.writer.store(0, Ordering::SeqCst);
    }
}
