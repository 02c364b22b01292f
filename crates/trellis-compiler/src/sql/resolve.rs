//! Resolution: bind replaced steps to concrete tables.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;
use trellis_core::{
    Catalog, Compare, CompilerConfig, Direction, ElementKind, HasContainer, ID_COLUMN,
    Predicate, SchemaTable, Value,
};
use trellis_plan::{
    ColumnFilter, ReplacedStep, ReplacedStepTree, SortOrder, StepId, StepKind,
};

use super::SqlError;
use crate::pipeline::CompiledSource;

/// A replaced step bound to one concrete table.
#[derive(Debug, Clone)]
pub struct TableNode {
    pub table: SchemaTable,
    pub kind: ElementKind,
    /// For edge nodes: the side on which the parent vertex sits.
    pub direction: Option<Direction>,
    /// For vertex nodes under an edge node: which endpoint of that edge
    /// this vertex occupies.
    pub endpoint: Option<Direction>,
    pub step: StepId,
    /// Absorbed filters narrowed to this table's columns.
    pub filters: Vec<ColumnFilter>,
    /// Label filters deferred to render time; populated only when label
    /// narrowing is disabled by configuration.
    pub label_filters: Vec<HasContainer>,
    /// Columns to select, in row layout order.
    pub columns: Vec<String>,
    pub emits: bool,
    pub step_labels: IndexSet<String>,
    pub depth: usize,
    pub projection: Option<Vec<String>>,
    pub order_by: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
}

/// The resolved plan: a tree of table nodes. Every root-to-leaf path is a
/// compilable sub-plan; rendering emits one statement chain per path.
#[derive(Debug, Clone)]
pub struct SchemaTableTree {
    nodes: Vec<TableNode>,
    children: Vec<Vec<usize>>,
}

impl SchemaTableTree {
    fn from_rnode(root: RNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            children: Vec::new(),
        };
        tree.graft(root);
        tree
    }

    fn graft(&mut self, rnode: RNode) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(rnode.node);
        self.children.push(Vec::new());
        for child in rnode.children {
            let child_idx = self.graft(child);
            self.children[idx].push(child_idx);
        }
        idx
    }

    pub fn node(&self, idx: usize) -> &TableNode {
        &self.nodes[idx]
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root-to-leaf node index chains, in depth-first order.
    pub fn leaf_paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        if self.nodes.is_empty() {
            return paths;
        }
        let mut path = vec![0];
        self.collect_paths(0, &mut path, &mut paths);
        paths
    }

    fn collect_paths(&self, idx: usize, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if self.children[idx].is_empty() {
            out.push(path.clone());
            return;
        }
        for &child in &self.children[idx] {
            path.push(child);
            self.collect_paths(child, path, out);
            path.pop();
        }
    }
}

/// Nested form used while a candidate is being built; grafted into the
/// arena only once the whole chain resolved.
struct RNode {
    node: TableNode,
    children: Vec<RNode>,
}

/// Tracks which filter and ordering columns found a home on at least one
/// table, for the guaranteed-absent check.
#[derive(Default)]
struct ColumnTracker {
    seen: IndexMap<(usize, String), bool>,
}

impl ColumnTracker {
    fn require(&mut self, step: usize, column: &str) {
        self.seen.entry((step, column.to_string())).or_insert(false);
    }

    fn satisfy(&mut self, step: usize, column: &str) {
        self.seen.insert((step, column.to_string()), true);
    }

    fn check(&self) -> Result<(), SqlError> {
        for ((_, column), satisfied) in &self.seen {
            if !satisfied {
                return Err(SqlError::UnknownColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

struct Resolver<'a> {
    catalog: &'a dyn Catalog,
    config: &'a CompilerConfig,
    tree: &'a ReplacedStepTree,
    tracker: ColumnTracker,
}

/// Resolve a compiled source into schema-table trees, one per viable root
/// candidate.
pub(crate) fn resolve(
    catalog: &dyn Catalog,
    config: &CompilerConfig,
    source: &CompiledSource,
) -> Result<Vec<SchemaTableTree>, SqlError> {
    let tree = source.replaced_step_tree();
    let Some(root_id) = tree.root() else {
        return Ok(Vec::new());
    };

    validate_labels(catalog, tree)?;

    let mut resolver = Resolver {
        catalog,
        config,
        tree,
        tracker: ColumnTracker::default(),
    };

    let root_step = tree.get(root_id);
    let candidates = match source.element() {
        ElementKind::Vertex => catalog.vertex_tables(),
        ElementKind::Edge => catalog.edge_tables(),
    };

    let mut resolved = Vec::new();
    for table in candidates {
        if !resolver.label_allows(root_step, table.label()) {
            continue;
        }
        let Some(filters) = resolver.narrow(root_id, root_step, &table) else {
            continue;
        };
        let mut root = resolver.element_node(root_id, root_step, table, None, None, filters);
        if resolver.attach_children(root_id, &mut root)? {
            resolved.push(SchemaTableTree::from_rnode(root));
        }
    }

    resolver.tracker.check()?;
    trace!(trees = resolved.len(), "resolved replaced-step tree");
    Ok(resolved)
}

/// Every label named by a navigation constraint or an equality label
/// filter must exist in the catalog; resolution fails deterministically
/// before any SQL is executed otherwise.
fn validate_labels(catalog: &dyn Catalog, tree: &ReplacedStepTree) -> Result<(), SqlError> {
    let mut result = Ok(());
    tree.walk_depth_first(|_, step| {
        if result.is_err() {
            return;
        }
        match &step.kind {
            StepKind::EdgeNav { .. } => {
                for label in &step.target_labels {
                    if catalog.resolve_edge_table(label).is_none() {
                        result = Err(SqlError::UnknownLabel {
                            label: label.clone(),
                        });
                        return;
                    }
                }
            }
            StepKind::VertexNav { .. } => {
                for label in &step.target_labels {
                    if catalog.resolve_vertex_table(label).is_none() {
                        result = Err(SqlError::UnknownLabel {
                            label: label.clone(),
                        });
                        return;
                    }
                }
            }
            StepKind::Source { .. } | StepKind::PropertyProjection { .. } => {}
        }
        for filter in step.label_filters() {
            if let Predicate::Compare(Compare::Eq, Value::Str(label)) = &filter.predicate {
                let known = match step.kind.emitted_element() {
                    ElementKind::Vertex => catalog.resolve_vertex_table(label).is_some(),
                    ElementKind::Edge => catalog.resolve_edge_table(label).is_some(),
                };
                if !known {
                    result = Err(SqlError::UnknownLabel {
                        label: label.clone(),
                    });
                    return;
                }
            }
        }
    });
    result
}

impl Resolver<'_> {
    /// Whether label filters admit a candidate table. Always true when
    /// label narrowing is disabled; the filters are then applied per path
    /// at render time instead.
    fn label_allows(&self, step: &ReplacedStep, label: &str) -> bool {
        if self.config.ignore_label_optimization {
            return true;
        }
        let label = Value::Str(label.to_string());
        step.label_filters().all(|c| c.predicate.test(&label))
    }

    /// Narrow a step's column filters to a candidate table. Returns `None`
    /// (pruning the candidate) when a filter column is absent; the tracker
    /// records whether each column found a home anywhere.
    fn narrow(
        &mut self,
        id: StepId,
        step: &ReplacedStep,
        table: &SchemaTable,
    ) -> Option<Vec<ColumnFilter>> {
        let mut ok = true;
        let mut filters = Vec::new();
        for container in step.column_filters() {
            let column = container.key.column().expect("column-backed filter");
            self.tracker.require(id.index(), column);
            if self.catalog.column_type(table, column).is_some() {
                self.tracker.satisfy(id.index(), column);
                filters.push(ColumnFilter {
                    column: column.to_string(),
                    predicate: container.predicate.clone(),
                    scratch: None,
                });
            } else {
                ok = false;
            }
        }
        for (column, _) in &step.order_by {
            self.tracker.require(id.index(), column);
            if self.catalog.column_type(table, column).is_some() {
                self.tracker.satisfy(id.index(), column);
            } else {
                ok = false;
            }
        }
        ok.then_some(filters)
    }

    /// Build the node that carries a step's element: its filters, labels,
    /// projection, ordering, and the select column list.
    fn element_node(
        &self,
        id: StepId,
        step: &ReplacedStep,
        table: SchemaTable,
        direction: Option<Direction>,
        endpoint: Option<Direction>,
        filters: Vec<ColumnFilter>,
    ) -> RNode {
        let label_filters = if self.config.ignore_label_optimization {
            step.label_filters().cloned().collect()
        } else {
            Vec::new()
        };
        let columns = self.select_columns(&table, None);
        RNode {
            node: TableNode {
                kind: table.kind(),
                table,
                direction,
                endpoint,
                step: id,
                filters,
                label_filters,
                columns,
                emits: step.emits,
                step_labels: step.step_labels.clone(),
                depth: step.depth,
                projection: None,
                order_by: step.order_by.clone(),
                limit: step.limit,
            },
            children: Vec::new(),
        }
    }

    /// A pass-through edge node under a vertex-emitting navigation: joined
    /// for connectivity, decoded into the path, but carrying no filters.
    fn plumbing_edge(&self, id: StepId, depth: usize, table: SchemaTable, direction: Direction) -> RNode {
        let columns = self.select_columns(&table, None);
        RNode {
            node: TableNode {
                kind: ElementKind::Edge,
                table,
                direction: Some(direction),
                endpoint: None,
                step: id,
                filters: Vec::new(),
                label_filters: Vec::new(),
                columns,
                emits: false,
                step_labels: IndexSet::new(),
                depth,
                projection: None,
                order_by: Vec::new(),
                limit: None,
            },
            children: Vec::new(),
        }
    }

    fn select_columns(&self, table: &SchemaTable, projection: Option<&[String]>) -> Vec<String> {
        let all = self.catalog.columns(table);
        match projection {
            None => all.into_iter().map(|(name, _)| name).collect(),
            Some(keys) => {
                let mut columns = vec![ID_COLUMN.to_string()];
                for key in keys {
                    if all.iter().any(|(name, _)| name == key) {
                        columns.push(key.clone());
                    }
                }
                columns
            }
        }
    }

    /// Expand all replaced-step children of `step_id` beneath an element
    /// node. Returns false when a child navigation cannot bind to any
    /// table, which invalidates the whole candidate.
    fn attach_children(&mut self, step_id: StepId, parent: &mut RNode) -> Result<bool, SqlError> {
        for &child_id in self.tree.children(step_id) {
            let child_step = self.tree.get(child_id);
            if let StepKind::PropertyProjection { keys } = &child_step.kind {
                parent.node.projection = Some(keys.clone());
                parent.node.columns = self.select_columns(&parent.node.table, Some(keys.as_slice()));
                parent.node.emits = child_step.emits;
                for label in &child_step.step_labels {
                    parent.node.step_labels.insert(label.clone());
                }
                continue;
            }
            let nodes = self.expand_navigation(child_id, &parent.node.table)?;
            if nodes.is_empty() {
                return Ok(false);
            }
            parent.children.extend(nodes);
        }
        Ok(true)
    }

    /// Bind one navigation step against a parent element table, producing
    /// one child subtree per matching table pair.
    fn expand_navigation(
        &mut self,
        step_id: StepId,
        parent_table: &SchemaTable,
    ) -> Result<Vec<RNode>, SqlError> {
        let step = self.tree.get(step_id).clone();
        let mut out = Vec::new();
        match &step.kind {
            StepKind::EdgeNav { direction, emit } => {
                for dir in direction.expand() {
                    let pairs = self.catalog.edge_tables_from(
                        parent_table,
                        *dir,
                        &step.target_labels,
                    );
                    for (edge_table, opposite) in pairs {
                        match emit {
                            ElementKind::Edge => {
                                if !self.label_allows(&step, edge_table.label()) {
                                    continue;
                                }
                                let Some(filters) = self.narrow(step_id, &step, &edge_table)
                                else {
                                    continue;
                                };
                                let mut node = self.element_node(
                                    step_id,
                                    &step,
                                    edge_table,
                                    Some(*dir),
                                    None,
                                    filters,
                                );
                                if self.attach_children(step_id, &mut node)? {
                                    out.push(node);
                                }
                            }
                            ElementKind::Vertex => {
                                if !self.label_allows(&step, opposite.label()) {
                                    continue;
                                }
                                let Some(filters) = self.narrow(step_id, &step, &opposite)
                                else {
                                    continue;
                                };
                                let mut vertex = self.element_node(
                                    step_id,
                                    &step,
                                    opposite,
                                    None,
                                    Some(dir.reversed()),
                                    filters,
                                );
                                if !self.attach_children(step_id, &mut vertex)? {
                                    continue;
                                }
                                let mut edge =
                                    self.plumbing_edge(step_id, step.depth, edge_table, *dir);
                                edge.children.push(vertex);
                                out.push(edge);
                            }
                        }
                    }
                }
            }
            StepKind::VertexNav { direction } => {
                for dir in direction.expand() {
                    let endpoints = self.catalog.edge_endpoints(
                        parent_table,
                        *dir,
                        &step.target_labels,
                    );
                    for endpoint_table in endpoints {
                        if !self.label_allows(&step, endpoint_table.label()) {
                            continue;
                        }
                        let Some(filters) = self.narrow(step_id, &step, &endpoint_table) else {
                            continue;
                        };
                        let mut node = self.element_node(
                            step_id,
                            &step,
                            endpoint_table,
                            None,
                            Some(*dir),
                            filters,
                        );
                        if self.attach_children(step_id, &mut node)? {
                            out.push(node);
                        }
                    }
                }
            }
            StepKind::Source { .. } | StepKind::PropertyProjection { .. } => {
                unreachable!("handled by the caller")
            }
        }
        Ok(out)
    }
}
