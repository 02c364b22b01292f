//! Generated statements: SQL text plus the structured row layout the
//! emitter needs to decode result rows back into graph elements.

use indexmap::{IndexMap, IndexSet};
use trellis_core::{ColumnType, ElementKind, Predicate, SchemaTable, Value};

use crate::step::SortOrder;

/// Bidirectional column-alias map for one statement.
///
/// Aliases are derived from `(table index, column)`, deduplicated, bounded
/// by the dialect's identifier limit, and reversible. Each statement owns
/// its own map; it is discarded with the statement once the result set is
/// fully consumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasMap {
    forward: IndexMap<(usize, String), String>,
    reverse: IndexMap<String, (usize, String)>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate (or return the existing) alias for a column of a table.
    pub fn alias(&mut self, table: usize, column: &str, max_len: usize) -> String {
        let key = (table, column.to_string());
        if let Some(existing) = self.forward.get(&key) {
            return existing.clone();
        }

        let sanitized: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let mut base = format!("a{table}_{sanitized}");
        base.truncate(max_len.saturating_sub(4));

        let mut candidate = base.clone();
        let mut n = 1;
        while self.reverse.contains_key(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }

        self.forward.insert(key.clone(), candidate.clone());
        self.reverse.insert(candidate.clone(), key);
        candidate
    }

    /// Recover `(table index, logical column)` from an alias.
    pub fn resolve(&self, alias: &str) -> Option<(usize, &str)> {
        self.reverse
            .get(alias)
            .map(|(table, column)| (*table, column.as_str()))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

/// One entry of a statement's select list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub alias: String,
    pub table: usize,
    pub column: String,
}

/// Join condition linking a table to an earlier table in the statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub parent: usize,
    pub parent_column: String,
    pub column: String,
}

/// A filter projected onto one column of one table.
///
/// `scratch` names the scratch table backing a large membership list; the
/// predicate is kept in its original form either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub predicate: Predicate,
    pub scratch: Option<String>,
}

/// One participating table of a statement, in join order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementTable {
    pub table: SchemaTable,
    pub kind: ElementKind,
    pub label: String,
    pub join: Option<Join>,
    pub filters: Vec<ColumnFilter>,
    /// Whether this table's element is the traversal output.
    pub emits: bool,
    /// Traversal labels to attach at this path position.
    pub step_labels: IndexSet<String>,
    /// Depth of the replaced step this table was resolved from.
    pub depth: usize,
    /// When set, only these property columns are selected.
    pub projection: Option<Vec<String>>,
}

/// A scratch-table request for a large membership list. Materialized by the
/// emitter through the backend immediately before execution and dropped when
/// the stream finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScratchTable {
    pub name: String,
    pub column: String,
    pub column_type: ColumnType,
    pub values: Vec<Value>,
}

/// One folded ordering key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub table: usize,
    pub column: String,
    pub order: SortOrder,
}

/// A single generated `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub tables: Vec<StatementTable>,
    pub select: Vec<SelectColumn>,
    pub aliases: AliasMap,
    pub order_by: Vec<SortKey>,
    pub limit: Option<u64>,
    pub scratch: Vec<ScratchTable>,
    /// Index into `select` of the root table's identity column.
    pub root_id_select: usize,
    /// Index into `select` of the deepest table's identity column.
    pub leaf_id_select: usize,
    /// Set on partitions after the first: the first table repeats the
    /// previous partition's leaf, and its element must not be re-emitted.
    pub skip_first_table: bool,
}

/// Partitions that together describe one logical query. A group has more
/// than one partition only when the join ceiling forced a split.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementGroup {
    pub partitions: Vec<SqlStatement>,
}

/// The full output of one SQL-building invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlan {
    pub groups: Vec<StatementGroup>,
    /// A folded row limit that could not be rendered into SQL because the
    /// plan spans several statements; enforced by the emitter.
    pub residual_limit: Option<u64>,
    /// True when more than one statement was emitted; callers that folded
    /// an ordering must then re-impose it in memory.
    pub is_for_multiple_queries: bool,
    /// Whether building this plan may have touched the database. Always
    /// false: scratch tables are materialized at execution time.
    pub may_query_during_build: bool,
}

impl SqlPlan {
    pub fn statements(&self) -> impl Iterator<Item = &SqlStatement> {
        self.groups.iter().flat_map(|g| g.partitions.iter())
    }

    pub fn statement_count(&self) -> usize {
        self.groups.iter().map(|g| g.partitions.len()).sum()
    }

    /// Rendered SQL texts in execution order.
    pub fn sql_texts(&self) -> Vec<&str> {
        self.statements().map(|s| s.sql.as_str()).collect()
    }
}
