//! An in-memory reference backend.
//!
//! Executes the *structured* form of a generated statement (tables, join
//! pairs, per-node filters, ordering, limit) against rows held in memory.
//! It backs the seed-scenario and equivalence tests and exercises the
//! scratch-table lifecycle the way a real backend would.

use std::cmp::Ordering;

use indexmap::IndexMap;
use trellis_core::{
    Direction, ElementKind, ID_COLUMN, Predicate, SchemaTable, Value, fk_column,
};
use trellis_plan::{ColumnFilter, ScratchTable, SortOrder, SqlStatement};

use crate::backend::{Backend, BackendError, Row, RowStream, VecRowStream};
use crate::element::ElementId;

type MemRow = IndexMap<String, Value>;

#[derive(Debug, Default)]
struct MemTable {
    rows: Vec<MemRow>,
}

/// In-memory tables plus scratch-table storage.
#[derive(Debug, Default)]
pub struct MemBackend {
    tables: IndexMap<SchemaTable, MemTable>,
    scratches: IndexMap<String, Vec<Value>>,
    busy: bool,
    next_id: ElementId,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> ElementId {
        self.next_id += 1;
        self.next_id
    }

    pub fn insert_vertex(
        &mut self,
        schema: &str,
        label: &str,
        properties: impl IntoIterator<Item = (String, Value)>,
    ) -> ElementId {
        let id = self.alloc_id();
        let table = SchemaTable::vertex(schema, label);
        let mut row = MemRow::new();
        row.insert(ID_COLUMN.to_string(), Value::Int(id));
        row.extend(properties);
        self.tables.entry(table).or_default().rows.push(row);
        id
    }

    pub fn insert_edge(
        &mut self,
        schema: &str,
        label: &str,
        out: (&str, ElementId),
        in_: (&str, ElementId),
        properties: impl IntoIterator<Item = (String, Value)>,
    ) -> ElementId {
        let id = self.alloc_id();
        let table = SchemaTable::edge(schema, label);
        let mut row = MemRow::new();
        row.insert(ID_COLUMN.to_string(), Value::Int(id));
        row.extend(properties);
        row.insert(fk_column(schema, out.0, Direction::Out), Value::Int(out.1));
        row.insert(fk_column(schema, in_.0, Direction::In), Value::Int(in_.1));
        self.tables.entry(table).or_default().rows.push(row);
        id
    }

    /// Simulate a transaction that is mid-stream elsewhere.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Names of currently materialized scratch tables.
    pub fn scratch_names(&self) -> Vec<&str> {
        self.scratches.keys().map(String::as_str).collect()
    }

    /// All vertex rows, table by table, for reference interpretation.
    pub fn vertex_rows(&self) -> impl Iterator<Item = (&SchemaTable, &IndexMap<String, Value>)> {
        self.element_rows(ElementKind::Vertex)
    }

    /// All edge rows, table by table.
    pub fn edge_rows(&self) -> impl Iterator<Item = (&SchemaTable, &IndexMap<String, Value>)> {
        self.element_rows(ElementKind::Edge)
    }

    fn element_rows(
        &self,
        kind: ElementKind,
    ) -> impl Iterator<Item = (&SchemaTable, &IndexMap<String, Value>)> {
        self.tables
            .iter()
            .filter(move |(table, _)| table.kind() == kind)
            .flat_map(|(table, t)| t.rows.iter().map(move |row| (table, row)))
    }

    fn filter_admits(&self, filter: &ColumnFilter, row: &MemRow) -> Result<bool, BackendError> {
        let Some(value) = row.get(&filter.column) else {
            // SQL three-valued logic: NULL admits nothing, including
            // negated predicates.
            return Ok(false);
        };
        if let Some(name) = &filter.scratch {
            let Some(stored) = self.scratches.get(name) else {
                return Err(BackendError::new(format!(
                    "scratch table '{name}' does not exist"
                )));
            };
            let found = stored
                .iter()
                .any(|v| value.compare(v) == Some(Ordering::Equal));
            return Ok(match filter.predicate {
                Predicate::Without(_) => !found,
                _ => found,
            });
        }
        Ok(filter.predicate.test(value))
    }
}

impl Backend for MemBackend {
    fn ready(&self) -> bool {
        !self.busy
    }

    fn execute(&mut self, statement: &SqlStatement) -> Result<Box<dyn RowStream>, BackendError> {
        if self.busy {
            return Err(BackendError::new("backend is mid-stream"));
        }

        // Nested-loop join over the statement's tables, in join order.
        let empty: &[MemRow] = &[];
        let mut combos: Vec<Vec<&MemRow>> = vec![Vec::new()];
        for table in &statement.tables {
            let rows = self
                .tables
                .get(&table.table)
                .map(|t| t.rows.as_slice())
                .unwrap_or(empty);
            let mut next = Vec::new();
            for combo in &combos {
                'row: for row in rows {
                    if let Some(join) = &table.join {
                        let parent = combo[join.parent].get(&join.parent_column);
                        let child = row.get(&join.column);
                        match (parent, child) {
                            (Some(p), Some(c)) if p.compare(c) == Some(Ordering::Equal) => {}
                            _ => continue 'row,
                        }
                    }
                    for filter in &table.filters {
                        if !self.filter_admits(filter, row)? {
                            continue 'row;
                        }
                    }
                    let mut extended = combo.clone();
                    extended.push(row);
                    next.push(extended);
                }
            }
            combos = next;
        }

        let mut keyed: Vec<(Vec<Option<Value>>, Row)> = combos
            .into_iter()
            .map(|combo| {
                let keys = statement
                    .order_by
                    .iter()
                    .map(|key| combo[key.table].get(&key.column).cloned())
                    .collect();
                let row = statement
                    .select
                    .iter()
                    .map(|column| combo[column.table].get(&column.column).cloned())
                    .collect();
                (keys, row)
            })
            .collect();

        if !statement.order_by.is_empty() {
            keyed.sort_by(|(a, _), (b, _)| {
                for (key, (av, bv)) in statement.order_by.iter().zip(a.iter().zip(b.iter())) {
                    let ordering = match (av, bv) {
                        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
                        (None, Some(_)) => Ordering::Greater,
                        (Some(_), None) => Ordering::Less,
                        (None, None) => Ordering::Equal,
                    };
                    let ordering = match key.order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let mut rows: Vec<Row> = keyed.into_iter().map(|(_, row)| row).collect();
        if let Some(limit) = statement.limit {
            rows.truncate(limit as usize);
        }
        Ok(Box::new(VecRowStream::new(rows)))
    }

    fn create_scratch(&mut self, scratch: &ScratchTable) -> Result<(), BackendError> {
        self.scratches
            .insert(scratch.name.clone(), scratch.values.clone());
        Ok(())
    }

    fn drop_scratch(&mut self, name: &str) -> Result<(), BackendError> {
        self.scratches.shift_remove(name);
        Ok(())
    }
}
