//! Schema-qualified table naming.
//!
//! Vertex labels back onto `V_<label>` tables and edge labels onto
//! `E_<label>` tables within their schema. Edge tables carry one foreign-key
//! column per endpoint, named `<schema>.<vertex-label>__O` (out endpoint)
//! and `<schema>.<vertex-label>__I` (in endpoint).

use crate::dialect::Dialect;

pub const VERTEX_TABLE_PREFIX: &str = "V_";
pub const EDGE_TABLE_PREFIX: &str = "E_";
pub const ID_COLUMN: &str = "ID";

/// Kind of graph element a table (or step) produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Vertex,
    Edge,
}

/// Navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Out,
    In,
    Both,
}

impl Direction {
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
            Direction::Both => Direction::Both,
        }
    }

    /// The two concrete directions `Both` expands into; a concrete
    /// direction expands into itself.
    pub fn expand(self) -> &'static [Direction] {
        match self {
            Direction::Out => &[Direction::Out],
            Direction::In => &[Direction::In],
            Direction::Both => &[Direction::Out, Direction::In],
        }
    }
}

/// A concrete `(schema, table)` pair backing a vertex- or edge-label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaTable {
    pub schema: String,
    pub table: String,
}

impl SchemaTable {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn vertex(schema: impl Into<String>, label: &str) -> Self {
        Self::new(schema, format!("{VERTEX_TABLE_PREFIX}{label}"))
    }

    pub fn edge(schema: impl Into<String>, label: &str) -> Self {
        Self::new(schema, format!("{EDGE_TABLE_PREFIX}{label}"))
    }

    /// The label this table backs (table name without the kind prefix).
    pub fn label(&self) -> &str {
        self.table
            .strip_prefix(VERTEX_TABLE_PREFIX)
            .or_else(|| self.table.strip_prefix(EDGE_TABLE_PREFIX))
            .unwrap_or(&self.table)
    }

    pub fn kind(&self) -> ElementKind {
        if self.table.starts_with(EDGE_TABLE_PREFIX) {
            ElementKind::Edge
        } else {
            ElementKind::Vertex
        }
    }

    /// Render as a quoted, schema-qualified identifier.
    pub fn quoted(&self, dialect: &dyn Dialect) -> String {
        format!(
            "{}.{}",
            dialect.quote(&self.schema),
            dialect.quote(&self.table)
        )
    }
}

impl std::fmt::Display for SchemaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Foreign-key column on an edge table referencing one endpoint.
///
/// `direction` names the endpoint role: `Out` for the source vertex of the
/// edge, `In` for the target. `Both` is not a valid endpoint role.
pub fn fk_column(schema: &str, vertex_label: &str, direction: Direction) -> String {
    let suffix = match direction {
        Direction::Out => "__O",
        Direction::In => "__I",
        Direction::Both => unreachable!("BOTH is expanded before FK columns are named"),
    };
    format!("{schema}.{vertex_label}{suffix}")
}

/// True if a column name is an endpoint foreign-key column.
pub fn is_fk_column(column: &str) -> bool {
    column.contains('.') && (column.ends_with("__O") || column.ends_with("__I"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_naming() {
        let person = SchemaTable::vertex("public", "person");
        assert_eq!(person.table, "V_person");
        assert_eq!(person.label(), "person");
        assert_eq!(person.kind(), ElementKind::Vertex);

        let knows = SchemaTable::edge("public", "knows");
        assert_eq!(knows.table, "E_knows");
        assert_eq!(knows.kind(), ElementKind::Edge);
    }

    #[test]
    fn fk_naming() {
        assert_eq!(fk_column("public", "person", Direction::Out), "public.person__O");
        assert_eq!(fk_column("public", "person", Direction::In), "public.person__I");
        assert!(is_fk_column("public.person__O"));
        assert!(!is_fk_column("name"));
        assert!(!is_fk_column("ID"));
    }
}
