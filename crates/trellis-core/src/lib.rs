//! Core data structures for Trellis.
//!
//! Two layers, mirrored by the topology module:
//! - **Deserialization layer**: 1:1 mapping to a topology JSON document
//! - **Catalog layer**: keyed, indexed structures for resolution-time lookups
//!
//! Everything the compiler and executor share lives here: property values,
//! predicates and filter clauses, schema-qualified table naming, the topology
//! catalog with its reader/writer visibility contract, the SQL dialect
//! contract, and compiler configuration.

pub mod config;
pub mod dialect;
pub mod has;
pub mod predicate;
pub mod schema;
pub mod topology;
pub mod value;

#[cfg(test)]
mod topology_tests;

pub use config::CompilerConfig;
pub use dialect::{Dialect, PostgresDialect};
pub use has::{HasContainer, HasKey};
pub use predicate::{Compare, Predicate, TextMatch};
pub use schema::{
    Direction, EDGE_TABLE_PREFIX, ElementKind, ID_COLUMN, SchemaTable, VERTEX_TABLE_PREFIX,
    fk_column, is_fk_column,
};
pub use topology::{
    Catalog, RawEdgeLabel, RawSchema, RawTopology, RawVertexLabel, Topology, TopologyError,
    TopologyWriter, parse_topology,
};
pub use value::{ColumnType, Value};
