//! Trellis compiler: traversal pipelines rewritten into SQL plans.
//!
//! This crate provides the compilation pipeline for traversals:
//! - `pipeline` - the host step pipeline and the fluent traversal builder
//! - `classify` - foldable-shape recognition for filter clauses
//! - `strategy` - the rewriter that folds eligible prefixes into a
//!   compiled source step carrying a replaced-step tree
//! - `sql` - resolution against the topology and statement generation

pub mod classify;
pub mod pipeline;
pub mod sql;
pub mod strategy;

#[cfg(test)]
pub mod test_utils;

pub use classify::{Foldable, classify};
pub use pipeline::{CompiledSource, GraphSource, Pipeline, PipelineStep, Step, Traversal};
pub use sql::{SqlBuilder, SqlError};
pub use strategy::install_strategies;

/// Result type for SQL building.
pub type Result<T> = std::result::Result<T, SqlError>;
