//! SQL building: resolve the replaced-step tree against the topology into
//! schema-table trees, then project those into statements.
//!
//! Resolution and rendering are separate passes. Resolution binds every
//! replaced step to the concrete tables it can reach (expanding label
//! polymorphism and BOTH navigation into branches) and narrows absorbed
//! filters to the columns each table actually has. Rendering enumerates
//! root-to-leaf paths, splits them at the dialect's join ceiling, and emits
//! one `SELECT` per partition.

mod render;
mod resolve;


pub use resolve::{SchemaTableTree, TableNode};

use trellis_core::{Catalog, CompilerConfig, Dialect};
use trellis_plan::SqlPlan;

use crate::pipeline::CompiledSource;

/// Errors surfaced before any SQL is executed.
#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    /// A label referenced during resolution is not present in the catalog.
    #[error("label '{label}' is not present in the topology")]
    UnknownLabel { label: String },

    /// A filter or ordering column exists on no table its step can bind to.
    #[error("column '{column}' does not exist on any table this step can bind to")]
    UnknownColumn { column: String },

    /// Generation exceeded a dialect limit that splitting cannot work
    /// around.
    #[error("dialect '{dialect}' cannot express this plan: {reason}")]
    DialectRejection { dialect: String, reason: String },
}

/// Projects a compiled source step into a [`SqlPlan`].
pub struct SqlBuilder<'a> {
    catalog: &'a dyn Catalog,
    dialect: &'a dyn Dialect,
    config: &'a CompilerConfig,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        dialect: &'a dyn Dialect,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            catalog,
            dialect,
            config,
        }
    }

    /// Resolve and render. Owns the derived schema-table trees for the
    /// duration of the call; the returned plan is self-contained.
    pub fn build(&self, source: &CompiledSource) -> Result<SqlPlan, SqlError> {
        let trees = resolve::resolve(self.catalog, self.config, source)?;
        render::render(self.dialect, self.config, &trees)
    }

    /// Resolution only, exposed for diagnostics.
    pub fn resolve(&self, source: &CompiledSource) -> Result<Vec<SchemaTableTree>, SqlError> {
        resolve::resolve(self.catalog, self.config, source)
    }
}
