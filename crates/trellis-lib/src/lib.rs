//! Trellis: property-graph traversals compiled onto relational storage.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_lib::{Compiler, Predicate, Topology, Traversal};
//!
//! let topology = Arc::new(Topology::from_json(r#"{
//!     "schemas": [{
//!         "name": "public",
//!         "vertices": [{"label": "person", "columns": {"name": "text"}}],
//!         "edges": []
//!     }]
//! }"#).expect("valid topology"));
//!
//! let compiler = Compiler::new(topology);
//! let pipeline = Traversal::v()
//!     .has("name", Predicate::eq("marko"))
//!     .into_pipeline();
//! let compiled = compiler.compile(&pipeline).expect("compilable");
//! assert_eq!(compiled.sql().len(), 1);
//! ```

use std::sync::Arc;

use trellis_compiler::{CompiledSource, SqlBuilder};
use trellis_core::{CompilerConfig, PostgresDialect};
use trellis_exec::Backend;

#[cfg(test)]
mod equivalence_tests;
#[cfg(test)]
mod facade_tests;
#[cfg(test)]
pub mod support;

pub use trellis_compiler::{
    Foldable, GraphSource, Pipeline, PipelineStep, SqlError, Step, Traversal, classify,
    install_strategies,
};
pub use trellis_core::{
    Catalog, Compare, CompilerConfig as Config, Dialect, Direction, ElementKind, HasContainer,
    HasKey, PostgresDialect as Postgres, Predicate, SchemaTable, TextMatch, Topology, Value,
};
pub use trellis_exec::{
    Backend as ExecBackend, Edge, Element, Emit, EmitEntry, Emitter, EmitterState, MemBackend,
    RuntimeError, Vertex,
};
pub use trellis_plan::{ReplacedStep, ReplacedStepTree, SortOrder, SqlPlan};

/// Errors from eager compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The pipeline has no source step this adapter owns.
    #[error("pipeline has no compilable source step")]
    NotCompilable,

    #[error(transparent)]
    Sql(#[from] SqlError),
}

/// Host-facing compiler: owns the topology handle, dialect, and
/// configuration, and turns pipelines into executable traversals.
pub struct Compiler {
    topology: Arc<Topology>,
    dialect: Arc<dyn Dialect>,
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            dialect: Arc::new(PostgresDialect),
            config: CompilerConfig::default(),
        }
    }

    /// Install a custom dialect implementation. Call after
    /// [`Compiler::with_config`] to override a configured dialect name.
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Install configuration; a recognized `dialect` name switches to the
    /// matching built-in implementation.
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        if let Some(dialect) = builtin_dialect(&config.dialect) {
            self.dialect = dialect;
        }
        self.config = config;
        self
    }

    /// Apply the strategy rewriter in place. Idempotent.
    pub fn install_strategies(&self, pipeline: &mut Pipeline) {
        trellis_compiler::install_strategies(pipeline);
    }

    /// Eager planning: rewrite a copy of the pipeline and build its SQL
    /// plan, so callers can inspect `is_for_multiple_queries` before
    /// execution.
    pub fn compile(&self, pipeline: &Pipeline) -> Result<CompiledTraversal, CompileError> {
        let mut pipeline = pipeline.clone();
        trellis_compiler::install_strategies(&mut pipeline);
        let Some(source) = pipeline.compiled().cloned() else {
            return Err(CompileError::NotCompilable);
        };
        let plan = SqlBuilder::new(self.topology.as_ref(), self.dialect.as_ref(), &self.config)
            .build(&source)?;
        Ok(CompiledTraversal { source, plan })
    }
}

fn builtin_dialect(name: &str) -> Option<Arc<dyn Dialect>> {
    match name {
        "postgres" => Some(Arc::new(PostgresDialect)),
        _ => None,
    }
}

/// A compiled traversal: the compiled source step plus its SQL plan.
pub struct CompiledTraversal {
    source: CompiledSource,
    plan: SqlPlan,
}

impl CompiledTraversal {
    /// The absorbed steps, for diagnostics and downstream strategies.
    pub fn replaced_steps(&self) -> &[ReplacedStep] {
        self.source.replaced_steps()
    }

    pub fn replaced_step_tree(&self) -> &ReplacedStepTree {
        self.source.replaced_step_tree()
    }

    pub fn plan(&self) -> &SqlPlan {
        &self.plan
    }

    /// Rendered SQL texts in execution order.
    pub fn sql(&self) -> Vec<&str> {
        self.plan.sql_texts()
    }

    pub fn is_for_multiple_queries(&self) -> bool {
        self.plan.is_for_multiple_queries
    }

    pub fn may_query_during_build(&self) -> bool {
        self.plan.may_query_during_build
    }

    /// Stream the traversal's path units through a backend.
    pub fn execute<'a, B: Backend>(&self, backend: &'a mut B) -> Emitter<'a, B> {
        Emitter::new(self.plan.clone(), backend)
    }
}
