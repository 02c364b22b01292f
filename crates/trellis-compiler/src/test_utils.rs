//! Test utilities: the classic six-element sample topology and compile
//! helpers.

use trellis_core::{CompilerConfig, PostgresDialect, Topology};
use trellis_plan::SqlPlan;

use crate::pipeline::{CompiledSource, Traversal};
use crate::sql::{SqlBuilder, SqlError};
use crate::strategy::install_strategies;

pub const MODERN_TOPOLOGY: &str = r#"{
    "schemas": [{
        "name": "public",
        "vertices": [
            {"label": "person", "columns": {"name": "text", "age": "int"}},
            {"label": "software", "columns": {"name": "text", "lang": "text"}}
        ],
        "edges": [
            {"label": "knows", "columns": {"weight": "float"},
             "connections": [{"out": "person", "in": "person"}]},
            {"label": "created", "columns": {"weight": "float"},
             "connections": [{"out": "person", "in": "software"}]}
        ]
    }]
}"#;

pub fn modern_topology() -> Topology {
    Topology::from_json(MODERN_TOPOLOGY).expect("valid sample topology")
}

/// Rewrite a traversal and return its compiled source step.
pub fn compiled(traversal: Traversal) -> CompiledSource {
    let mut pipeline = traversal.into_pipeline();
    install_strategies(&mut pipeline);
    pipeline.compiled().cloned().expect("compiled source installed")
}

/// Compile a traversal down to a SQL plan against the sample topology.
pub fn plan_with(traversal: Traversal, config: &CompilerConfig) -> Result<SqlPlan, SqlError> {
    let topology = modern_topology();
    let dialect = PostgresDialect;
    SqlBuilder::new(&topology, &dialect, config).build(&compiled(traversal))
}

pub fn plan(traversal: Traversal) -> Result<SqlPlan, SqlError> {
    plan_with(traversal, &CompilerConfig::default())
}
