//! Compiled plan artifacts shared by the compiler and the executor.
//!
//! The strategy rewriter builds a [`ReplacedStepTree`] out of
//! [`ReplacedStep`]s; the SQL builder projects it into [`SqlStatement`]s
//! grouped into a [`SqlPlan`]; the result emitter consumes the plan and
//! never sees the compiler.

pub mod statement;
pub mod step;
pub mod tree;

#[cfg(test)]
mod statement_tests;

pub use statement::{
    AliasMap, ColumnFilter, Join, ScratchTable, SelectColumn, SortKey, SqlPlan, SqlStatement,
    StatementGroup, StatementTable,
};
pub use step::{ReplacedStep, SortOrder, StepKind};
pub use tree::{ReplacedStepTree, StepId};
