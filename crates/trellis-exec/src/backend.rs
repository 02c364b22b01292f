//! The backend contract: statement execution, row streams, and scratch
//! tables. Connection and transaction management live behind this seam.

use trellis_core::Value;
use trellis_plan::{ScratchTable, SqlStatement};

/// One result row, aligned with the statement's select list.
pub type Row = Vec<Option<Value>>;

/// An error reported by the backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A forward-only result set.
pub trait RowStream {
    fn next_row(&mut self) -> Result<Option<Row>, BackendError>;
}

/// Executes statements and manages scratch tables.
pub trait Backend {
    /// False while the owning transaction is busy with another streaming
    /// operation; execution must not start then.
    fn ready(&self) -> bool {
        true
    }

    /// Open exactly one result-set handle for a statement.
    fn execute(&mut self, statement: &SqlStatement) -> Result<Box<dyn RowStream>, BackendError>;

    fn create_scratch(&mut self, scratch: &ScratchTable) -> Result<(), BackendError>;

    fn drop_scratch(&mut self, name: &str) -> Result<(), BackendError>;
}

/// Row stream over a materialized row vector.
pub struct VecRowStream {
    rows: std::vec::IntoIter<Row>,
}

impl VecRowStream {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowStream for VecRowStream {
    fn next_row(&mut self) -> Result<Option<Row>, BackendError> {
        Ok(self.rows.next())
    }
}
