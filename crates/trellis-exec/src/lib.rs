//! Runtime for executing compiled Trellis plans.
//!
//! This crate drives generated statements through a [`Backend`] and
//! reconstructs path-aware graph elements from flat result rows. The
//! emitter is a state machine: each call performs bounded work and yields
//! at most one path unit.

pub mod backend;
pub mod element;
pub mod emit;
pub mod emitter;
pub mod mem;


pub use backend::{Backend, BackendError, Row, RowStream, VecRowStream};
pub use element::{Edge, Element, ElementId, Vertex};
pub use emit::{Emit, EmitEntry};
pub use emitter::{Emitter, EmitterState, RuntimeError};
pub use mem::MemBackend;
