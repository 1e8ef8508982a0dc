//! strand-batch
//!
//! The write side of the node: drains the pending-operation queue on a
//! timer, assembles one batch into the five anchored files, publishes them
//! to the content store, and anchors the core index file on the ledger —
//! sized by the writer's value-time-lock.

pub mod assemble;
pub mod writer;

pub use assemble::{assemble_batch, AssembledBatch};
pub use writer::{BatchSummary, BatchWriter, BatchWriterConfig};
