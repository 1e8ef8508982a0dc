//! strand-store
//!
//! sled-backed persistence (pure Rust, no C dependencies): the anchored
//! operation store, the transaction store (Observer cursor, processed
//! history, unresolvable bookkeeping), a content-addressable store, and the
//! Batch Writer's persistent FIFO queue.
//!
//! All four open named trees from one shared `sled::Db`; values are bincode.

pub mod cas;
pub mod operation_store;
pub mod queue;
pub mod transaction_store;

pub use cas::SledContentStore;
pub use operation_store::SledOperationStore;
pub use queue::SledOperationQueue;
pub use transaction_store::SledTransactionStore;
