//! strand-observer
//!
//! The read side of the node: a single-writer loop that consumes the
//! anchoring ledger, fetches each transaction's file set through the bounded
//! download manager, reconstructs per-DID anchored operations, and persists
//! them — with fork reversion and unresolvable-transaction retry.

pub mod download;
pub mod observer;
pub mod processor;

pub use download::{DownloadHandle, DownloadManager};
pub use observer::Observer;
pub use processor::{ProcessingOutcome, TransactionProcessor};
