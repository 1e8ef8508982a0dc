//! strand-files
//!
//! Codecs for the five ledger-anchored files that carry one batch of DID
//! operations, plus the on-ledger anchor payload. Each file is gzip of
//! canonical JSON; parsing always decompresses under the per-file size bound
//! from the active protocol parameters before touching the schema.
//!
//! File graph for one transaction:
//!
//!   anchor payload ─► core index ─┬─► core proof          (recover/deactivate proofs)
//!                                 └─► provisional index ─┬─► provisional proof  (update proofs)
//!                                                        └─► chunk              (all deltas)

pub mod anchor;
pub mod chunk;
pub mod compress;
pub mod core_index;
pub mod core_proof;
pub mod provisional_index;
pub mod provisional_proof;

pub use anchor::AnchorPayload;
pub use chunk::ChunkFile;
pub use core_index::{CoreIndexFile, CreateReference, OperationReference};
pub use core_proof::CoreProofFile;
pub use provisional_index::ProvisionalIndexFile;
pub use provisional_proof::ProvisionalProofFile;
