//! strand-ops
//!
//! Wire schemas and parse-time validation for the four DID operations.
//! Every schema refuses unknown properties; every size and format bound from
//! the active protocol parameters is enforced here, before an operation is
//! allowed anywhere near the queue or the resolver.
//!
//! Signature *verification* is not a parse-time concern: it needs the key
//! material held in DID state, so it happens during resolution.

pub mod delta;
pub mod document;
pub mod longform;
pub mod operation;
pub mod patch;
pub mod signed_data;

pub use delta::Delta;
pub use document::{DocumentContent, PublicKeyEntry, ServiceEntry};
pub use longform::{parse_did, LongFormSegment, ParsedDid};
pub use operation::{
    parse_operation, CreateOperation, DeactivateOperation, OperationSource, ParsedOperation,
    RecoverOperation, SuffixData, UpdateOperation,
};
pub use patch::Patch;
pub use signed_data::{DeactivateSignedData, RecoverSignedData, UpdateSignedData};
