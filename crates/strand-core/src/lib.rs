//! strand-core
//!
//! Shared vocabulary of the Strand node: identifier newtypes, the ledger
//! transaction model, anchored operations, the error taxonomy, the trait
//! seams for external collaborators (ledger, content store, operation and
//! transaction stores), and the versioned protocol parameter table.

pub mod constants;
pub mod error;
pub mod params;
pub mod traits;
pub mod types;
pub mod vtl;

pub use error::StrandError;
pub use params::{ProtocolParameters, ProtocolVersioning};
pub use types::{
    AnchoredOperation, DidSuffix, LedgerReadResult, LedgerTime, LedgerTransaction, OperationType,
    QueuedOperation, ValueTimeLock,
};
