use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger time (block height). Transaction numbers embed this value.
pub type TransactionTime = u64;

// ── DidSuffix ────────────────────────────────────────────────────────────────

/// The unique suffix of a DID: base64url multihash of the canonical JSON of
/// the create operation's suffix data. Fixed shape `E<base64url digest>`,
/// 46 characters for SHA-256.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DidSuffix(pub String);

impl DidSuffix {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the full DID for this suffix, e.g. `did:strand:EiA...`.
    pub fn to_did(&self, method: &str) -> String {
        format!("did:{}:{}", method, self.0)
    }
}

impl fmt::Display for DidSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DidSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.0.get(..8.min(self.0.len())).unwrap_or(&self.0);
        write!(f, "DidSuffix({head}…)")
    }
}

// ── OperationType ────────────────────────────────────────────────────────────

/// The four DID operation kinds, in batch ordering precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Recover,
    Deactivate,
    Update,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Create => "create",
            OperationType::Recover => "recover",
            OperationType::Deactivate => "deactivate",
            OperationType::Update => "update",
        };
        write!(f, "{s}")
    }
}

// ── Ledger models ────────────────────────────────────────────────────────────

/// One anchoring transaction as reported by the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    /// Monotonic position assigned by the ledger across its whole history.
    pub transaction_number: u64,
    /// Ledger time (block height) at which the transaction was anchored.
    pub transaction_time: TransactionTime,
    /// Hash of the ledger time unit, used to detect forks.
    pub transaction_time_hash: String,
    /// The anchor payload carried by the transaction (base64url).
    pub anchor_string: String,
    /// Fee actually paid by the writer.
    pub transaction_fee_paid: u64,
    /// Per-operation normalized fee at this ledger time.
    pub normalized_transaction_fee: u64,
    /// Ledger identity of the writer that anchored this transaction.
    pub writer: String,
}

/// Result of a cursor read against the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReadResult {
    pub more_transactions: bool,
    pub transactions: Vec<LedgerTransaction>,
}

/// The ledger's current head time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTime {
    pub time: TransactionTime,
    pub hash: String,
}

/// An on-ledger value-time-lock: collateral that entitles `owner` to write
/// batches larger than the lock-free cap during [lock_time, unlock_time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueTimeLock {
    pub identifier: String,
    pub owner: String,
    pub amount_locked: u64,
    pub lock_transaction_time: TransactionTime,
    pub unlock_transaction_time: TransactionTime,
    /// Normalized fee at the time the lock was committed.
    pub normalized_fee: u64,
}

// ── AnchoredOperation ────────────────────────────────────────────────────────

/// An operation reconstructed from a processed ledger transaction and pinned
/// to its position in ledger order.
///
/// `(transaction_number, operation_index)` is the total ordering key across
/// all DIDs. `operation_buffer` holds the composed operation request JSON;
/// the resolver re-parses it lazily so a malformed buffer degrades to an
/// ineffective operation instead of poisoning the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchoredOperation {
    pub did_suffix: DidSuffix,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub operation_buffer: Vec<u8>,
    pub transaction_number: u64,
    pub transaction_time: TransactionTime,
    pub operation_index: u32,
}

impl AnchoredOperation {
    /// The total ordering key: ascending (transactionNumber, operationIndex).
    pub fn order_key(&self) -> (u64, u32) {
        (self.transaction_number, self.operation_index)
    }
}

// ── QueuedOperation ──────────────────────────────────────────────────────────

/// A pending operation awaiting batching: the raw request body as received,
/// plus the DID suffix it targets (one queued operation per suffix).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub did_suffix: DidSuffix,
    pub operation_buffer: Vec<u8>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
