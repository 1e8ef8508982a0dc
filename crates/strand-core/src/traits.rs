use async_trait::async_trait;

use crate::error::StrandError;
use crate::types::{
    AnchoredOperation, DidSuffix, LedgerReadResult, LedgerTime, LedgerTransaction,
    QueuedOperation, ValueTimeLock,
};

// ── Ledger client ─────────────────────────────────────────────────────────────

/// The anchoring ledger, as consumed by the Observer and the Batch Writer.
///
/// `read` must return `Err(StrandError::CursorInvalid)` when the supplied
/// (transaction number, time hash) pair no longer names a ledger transaction;
/// the Observer treats that as a fork signal and enters reversion.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Transactions strictly after the cursor, in (time, index) order.
    async fn read(
        &self,
        since_transaction_number: Option<u64>,
        since_time_hash: Option<&str>,
    ) -> Result<LedgerReadResult, StrandError>;

    /// The ledger's current head time and its hash.
    async fn get_latest_time(&self) -> Result<LedgerTime, StrandError>;

    /// Given a sample of previously processed transactions (newest first),
    /// the most recent one the ledger still considers valid.
    async fn get_first_valid_transaction(
        &self,
        sample: &[LedgerTransaction],
    ) -> Result<Option<LedgerTransaction>, StrandError>;

    /// Anchor `anchor_string`, paying `fee`, optionally under a writer lock.
    async fn write(
        &self,
        anchor_string: &str,
        fee: u64,
        writer_lock_id: Option<&str>,
    ) -> Result<(), StrandError>;

    /// The current value-time-lock for `id`, or the writer's own lock when
    /// `id` is absent.
    async fn get_value_time_lock(
        &self,
        id: Option<&str>,
    ) -> Result<Option<ValueTimeLock>, StrandError>;
}

// ── Content-addressable store ─────────────────────────────────────────────────

/// Outcome of a bounded content fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CasFetchResult {
    Found(Vec<u8>),
    NotFound,
    /// Content exists but its size exceeds the supplied bound.
    TooLarge,
}

/// Opaque blob storage addressed by content multihash.
#[async_trait]
pub trait ContentAddressableStore: Send + Sync {
    /// Fetch `uri`, refusing to return more than `max_size` bytes.
    async fn read(&self, uri: &str, max_size: usize) -> Result<CasFetchResult, StrandError>;

    /// Store `bytes` and return its content URI (base64url multihash).
    async fn write(&self, bytes: &[u8]) -> Result<String, StrandError>;
}

// ── Operation store ───────────────────────────────────────────────────────────

/// Persistence for anchored operations, ordered by
/// (transactionNumber, operationIndex) per DID suffix.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert a batch; idempotent on (didSuffix, transactionNumber, operationIndex).
    async fn insert_many(&self, operations: Vec<AnchoredOperation>) -> Result<(), StrandError>;

    /// All operations for `did_suffix`, ascending by the ordering key.
    async fn get(&self, did_suffix: &DidSuffix) -> Result<Vec<AnchoredOperation>, StrandError>;

    /// Remove every operation with `transaction_number > n` (fork rewind).
    async fn delete_greater_than(&self, transaction_number: u64) -> Result<(), StrandError>;
}

// ── Transaction store ─────────────────────────────────────────────────────────

/// Bookkeeping for an unresolvable transaction: one whose file set could not
/// be fetched yet.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvableTransaction {
    pub transaction: LedgerTransaction,
    pub attempts: u32,
    /// Earliest observer pass (by attempt-spaced back-off) at which the next
    /// retry may run, expressed as a Unix timestamp.
    pub next_retry_at: i64,
}

/// Cursor persistence, processed-transaction history, and unresolvable-retry
/// bookkeeping. Owned by the Observer.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Record a transaction as processed (valid or rejected alike).
    async fn add_processed(&self, transaction: &LedgerTransaction) -> Result<(), StrandError>;

    /// The most recently processed transaction, i.e. the Observer cursor.
    async fn last_processed(&self) -> Result<Option<LedgerTransaction>, StrandError>;

    /// An exponentially-spaced sample of processed transactions, newest
    /// first: offsets 1, 2, 4, 8, … back from the cursor.
    async fn exponential_sample(&self) -> Result<Vec<LedgerTransaction>, StrandError>;

    /// Drop processed records with `transaction_number > n` (fork rewind).
    async fn delete_greater_than(&self, transaction_number: u64) -> Result<(), StrandError>;

    /// Record a failed fetch attempt; returns the updated bookkeeping entry.
    async fn record_unresolvable_attempt(
        &self,
        transaction: &LedgerTransaction,
        now: i64,
    ) -> Result<UnresolvableTransaction, StrandError>;

    /// Remove a transaction from the unresolvable set (resolved or abandoned).
    async fn remove_unresolvable(&self, transaction_number: u64) -> Result<(), StrandError>;

    /// Unresolvable transactions whose back-off has elapsed at `now`.
    async fn due_unresolvable(&self, now: i64) -> Result<Vec<UnresolvableTransaction>, StrandError>;
}

// ── Batch queue ───────────────────────────────────────────────────────────────

/// Strict-FIFO queue of pending operations consumed by the Batch Writer.
#[async_trait]
pub trait OperationQueue: Send + Sync {
    /// Append one operation. Fails with `OperationAlreadyQueued` when the
    /// suffix already has a pending operation.
    async fn enqueue(&self, op: QueuedOperation) -> Result<(), StrandError>;

    /// Remove and return up to `count` operations from the head.
    async fn dequeue(&self, count: usize) -> Result<Vec<QueuedOperation>, StrandError>;

    /// Re-insert operations at the head, preserving their order (batch
    /// failure path).
    async fn requeue_front(&self, ops: Vec<QueuedOperation>) -> Result<(), StrandError>;

    /// Whether `did_suffix` currently has a queued operation.
    async fn contains(&self, did_suffix: &DidSuffix) -> Result<bool, StrandError>;

    async fn len(&self) -> Result<usize, StrandError>;
}
