use async_trait::async_trait;

use strand_core::traits::{TransactionStore, UnresolvableTransaction};
use strand_core::{LedgerTransaction, StrandError};

// ── SledTransactionStore ─────────────────────────────────────────────────────

/// Observer bookkeeping in two sled trees:
///
///   processed    — txn_be → bincode(LedgerTransaction)
///   unresolvable — txn_be → bincode(UnresolvableTransaction)
///
/// The cursor is simply the last entry of `processed`.
pub struct SledTransactionStore {
    processed: sled::Tree,
    unresolvable: sled::Tree,
    /// Base back-off unit for unresolvable retries; doubled per attempt.
    retry_base_secs: i64,
}

impl SledTransactionStore {
    pub fn open(db: &sled::Db, retry_base_secs: i64) -> Result<Self, StrandError> {
        let processed =
            db.open_tree("processed_transactions").map_err(|e| StrandError::Storage(e.to_string()))?;
        let unresolvable = db
            .open_tree("unresolvable_transactions")
            .map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(Self { processed, unresolvable, retry_base_secs })
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.len() as u64
    }

    fn decode_processed(bytes: &[u8]) -> Result<LedgerTransaction, StrandError> {
        bincode::deserialize(bytes).map_err(|e| StrandError::Serialization(e.to_string()))
    }

    /// The most recent processed transaction with number ≤ `target`.
    fn processed_at_or_before(
        &self,
        target: u64,
    ) -> Result<Option<LedgerTransaction>, StrandError> {
        let range = ..=target.to_be_bytes().to_vec();
        match self.processed.range(range).next_back() {
            Some(item) => {
                let (_, bytes) = item.map_err(|e| StrandError::Storage(e.to_string()))?;
                Ok(Some(Self::decode_processed(&bytes)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TransactionStore for SledTransactionStore {
    async fn add_processed(&self, transaction: &LedgerTransaction) -> Result<(), StrandError> {
        let bytes =
            bincode::serialize(transaction).map_err(|e| StrandError::Serialization(e.to_string()))?;
        self.processed
            .insert(transaction.transaction_number.to_be_bytes(), bytes)
            .map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn last_processed(&self) -> Result<Option<LedgerTransaction>, StrandError> {
        match self.processed.last().map_err(|e| StrandError::Storage(e.to_string()))? {
            Some((_, bytes)) => Ok(Some(Self::decode_processed(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn exponential_sample(&self) -> Result<Vec<LedgerTransaction>, StrandError> {
        let Some(last) = self.last_processed().await? else { return Ok(Vec::new()) };

        // Ceil-halving walk over transaction numbers: 100, 50, 25, 13, 7, 4,
        // 2, 1. Recent history is densely sampled, old history sparsely.
        let mut sample: Vec<LedgerTransaction> = Vec::new();
        let mut target = last.transaction_number;
        loop {
            if let Some(tx) = self.processed_at_or_before(target)? {
                if sample.last().map(|s| s.transaction_number) != Some(tx.transaction_number) {
                    sample.push(tx);
                }
            }
            if target <= 1 {
                break;
            }
            target = target / 2 + target % 2;
        }
        Ok(sample)
    }

    async fn delete_greater_than(&self, transaction_number: u64) -> Result<(), StrandError> {
        let mut batch = sled::Batch::default();
        let start = (transaction_number + 1).to_be_bytes().to_vec();
        for item in self.processed.range(start..) {
            let (key, _) = item.map_err(|e| StrandError::Storage(e.to_string()))?;
            batch.remove(key);
        }
        self.processed.apply_batch(batch).map_err(|e| StrandError::Storage(e.to_string()))?;

        // Unresolvable entries past the fork are gone with it.
        let mut batch = sled::Batch::default();
        let start = (transaction_number + 1).to_be_bytes().to_vec();
        for item in self.unresolvable.range(start..) {
            let (key, _) = item.map_err(|e| StrandError::Storage(e.to_string()))?;
            batch.remove(key);
        }
        self.unresolvable.apply_batch(batch).map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_unresolvable_attempt(
        &self,
        transaction: &LedgerTransaction,
        now: i64,
    ) -> Result<UnresolvableTransaction, StrandError> {
        let key = transaction.transaction_number.to_be_bytes();
        let attempts = match self.unresolvable.get(key).map_err(|e| StrandError::Storage(e.to_string()))? {
            Some(bytes) => {
                let existing: UnresolvableTransaction = bincode::deserialize(&bytes)
                    .map_err(|e| StrandError::Serialization(e.to_string()))?;
                existing.attempts + 1
            }
            None => 1,
        };
        // Exponential back-off: base × 2^(attempts-1).
        let backoff = self.retry_base_secs.saturating_mul(1_i64 << (attempts - 1).min(32));
        let entry = UnresolvableTransaction {
            transaction: transaction.clone(),
            attempts,
            next_retry_at: now + backoff,
        };
        let bytes =
            bincode::serialize(&entry).map_err(|e| StrandError::Serialization(e.to_string()))?;
        self.unresolvable.insert(key, bytes).map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(entry)
    }

    async fn remove_unresolvable(&self, transaction_number: u64) -> Result<(), StrandError> {
        self.unresolvable
            .remove(transaction_number.to_be_bytes())
            .map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn due_unresolvable(
        &self,
        now: i64,
    ) -> Result<Vec<UnresolvableTransaction>, StrandError> {
        let mut due = Vec::new();
        for item in self.unresolvable.iter() {
            let (_, bytes) = item.map_err(|e| StrandError::Storage(e.to_string()))?;
            let entry: UnresolvableTransaction = bincode::deserialize(&bytes)
                .map_err(|e| StrandError::Serialization(e.to_string()))?;
            if entry.next_retry_at <= now {
                due.push(entry);
            }
        }
        Ok(due)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
