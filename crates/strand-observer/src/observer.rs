use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use strand_core::traits::{LedgerClient, OperationStore, TransactionStore};
use strand_core::{LedgerTransaction, StrandError};

use crate::processor::{ProcessingOutcome, TransactionProcessor};

// ── Observer ─────────────────────────────────────────────────────────────────

/// The ledger-consuming loop: Idle → Fetching → Applying, with a fork branch
/// Applying → Reverting → Fetching.
///
/// Single writer over the operation store. Transactions are processed
/// strictly in ledger order; the unresolvable-retry pass runs only when the
/// ledger has nothing new.
pub struct Observer {
    ledger: Arc<dyn LedgerClient>,
    transaction_store: Arc<dyn TransactionStore>,
    operation_store: Arc<dyn OperationStore>,
    processor: TransactionProcessor,
    polling_interval: Duration,
    /// Retries before an unresolvable transaction is abandoned.
    max_retry_attempts: u32,
    running: Arc<AtomicBool>,
}

impl Observer {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        transaction_store: Arc<dyn TransactionStore>,
        operation_store: Arc<dyn OperationStore>,
        processor: TransactionProcessor,
        polling_interval: Duration,
        max_retry_attempts: u32,
    ) -> Self {
        Self {
            ledger,
            transaction_store,
            operation_store,
            processor,
            polling_interval,
            max_retry_attempts,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag handle for stopping the loop; in-flight work completes first.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Drive the loop until stopped. Run in a dedicated tokio task.
    pub async fn run(self) {
        info!("observer started");
        while self.running.load(Ordering::SeqCst) {
            match self.poll_once().await {
                Ok(more) if more => continue,
                Ok(_) => {
                    if let Err(e) = self.retry_unresolvable().await {
                        warn!(error = %e, "unresolvable retry pass failed");
                    }
                    tokio::time::sleep(self.polling_interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "observer tick failed; retrying next tick");
                    tokio::time::sleep(self.polling_interval).await;
                }
            }
        }
        info!("observer stopped");
    }

    /// One Fetching→Applying pass. Returns whether the ledger reported more
    /// transactions beyond the batch just handled.
    pub async fn poll_once(&self) -> Result<bool, StrandError> {
        let cursor = self.transaction_store.last_processed().await?;
        let (since_number, since_hash) = match &cursor {
            Some(tx) => (Some(tx.transaction_number), Some(tx.transaction_time_hash.as_str())),
            None => (None, None),
        };

        let read = match self.ledger.read(since_number, since_hash).await {
            Ok(read) => read,
            Err(StrandError::CursorInvalid) => {
                self.revert().await?;
                return Ok(true); // re-enter Fetching immediately
            }
            Err(e) => return Err(e),
        };

        for transaction in &read.transactions {
            self.apply_transaction(transaction).await?;
        }
        Ok(read.more_transactions)
    }

    async fn apply_transaction(&self, transaction: &LedgerTransaction) -> Result<(), StrandError> {
        match self.processor.process(transaction).await {
            ProcessingOutcome::Applied { operations } => {
                debug!(txn = transaction.transaction_number, operations, "applied");
                self.transaction_store.remove_unresolvable(transaction.transaction_number).await?;
            }
            ProcessingOutcome::Rejected { reason } => {
                warn!(txn = transaction.transaction_number, %reason, "rejected; marked processed");
                self.transaction_store.remove_unresolvable(transaction.transaction_number).await?;
            }
            ProcessingOutcome::Unresolvable { reason } => {
                let entry = self
                    .transaction_store
                    .record_unresolvable_attempt(transaction, chrono::Utc::now().timestamp())
                    .await?;
                warn!(txn = transaction.transaction_number, attempts = entry.attempts, %reason,
                      "unresolvable; scheduled for retry");
            }
        }
        // Processed either way: the cursor advances, retries are tracked
        // separately in the unresolvable set.
        self.transaction_store.add_processed(transaction).await?;
        Ok(())
    }

    /// Retry pass: runs only when no new transactions remain.
    async fn retry_unresolvable(&self) -> Result<(), StrandError> {
        let now = chrono::Utc::now().timestamp();
        for entry in self.transaction_store.due_unresolvable(now).await? {
            let transaction = &entry.transaction;
            match self.processor.process(transaction).await {
                ProcessingOutcome::Applied { operations } => {
                    info!(txn = transaction.transaction_number, operations, "retry resolved");
                    self.transaction_store
                        .remove_unresolvable(transaction.transaction_number)
                        .await?;
                }
                ProcessingOutcome::Rejected { reason } => {
                    warn!(txn = transaction.transaction_number, %reason,
                          "retry found transaction invalid; dropped from retry set");
                    self.transaction_store
                        .remove_unresolvable(transaction.transaction_number)
                        .await?;
                }
                ProcessingOutcome::Unresolvable { reason } => {
                    let updated = self
                        .transaction_store
                        .record_unresolvable_attempt(transaction, now)
                        .await?;
                    if updated.attempts >= self.max_retry_attempts {
                        warn!(txn = transaction.transaction_number, attempts = updated.attempts,
                              %reason, "abandoning unresolvable transaction");
                        self.transaction_store
                            .remove_unresolvable(transaction.transaction_number)
                            .await?;
                    } else {
                        debug!(txn = transaction.transaction_number, attempts = updated.attempts,
                               %reason, "still unresolvable");
                    }
                }
            }
        }
        Ok(())
    }

    /// Reverting: find the newest still-valid processed transaction via an
    /// exponentially-spaced sample and rewind both stores past the fork.
    async fn revert(&self) -> Result<(), StrandError> {
        let sample = self.transaction_store.exponential_sample().await?;
        let first_valid = self.ledger.get_first_valid_transaction(&sample).await?;

        let rewind_to = first_valid.as_ref().map_or(0, |tx| tx.transaction_number);
        warn!(rewind_to, "ledger fork detected; reverting");

        self.operation_store.delete_greater_than(rewind_to).await?;
        self.transaction_store.delete_greater_than(rewind_to).await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
