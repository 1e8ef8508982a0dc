use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use strand_core::traits::{ContentAddressableStore, LedgerClient, OperationQueue};
use strand_core::{vtl, ProtocolVersioning, QueuedOperation, StrandError};
use strand_files::{AnchorPayload, CoreIndexFile, ProvisionalIndexFile};

use crate::assemble::assemble_batch;

// ── Config ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct BatchWriterConfig {
    pub batch_interval: Duration,
    /// The writer's value-time-lock id, embedded in the core index file and
    /// presented to the ledger on write.
    pub writer_lock_id: Option<String>,
    /// Per-operation fee floor used when no lock supplies a normalized fee.
    pub base_fee_per_operation: u64,
}

impl Default for BatchWriterConfig {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_secs(600),
            writer_lock_id: None,
            base_fee_per_operation: 1,
        }
    }
}

/// What one successful tick anchored.
#[derive(Clone, Debug)]
pub struct BatchSummary {
    pub operations: usize,
    pub core_index_file_uri: String,
    pub anchor_string: String,
    pub fee: u64,
}

// ── BatchWriter ──────────────────────────────────────────────────────────────

/// Timer-driven consumer of the pending-operation queue.
///
/// Each tick drains up to `min(queue, lockBudget, protocolCap)` operations,
/// assembles and publishes the file set, and anchors it. Any failure puts
/// the drained operations back at the head of the queue; nothing is ever
/// silently dropped.
pub struct BatchWriter {
    queue: Arc<dyn OperationQueue>,
    cas: Arc<dyn ContentAddressableStore>,
    ledger: Arc<dyn LedgerClient>,
    versioning: Arc<ProtocolVersioning>,
    config: BatchWriterConfig,
    running: Arc<AtomicBool>,
}

impl BatchWriter {
    pub fn new(
        queue: Arc<dyn OperationQueue>,
        cas: Arc<dyn ContentAddressableStore>,
        ledger: Arc<dyn LedgerClient>,
        versioning: Arc<ProtocolVersioning>,
        config: BatchWriterConfig,
    ) -> Self {
        Self { queue, cas, ledger, versioning, config, running: Arc::new(AtomicBool::new(true)) }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Drive the timer loop. Ticks that land while a batch is still being
    /// written are skipped, not queued.
    pub async fn run(self) {
        info!(interval = ?self.config.batch_interval, "batch writer started");
        let mut ticker = tokio::time::interval(self.config.batch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            match self.write_batch_once().await {
                Ok(Some(summary)) => {
                    info!(operations = summary.operations, uri = %summary.core_index_file_uri,
                          "batch anchored");
                }
                Ok(None) => debug!("nothing to batch"),
                Err(e) => error!(error = %e, "batch write failed; operations requeued"),
            }
        }
        info!("batch writer stopped");
    }

    /// One tick: returns `Ok(None)` when the queue yields nothing.
    pub async fn write_batch_once(&self) -> Result<Option<BatchSummary>, StrandError> {
        let latest_time = self.ledger.get_latest_time().await?;
        let params = self.versioning.parameters_at(latest_time.time);

        let lock =
            self.ledger.get_value_time_lock(self.config.writer_lock_id.as_deref()).await?;
        let normalized_fee =
            lock.as_ref().map_or(self.config.base_fee_per_operation, |l| l.normalized_fee);
        let lock_budget = vtl::max_operations_allowed(lock.as_ref(), normalized_fee, params);

        let queue_len = self.queue.len().await?;
        let batch_size = queue_len.min(lock_budget).min(params.max_operations_per_batch);
        if batch_size == 0 {
            return Ok(None);
        }

        let operations = self.queue.dequeue(batch_size).await?;
        match self.publish(&operations, normalized_fee, params).await {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                // Return the drained operations to the head, original order.
                self.queue.requeue_front(operations).await?;
                Err(e)
            }
        }
    }

    async fn publish(
        &self,
        operations: &[QueuedOperation],
        normalized_fee: u64,
        params: &strand_core::ProtocolParameters,
    ) -> Result<BatchSummary, StrandError> {
        let batch = assemble_batch(operations, params)?;

        let core_proof_uri = match &batch.core_proof_file {
            Some(bytes) => Some(self.cas.write(bytes).await?),
            None => None,
        };
        let provisional_proof_uri = match &batch.provisional_proof_file {
            Some(bytes) => Some(self.cas.write(bytes).await?),
            None => None,
        };

        // Provisional index exists exactly when the batch has deltas.
        let provisional_index_uri = match &batch.chunk_file {
            Some(chunk_bytes) => {
                let chunk_uri = self.cas.write(chunk_bytes).await?;
                let provisional_bytes = ProvisionalIndexFile::build(
                    chunk_uri,
                    provisional_proof_uri,
                    batch.update_references.clone(),
                    params,
                )?;
                Some(self.cas.write(&provisional_bytes).await?)
            }
            None => None,
        };

        let core_bytes = CoreIndexFile::build(
            self.config.writer_lock_id.clone(),
            provisional_index_uri,
            core_proof_uri,
            batch.create_references.clone(),
            batch.recover_references.clone(),
            batch.deactivate_references.clone(),
            params,
        )?;
        let core_index_file_uri = self.cas.write(&core_bytes).await?;

        let payload = AnchorPayload { core_index_file_uri: core_index_file_uri.clone() };
        let anchor_string = payload.to_anchor_string()?;
        let fee = normalized_fee.saturating_mul(batch.operation_count as u64);

        self.ledger
            .write(&anchor_string, fee, self.config.writer_lock_id.as_deref())
            .await?;

        Ok(BatchSummary {
            operations: batch.operation_count,
            core_index_file_uri,
            anchor_string,
            fee,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use strand_core::traits::CasFetchResult;
    use strand_core::{
        LedgerReadResult, LedgerTime, LedgerTransaction, ProtocolParameters, ValueTimeLock,
    };
    use strand_store::{SledContentStore, SledOperationQueue};

    // Ledger stub: records writes, serves a configurable lock, and can be
    // told to fail writes.
    #[derive(Default)]
    struct RecordingLedger {
        writes: Mutex<Vec<(String, u64, Option<String>)>>,
        lock: Mutex<Option<ValueTimeLock>>,
        fail_writes: Mutex<bool>,
    }

    #[async_trait]
    impl LedgerClient for RecordingLedger {
        async fn read(
            &self,
            _: Option<u64>,
            _: Option<&str>,
        ) -> Result<LedgerReadResult, StrandError> {
            Ok(LedgerReadResult { more_transactions: false, transactions: vec![] })
        }

        async fn get_latest_time(&self) -> Result<LedgerTime, StrandError> {
            Ok(LedgerTime { time: 500, hash: "h500".into() })
        }

        async fn get_first_valid_transaction(
            &self,
            _: &[LedgerTransaction],
        ) -> Result<Option<LedgerTransaction>, StrandError> {
            Ok(None)
        }

        async fn write(
            &self,
            anchor_string: &str,
            fee: u64,
            writer_lock_id: Option<&str>,
        ) -> Result<(), StrandError> {
            if *self.fail_writes.lock().unwrap() {
                return Err(StrandError::Ledger("simulated write outage".into()));
            }
            self.writes.lock().unwrap().push((
                anchor_string.to_string(),
                fee,
                writer_lock_id.map(str::to_owned),
            ));
            Ok(())
        }

        async fn get_value_time_lock(
            &self,
            _id: Option<&str>,
        ) -> Result<Option<ValueTimeLock>, StrandError> {
            Ok(self.lock.lock().unwrap().clone())
        }
    }

    struct Harness {
        queue: Arc<SledOperationQueue>,
        cas: Arc<SledContentStore>,
        ledger: Arc<RecordingLedger>,
        writer: BatchWriter,
    }

    fn harness(name: &str, config: BatchWriterConfig) -> Harness {
        let dir = std::env::temp_dir().join(format!("strand_batchwriter_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = sled::open(&dir).expect("open temp db");
        let queue = Arc::new(SledOperationQueue::open(&db).unwrap());
        let cas = Arc::new(SledContentStore::open(&db).unwrap());
        let ledger = Arc::new(RecordingLedger::default());
        let writer = BatchWriter::new(
            queue.clone(),
            cas.clone(),
            ledger.clone(),
            Arc::new(ProtocolVersioning::default()),
            config,
        );
        Harness { queue, cas, ledger, writer }
    }

    use crate::assemble::tests::{queued_create, queued_deactivate, queued_update};

    fn suffix_of(seed: u8) -> String {
        strand_crypto::multihash::commitment(&serde_json::json!({ "seed": seed })).unwrap()
    }

    #[tokio::test]
    async fn empty_queue_skips_tick() {
        let h = harness("empty", BatchWriterConfig::default());
        assert!(h.writer.write_batch_once().await.unwrap().is_none());
        assert!(h.ledger.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn anchors_full_batch_and_files_are_reparseable() {
        let h = harness("anchor", BatchWriterConfig::default());
        h.queue.enqueue(queued_create(41, 42)).await.unwrap();
        h.queue.enqueue(queued_update(&suffix_of(1), 43, 44)).await.unwrap();
        h.queue.enqueue(queued_deactivate(&suffix_of(2), 45)).await.unwrap();

        let summary = h.writer.write_batch_once().await.unwrap().unwrap();
        assert_eq!(summary.operations, 3);
        assert_eq!(h.queue.len().await.unwrap(), 0);

        // The ledger saw exactly one anchoring write carrying the payload.
        let writes = h.ledger.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, summary.anchor_string);
        assert_eq!(writes[0].1, summary.fee);

        // The anchored core index file round-trips through the CAS.
        let params = ProtocolParameters::default();
        let payload = AnchorPayload::from_anchor_string(&summary.anchor_string, &params).unwrap();
        let CasFetchResult::Found(core_bytes) = h
            .cas
            .read(&payload.core_index_file_uri, params.max_core_index_file_size)
            .await
            .unwrap()
        else {
            panic!("core index file not in CAS");
        };
        let core = CoreIndexFile::parse(&core_bytes, &params).unwrap();
        let ops = core.operations.unwrap();
        assert_eq!(ops.create.len(), 1);
        assert_eq!(ops.deactivate.len(), 1);
        assert!(core.provisional_index_file_uri.is_some());
        assert!(core.core_proof_file_uri.is_some());
    }

    #[tokio::test]
    async fn lock_budget_caps_batch_size() {
        let h = harness("lockcap", BatchWriterConfig::default());
        // Lock buys exactly 2 operations: 2 × (10 × 1.0 × 600) = 12_000...
        // but the floor against the lock-free cap dominates below it, so use
        // a tighter protocol table instead.
        let versioning = ProtocolVersioning::single(ProtocolParameters {
            max_operations_per_batch_without_lock: 2,
            ..Default::default()
        });
        let writer = BatchWriter::new(
            h.queue.clone(),
            h.cas.clone(),
            h.ledger.clone(),
            Arc::new(versioning),
            BatchWriterConfig::default(),
        );

        for seed in [(51, 52), (53, 54), (55, 56)] {
            h.queue.enqueue(queued_create(seed.0, seed.1)).await.unwrap();
        }
        let summary = writer.write_batch_once().await.unwrap().unwrap();
        assert_eq!(summary.operations, 2);
        assert_eq!(h.queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn value_time_lock_expands_budget() {
        let h = harness("vtl", BatchWriterConfig { writer_lock_id: Some("lock-1".into()), ..Default::default() });
        *h.ledger.lock.lock().unwrap() = Some(ValueTimeLock {
            identifier: "lock-1".into(),
            owner: "writer".into(),
            amount_locked: 6_000_000,
            lock_transaction_time: 0,
            unlock_transaction_time: 1_000,
            normalized_fee: 10,
        });
        h.queue.enqueue(queued_create(61, 62)).await.unwrap();

        let summary = h.writer.write_batch_once().await.unwrap().unwrap();
        // Fee covers the operation count at the lock's normalized fee.
        assert_eq!(summary.fee, 10);
        let writes = h.ledger.writes.lock().unwrap();
        assert_eq!(writes[0].2.as_deref(), Some("lock-1"));
    }

    #[tokio::test]
    async fn failed_anchor_requeues_in_order() {
        let h = harness("requeue", BatchWriterConfig::default());
        h.queue.enqueue(queued_create(71, 72)).await.unwrap();
        h.queue.enqueue(queued_update(&suffix_of(3), 73, 74)).await.unwrap();
        *h.ledger.fail_writes.lock().unwrap() = true;

        assert!(h.writer.write_batch_once().await.is_err());
        assert_eq!(h.queue.len().await.unwrap(), 2);

        // Recovery: the next tick anchors the same operations, FIFO intact.
        *h.ledger.fail_writes.lock().unwrap() = false;
        let summary = h.writer.write_batch_once().await.unwrap().unwrap();
        assert_eq!(summary.operations, 2);
        assert_eq!(h.queue.len().await.unwrap(), 0);
    }
}
