use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use strand_core::traits::OperationQueue;
use strand_core::{DidSuffix, QueuedOperation, StrandError};

// ── SledOperationQueue ───────────────────────────────────────────────────────

/// The Batch Writer's FIFO, persistent across restarts:
///
///   batch_queue   — seq_be → bincode(QueuedOperation)
///   queued_suffix — suffix utf8 bytes → seq_be   (one pending op per DID)
///
/// Sequence numbers start at the midpoint of the u64 space so a failed batch
/// can be pushed back *in front of* the oldest entry without renumbering.
pub struct SledOperationQueue {
    queue: sled::Tree,
    queued_suffix: sled::Tree,
    head: AtomicU64,
    tail: AtomicU64,
}

const SEQ_ORIGIN: u64 = u64::MAX / 2;

impl SledOperationQueue {
    pub fn open(db: &sled::Db) -> Result<Self, StrandError> {
        let queue = db.open_tree("batch_queue").map_err(|e| StrandError::Storage(e.to_string()))?;
        let queued_suffix =
            db.open_tree("queued_suffix").map_err(|e| StrandError::Storage(e.to_string()))?;

        // Recover the head/tail watermarks from whatever survived a restart.
        let head = match queue.first().map_err(|e| StrandError::Storage(e.to_string()))? {
            Some((key, _)) => seq_of(&key)?,
            None => SEQ_ORIGIN,
        };
        let tail = match queue.last().map_err(|e| StrandError::Storage(e.to_string()))? {
            Some((key, _)) => seq_of(&key)? + 1,
            None => SEQ_ORIGIN,
        };
        Ok(Self { queue, queued_suffix, head: AtomicU64::new(head), tail: AtomicU64::new(tail) })
    }
}

fn seq_of(key: &[u8]) -> Result<u64, StrandError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StrandError::Storage("malformed queue key".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl OperationQueue for SledOperationQueue {
    async fn enqueue(&self, op: QueuedOperation) -> Result<(), StrandError> {
        if self
            .queued_suffix
            .contains_key(op.did_suffix.as_str().as_bytes())
            .map_err(|e| StrandError::Storage(e.to_string()))?
        {
            return Err(StrandError::OperationAlreadyQueued(op.did_suffix.to_string()));
        }
        let seq = self.tail.fetch_add(1, Ordering::SeqCst);
        let value = bincode::serialize(&op).map_err(|e| StrandError::Serialization(e.to_string()))?;
        self.queue
            .insert(seq.to_be_bytes(), value)
            .map_err(|e| StrandError::Storage(e.to_string()))?;
        self.queued_suffix
            .insert(op.did_suffix.as_str().as_bytes(), seq.to_be_bytes().to_vec())
            .map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self, count: usize) -> Result<Vec<QueuedOperation>, StrandError> {
        let mut out = Vec::new();
        while out.len() < count {
            let Some((_, bytes)) =
                self.queue.pop_min().map_err(|e| StrandError::Storage(e.to_string()))?
            else {
                break;
            };
            let op: QueuedOperation =
                bincode::deserialize(&bytes).map_err(|e| StrandError::Serialization(e.to_string()))?;
            self.queued_suffix
                .remove(op.did_suffix.as_str().as_bytes())
                .map_err(|e| StrandError::Storage(e.to_string()))?;
            out.push(op);
        }
        Ok(out)
    }

    async fn requeue_front(&self, ops: Vec<QueuedOperation>) -> Result<(), StrandError> {
        // Reinsert in reverse so the first element of `ops` ends up at the
        // head of the queue.
        for op in ops.into_iter().rev() {
            let seq = self.head.fetch_sub(1, Ordering::SeqCst) - 1;
            let value =
                bincode::serialize(&op).map_err(|e| StrandError::Serialization(e.to_string()))?;
            self.queue
                .insert(seq.to_be_bytes(), value)
                .map_err(|e| StrandError::Storage(e.to_string()))?;
            self.queued_suffix
                .insert(op.did_suffix.as_str().as_bytes(), seq.to_be_bytes().to_vec())
                .map_err(|e| StrandError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn contains(&self, did_suffix: &DidSuffix) -> Result<bool, StrandError> {
        self.queued_suffix
            .contains_key(did_suffix.as_str().as_bytes())
            .map_err(|e| StrandError::Storage(e.to_string()))
    }

    async fn len(&self) -> Result<usize, StrandError> {
        Ok(self.queue.len())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
