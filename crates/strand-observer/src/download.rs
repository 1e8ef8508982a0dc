use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Semaphore};
use tracing::debug;

use strand_core::traits::{CasFetchResult, ContentAddressableStore};
use strand_core::StrandError;

// ── Handles ──────────────────────────────────────────────────────────────────

/// A claim ticket for one scheduled download: slot index plus a generation
/// counter, so a stale handle can never observe a recycled slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadHandle {
    index: usize,
    generation: u64,
}

// ── Slot arena ───────────────────────────────────────────────────────────────

struct DownloadSlot {
    generation: u64,
    receiver: Option<oneshot::Receiver<Result<CasFetchResult, StrandError>>>,
}

#[derive(Default)]
struct SlotArena {
    slots: Vec<DownloadSlot>,
    free: Vec<usize>,
}

impl SlotArena {
    fn allocate(
        &mut self,
        receiver: oneshot::Receiver<Result<CasFetchResult, StrandError>>,
    ) -> DownloadHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.receiver = Some(receiver);
                DownloadHandle { index, generation: slot.generation }
            }
            None => {
                self.slots.push(DownloadSlot { generation: 0, receiver: Some(receiver) });
                DownloadHandle { index: self.slots.len() - 1, generation: 0 }
            }
        }
    }

    fn take_receiver(
        &mut self,
        handle: DownloadHandle,
    ) -> Option<oneshot::Receiver<Result<CasFetchResult, StrandError>>> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.receiver.take()
    }

    fn release(&mut self, handle: DownloadHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index) {
            if slot.generation == handle.generation {
                // Bump the generation so outstanding copies of the handle die.
                slot.generation += 1;
                slot.receiver = None;
                self.free.push(handle.index);
            }
        }
    }
}

// ── DownloadManager ──────────────────────────────────────────────────────────

/// Fan-out content fetches with a hard concurrency bound.
///
/// `schedule` returns immediately; the fetch runs in a spawned task gated by
/// a semaphore so at most `max_concurrent` downloads are in flight.
/// `await_completion` consumes the handle: the slot is recycled once the
/// awaiter has observed the result.
pub struct DownloadManager {
    cas: Arc<dyn ContentAddressableStore>,
    semaphore: Arc<Semaphore>,
    arena: Mutex<SlotArena>,
}

impl DownloadManager {
    pub fn new(cas: Arc<dyn ContentAddressableStore>, max_concurrent: usize) -> Self {
        Self {
            cas,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            arena: Mutex::new(SlotArena::default()),
        }
    }

    /// Queue a fetch of `uri`, bounded to `max_size` bytes.
    pub fn schedule(&self, uri: String, max_size: usize) -> DownloadHandle {
        let (sender, receiver) = oneshot::channel();
        let handle = self.arena.lock().expect("arena lock").allocate(receiver);

        let cas = Arc::clone(&self.cas);
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            debug!(%uri, "download started");
            let result = cas.read(&uri, max_size).await;
            // The awaiter may have given up; a dropped receiver is fine.
            let _ = sender.send(result);
        });
        handle
    }

    /// Wait for a scheduled download and release its slot.
    pub async fn await_completion(
        &self,
        handle: DownloadHandle,
    ) -> Result<CasFetchResult, StrandError> {
        let receiver = self
            .arena
            .lock()
            .expect("arena lock")
            .take_receiver(handle)
            .ok_or_else(|| StrandError::Other("stale or consumed download handle".into()))?;

        let result = receiver
            .await
            .map_err(|_| StrandError::ContentStore("download task dropped".into()));
        self.arena.lock().expect("arena lock").release(handle);
        result?
    }

    /// Convenience: schedule and await in one call.
    pub async fn fetch(&self, uri: &str, max_size: usize) -> Result<CasFetchResult, StrandError> {
        let handle = self.schedule(uri.to_string(), max_size);
        self.await_completion(handle).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
