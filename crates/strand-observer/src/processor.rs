use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use strand_core::traits::{CasFetchResult, LedgerClient, OperationStore};
use strand_core::{
    vtl, AnchoredOperation, DidSuffix, LedgerTransaction, OperationType, ProtocolParameters,
    ProtocolVersioning, StrandError,
};
use strand_crypto::multihash;
use strand_files::{
    AnchorPayload, ChunkFile, CoreIndexFile, CoreProofFile, ProvisionalIndexFile,
    ProvisionalProofFile,
};
use strand_ops::{parse_operation, OperationSource, ParsedOperation};

use crate::download::DownloadManager;

// ── Outcome ──────────────────────────────────────────────────────────────────

/// How processing one ledger transaction ended.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Operations persisted (possibly control-plane only).
    Applied { operations: usize },
    /// Permanently invalid: recorded as processed, never retried.
    Rejected { reason: String },
    /// File set not fully available: schedule a retry. The control-plane
    /// half may already be persisted (missing chunk file).
    Unresolvable { reason: String },
}

// ── TransactionProcessor ─────────────────────────────────────────────────────

/// Turns one anchored ledger transaction into persisted per-DID operations.
pub struct TransactionProcessor {
    downloads: Arc<DownloadManager>,
    operation_store: Arc<dyn OperationStore>,
    ledger: Arc<dyn LedgerClient>,
    versioning: Arc<ProtocolVersioning>,
}

impl TransactionProcessor {
    pub fn new(
        downloads: Arc<DownloadManager>,
        operation_store: Arc<dyn OperationStore>,
        ledger: Arc<dyn LedgerClient>,
        versioning: Arc<ProtocolVersioning>,
    ) -> Self {
        Self { downloads, operation_store, ledger, versioning }
    }

    pub async fn process(&self, transaction: &LedgerTransaction) -> ProcessingOutcome {
        match self.try_process(transaction).await {
            Ok(operations) => {
                debug!(txn = transaction.transaction_number, operations, "transaction applied");
                ProcessingOutcome::Applied { operations }
            }
            Err(e) if e.is_retryable_fetch_failure() => {
                ProcessingOutcome::Unresolvable { reason: e.to_string() }
            }
            Err(e) => {
                warn!(txn = transaction.transaction_number, error = %e, "transaction rejected");
                ProcessingOutcome::Rejected { reason: e.to_string() }
            }
        }
    }

    async fn try_process(&self, transaction: &LedgerTransaction) -> Result<usize, StrandError> {
        let params = self.versioning.parameters_at(transaction.transaction_time);

        // ── Core index file ───────────────────────────────────────────────────
        let payload = AnchorPayload::from_anchor_string(&transaction.anchor_string, params)?;
        let core_bytes = self
            .fetch_required(&payload.core_index_file_uri, params.max_core_index_file_size)
            .await?;
        let core_index = CoreIndexFile::parse(&core_bytes, params)?;

        let created = core_index.created_suffixes(params)?;
        let empty = Vec::new();
        let recover_refs = core_index.operations.as_ref().map_or(&empty, |o| &o.recover);
        let deactivate_refs = core_index.operations.as_ref().map_or(&empty, |o| &o.deactivate);

        // ── Core proof file (iff recovers or deactivates) ─────────────────────
        let core_proof = match &core_index.core_proof_file_uri {
            Some(uri) => {
                let bytes = self.fetch_required(uri, params.max_proof_file_size).await?;
                let proof = CoreProofFile::parse(&bytes, params)?;
                proof.check_against(recover_refs.len(), deactivate_refs.len())?;
                Some(proof)
            }
            None => None,
        };

        // ── Provisional index + proof files ───────────────────────────────────
        let provisional = match &core_index.provisional_index_file_uri {
            Some(uri) => {
                let bytes =
                    self.fetch_required(uri, params.max_provisional_index_file_size).await?;
                Some(ProvisionalIndexFile::parse(&bytes, params)?)
            }
            None => None,
        };
        let update_refs = provisional.as_ref().map_or(&[][..], |p| p.update_references());

        // One operation per DID per batch, across both index files.
        let mut batch_dids: HashSet<&str> = HashSet::new();
        for suffix in created.iter().map(|(suffix, _)| suffix.as_str()).chain(
            recover_refs
                .iter()
                .chain(deactivate_refs)
                .chain(update_refs)
                .map(|r| r.did_suffix.as_str()),
        ) {
            if !batch_dids.insert(suffix) {
                return Err(StrandError::DuplicateDidReference(suffix.to_string()));
            }
        }

        let provisional_proof = match provisional.as_ref().and_then(|p| p.provisional_proof_file_uri.as_ref()) {
            Some(uri) => {
                let bytes = self.fetch_required(uri, params.max_proof_file_size).await?;
                let proof = ProvisionalProofFile::parse(&bytes, params)?;
                proof.check_against(update_refs.len())?;
                Some(proof)
            }
            None => None,
        };

        // ── Value-time-lock budget ────────────────────────────────────────────
        let total_operations =
            created.len() + recover_refs.len() + deactivate_refs.len() + update_refs.len();
        let lock = match &core_index.writer_lock_id {
            Some(lock_id) => self.ledger.get_value_time_lock(Some(lock_id)).await?,
            None => None,
        };
        vtl::verify_lock_for_transaction(
            lock.as_ref(),
            &transaction.writer,
            transaction.transaction_time,
            transaction.normalized_transaction_fee,
            total_operations,
            params,
        )?;

        // ── Chunk file (deltas) ───────────────────────────────────────────────
        // Missing → retry later, but control-plane effects apply now.
        // Invalid → deltas permanently absent; nothing to retry.
        let delta_count = created.len() + recover_refs.len() + update_refs.len();
        let mut chunk_missing_uri: Option<String> = None;
        let deltas: Option<Vec<String>> = match provisional.as_ref() {
            Some(provisional) => {
                let uri = provisional.chunk_file_uri();
                match self.downloads.fetch(uri, params.max_chunk_file_size).await? {
                    CasFetchResult::Found(bytes) => match ChunkFile::parse(&bytes, params) {
                        Ok(chunk) if chunk.deltas.len() == delta_count => Some(chunk.deltas),
                        Ok(chunk) => {
                            warn!(txn = transaction.transaction_number,
                                  found = chunk.deltas.len(), expected = delta_count,
                                  "chunk file delta count mismatch; treating deltas as absent");
                            None
                        }
                        Err(e) => {
                            warn!(txn = transaction.transaction_number, error = %e,
                                  "chunk file invalid; treating deltas as absent");
                            None
                        }
                    },
                    CasFetchResult::NotFound => {
                        chunk_missing_uri = Some(uri.to_string());
                        None
                    }
                    CasFetchResult::TooLarge => {
                        warn!(txn = transaction.transaction_number, uri,
                              "chunk file over size bound; treating deltas as absent");
                        None
                    }
                }
            }
            None => None,
        };
        let delta_at = |index: usize| -> Option<&String> { deltas.as_ref().and_then(|d| d.get(index)) };

        // ── Compose per-DID anchored operations ──────────────────────────────
        // Index assignment order: Create, Recover, Deactivate, Update.
        let mut operations: Vec<AnchoredOperation> = Vec::with_capacity(total_operations);
        let mut operation_index: u32 = 0;
        let mut delta_cursor = 0usize;

        for (i, (suffix, _)) in created.iter().enumerate() {
            let create_ref = &core_index.operations.as_ref().expect("creates exist").create[i];
            let mut body = json!({
                "type": "create",
                "suffixData": create_ref.suffix_data,
            });
            if let Some(delta) = delta_at(delta_cursor) {
                body["delta"] = json!(delta);
            }
            operations.push(self.compose(
                suffix.clone(),
                OperationType::Create,
                body,
                transaction,
                operation_index,
                params,
            )?);
            operation_index += 1;
            delta_cursor += 1;
        }

        for (i, reference) in recover_refs.iter().enumerate() {
            let proof = &core_proof.as_ref().expect("checked above").operations.recover[i];
            let mut body = json!({
                "type": "recover",
                "didSuffix": reference.did_suffix,
                "revealValue": reference.reveal_value,
                "signedData": proof.signed_data,
            });
            if let Some(delta) = delta_at(delta_cursor) {
                body["delta"] = json!(delta);
            }
            let anchored = self.compose(
                DidSuffix::new(reference.did_suffix.clone()),
                OperationType::Recover,
                body,
                transaction,
                operation_index,
                params,
            )?;
            operations.push(anchored);
            operation_index += 1;
            delta_cursor += 1;
        }

        for (i, reference) in deactivate_refs.iter().enumerate() {
            let proof = &core_proof.as_ref().expect("checked above").operations.deactivate[i];
            let body = json!({
                "type": "deactivate",
                "didSuffix": reference.did_suffix,
                "revealValue": reference.reveal_value,
                "signedData": proof.signed_data,
            });
            operations.push(self.compose(
                DidSuffix::new(reference.did_suffix.clone()),
                OperationType::Deactivate,
                body,
                transaction,
                operation_index,
                params,
            )?);
            operation_index += 1;
        }

        for (i, reference) in update_refs.iter().enumerate() {
            let proof = &provisional_proof.as_ref().expect("checked above").operations.update[i];
            let mut body = json!({
                "type": "update",
                "didSuffix": reference.did_suffix,
                "revealValue": reference.reveal_value,
                "signedData": proof.signed_data,
            });
            if let Some(delta) = delta_at(delta_cursor) {
                body["delta"] = json!(delta);
            }
            operations.push(self.compose(
                DidSuffix::new(reference.did_suffix.clone()),
                OperationType::Update,
                body,
                transaction,
                operation_index,
                params,
            )?);
            operation_index += 1;
            delta_cursor += 1;
        }

        self.operation_store.insert_many(operations).await?;

        if let Some(uri) = chunk_missing_uri {
            // Control-plane persisted; the data plane arrives on retry.
            return Err(StrandError::ContentNotFound(uri));
        }
        Ok(total_operations)
    }

    /// Serialize, re-parse, and wrap one composed operation. Parsing here
    /// keeps schema-invalid operations out of the store entirely; the reveal
    /// invariant for recover/deactivate is enforced against the proof's
    /// embedded key.
    fn compose(
        &self,
        did_suffix: DidSuffix,
        operation_type: OperationType,
        body: serde_json::Value,
        transaction: &LedgerTransaction,
        operation_index: u32,
        params: &ProtocolParameters,
    ) -> Result<AnchoredOperation, StrandError> {
        let buffer =
            serde_json::to_vec(&body).map_err(|e| StrandError::Serialization(e.to_string()))?;
        let parsed = parse_operation(&buffer, params, OperationSource::Anchored)?;
        if parsed.did_suffix() != &did_suffix {
            return Err(StrandError::ProofReferenceMismatch(format!(
                "operation body resolves to {} but is referenced as {did_suffix}",
                parsed.did_suffix()
            )));
        }
        match &parsed {
            ParsedOperation::Recover(recover) => {
                multihash::verify_reveal(
                    &recover.signed_data.recovery_key,
                    &recover.reveal_value,
                    &params.hash_algorithms_in_multihash_code,
                )?;
            }
            ParsedOperation::Deactivate(deactivate) => {
                multihash::verify_reveal(
                    &deactivate.signed_data.recovery_key,
                    &deactivate.reveal_value,
                    &params.hash_algorithms_in_multihash_code,
                )?;
            }
            _ => {}
        }
        Ok(AnchoredOperation {
            did_suffix,
            operation_type,
            operation_buffer: buffer,
            transaction_number: transaction.transaction_number,
            transaction_time: transaction.transaction_time,
            operation_index,
        })
    }

    /// Fetch a file that must exist for processing to proceed.
    async fn fetch_required(&self, uri: &str, max_size: usize) -> Result<Vec<u8>, StrandError> {
        match self.downloads.fetch(uri, max_size).await? {
            CasFetchResult::Found(bytes) => Ok(bytes),
            CasFetchResult::NotFound => Err(StrandError::ContentNotFound(uri.to_string())),
            CasFetchResult::TooLarge => {
                Err(StrandError::ContentTooLarge { uri: uri.to_string(), max: max_size })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
