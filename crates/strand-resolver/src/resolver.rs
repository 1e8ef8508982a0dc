use std::sync::Arc;

use tracing::debug;

use strand_core::constants::DID_METHOD_NAME;
use strand_core::traits::OperationStore;
use strand_core::{AnchoredOperation, DidSuffix, OperationType, ProtocolVersioning, StrandError};
use strand_ops::parse_did;

use crate::apply::apply_stream;
use crate::projection::{project, ResolutionResult};
use crate::state::DidState;

// ── Resolver ─────────────────────────────────────────────────────────────────

/// Resolves DIDs by folding the anchored operation stream from the store.
///
/// Reads may run concurrently with the Observer's writes; the store
/// guarantees per-DID read-your-writes, and resolution itself is a pure
/// function of the stream it reads.
pub struct Resolver {
    operation_store: Arc<dyn OperationStore>,
    versioning: Arc<ProtocolVersioning>,
}

impl Resolver {
    pub fn new(operation_store: Arc<dyn OperationStore>, versioning: Arc<ProtocolVersioning>) -> Self {
        Self { operation_store, versioning }
    }

    /// Resolve a bare suffix against the anchored history.
    pub async fn resolve_suffix(
        &self,
        suffix: &DidSuffix,
    ) -> Result<Option<DidState>, StrandError> {
        let operations = self.operation_store.get(suffix).await?;
        Ok(apply_stream(operations, &self.versioning))
    }

    /// Resolve a full DID string, including long-form DIDs.
    ///
    /// Anchored history always wins; the long-form segment only seeds a
    /// state when nothing is anchored for the suffix yet.
    pub async fn resolve_did(&self, did: &str) -> Result<Option<ResolutionResult>, StrandError> {
        let parsed = parse_did(did)?;
        let canonical_did = parsed.suffix.to_did(DID_METHOD_NAME);

        if let Some(state) = self.resolve_suffix(&parsed.suffix).await? {
            return Ok(Some(project(&canonical_did, &state)));
        }

        if let Some(segment) = parsed.long_form {
            let params = self.versioning.parameters_at(0);
            // Validates the segment against the suffix before trusting it.
            segment.open(&parsed.suffix, params)?;
            let synthetic = AnchoredOperation {
                did_suffix: parsed.suffix.clone(),
                operation_type: OperationType::Create,
                operation_buffer: serde_json::to_vec(&serde_json::json!({
                    "type": "create",
                    "suffixData": segment.suffix_data,
                    "delta": segment.delta,
                }))
                .map_err(|e| StrandError::Serialization(e.to_string()))?,
                transaction_number: 0,
                transaction_time: 0,
                operation_index: 0,
            };
            let state = apply_stream(vec![synthetic], &self.versioning);
            debug!(suffix = %parsed.suffix, "resolved long-form DID from embedded create");
            return Ok(state.map(|state| project(&canonical_did, &state)));
        }

        Ok(None)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
