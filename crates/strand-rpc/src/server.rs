use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use strand_core::constants::DID_METHOD_NAME;
use strand_core::traits::{OperationQueue, TransactionStore};
use strand_core::{
    AnchoredOperation, OperationType, ProtocolVersioning, QueuedOperation, StrandError,
};
use strand_ops::{parse_operation, LongFormSegment, OperationSource, ParsedOperation};
use strand_resolver::apply::apply_operation;
use strand_resolver::{project, Resolver};

use crate::api::StrandApiServer;
use crate::types::{RpcNodeStatus, RpcSubmissionReceipt, RpcVersionInfo};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Map an internal error to a structured RPC error without leaking state:
/// validation and cryptographic failures are the caller's fault (-32602),
/// everything else is internal (-32603).
fn submission_err(e: StrandError) -> ErrorObject<'static> {
    match e {
        StrandError::Storage(_) | StrandError::Serialization(_) | StrandError::Ledger(_) => {
            warn!(error = %e, "submission failed internally");
            rpc_err(-32603, "internal error")
        }
        client_fault => rpc_err(-32602, client_fault.to_string()),
    }
}

// ── State & server ───────────────────────────────────────────────────────────

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub resolver: Arc<Resolver>,
    pub queue: Arc<dyn OperationQueue>,
    pub transaction_store: Arc<dyn TransactionStore>,
    pub versioning: Arc<ProtocolVersioning>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

// ── RPC implementation ────────────────────────────────────────────────────────

#[async_trait]
impl StrandApiServer for RpcServer {
    async fn resolve(&self, did: String) -> RpcResult<Option<serde_json::Value>> {
        let result = match self.state.resolver.resolve_did(&did).await {
            Ok(result) => result,
            Err(StrandError::Storage(e)) => return Err(rpc_err(-32603, e)),
            Err(e) => return Err(rpc_err(-32602, e.to_string())),
        };
        let Some(result) = result else { return Ok(None) };
        let value = serde_json::to_value(&result).map_err(|e| rpc_err(-32603, e.to_string()))?;
        Ok(Some(value))
    }

    async fn submit_operation(
        &self,
        operation: serde_json::Value,
    ) -> RpcResult<RpcSubmissionReceipt> {
        let buffer = serde_json::to_vec(&operation)
            .map_err(|e| rpc_err(-32602, format!("invalid operation body: {e}")))?;

        // Validate against the newest protocol generation; the batch writer
        // re-validates against the generation in force at anchoring time.
        let params = self.state.versioning.parameters_at(u64::MAX);
        let parsed = parse_operation(&buffer, params, OperationSource::Submission)
            .map_err(submission_err)?;

        let did_suffix = parsed.did_suffix().clone();
        if self.state.queue.contains(&did_suffix).await.map_err(submission_err)? {
            return Err(rpc_err(
                -32602,
                format!("an operation for {did_suffix} is already queued"),
            ));
        }

        // Creates answer with the projected document and a long-form DID
        // usable before the batch is anchored.
        let (did_document, long_form_did) = match &parsed {
            ParsedOperation::Create(create) => {
                let synthetic = AnchoredOperation {
                    did_suffix: did_suffix.clone(),
                    operation_type: OperationType::Create,
                    operation_buffer: buffer.clone(),
                    transaction_number: 0,
                    transaction_time: 0,
                    operation_index: 0,
                };
                let document = apply_operation(None, &synthetic, params).map(|state| {
                    serde_json::to_value(project(&did_suffix.to_did(DID_METHOD_NAME), &state))
                        .unwrap_or_default()
                });
                let segment = LongFormSegment::new(
                    create.suffix_data.encode().map_err(submission_err)?,
                    create
                        .delta
                        .as_ref()
                        .expect("submission-parsed create has a delta")
                        .encode()
                        .map_err(submission_err)?,
                );
                let long_form = format!(
                    "did:{}:{}:{}",
                    DID_METHOD_NAME,
                    did_suffix,
                    segment.encode().map_err(submission_err)?
                );
                (document, Some(long_form))
            }
            _ => (None, None),
        };

        self.state
            .queue
            .enqueue(QueuedOperation { did_suffix: did_suffix.clone(), operation_buffer: buffer })
            .await
            .map_err(submission_err)?;

        info!(suffix = %did_suffix, kind = %parsed.operation_type(), "operation queued");
        Ok(RpcSubmissionReceipt {
            did: did_suffix.to_did(DID_METHOD_NAME),
            operation_type: parsed.operation_type().to_string(),
            status: "queued".into(),
            did_document,
            long_form_did,
        })
    }

    async fn get_node_status(&self) -> RpcResult<RpcNodeStatus> {
        let cursor = self
            .state
            .transaction_store
            .last_processed()
            .await
            .map_err(|e| rpc_err(-32603, e.to_string()))?;
        let queue_depth =
            self.state.queue.len().await.map_err(|e| rpc_err(-32603, e.to_string()))?;
        Ok(RpcNodeStatus {
            last_transaction_number: cursor.as_ref().map(|t| t.transaction_number),
            last_transaction_time_hash: cursor.map(|t| t.transaction_time_hash),
            queue_depth,
        })
    }

    async fn get_version(&self) -> RpcResult<RpcVersionInfo> {
        Ok(RpcVersionInfo {
            node_version: env!("CARGO_PKG_VERSION").to_string(),
            did_method: DID_METHOD_NAME.to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use strand_core::traits::{OperationStore, UnresolvableTransaction};
    use strand_core::{DidSuffix, LedgerTransaction};
    use strand_crypto::{multihash, EcdsaKeyPair};
    use strand_ops::operation::SuffixData;
    use strand_ops::{Delta, DocumentContent, Patch, PublicKeyEntry};

    #[derive(Default)]
    struct MemoryQueue {
        entries: Mutex<Vec<QueuedOperation>>,
    }

    #[async_trait]
    impl OperationQueue for MemoryQueue {
        async fn enqueue(&self, op: QueuedOperation) -> Result<(), StrandError> {
            let mut entries = self.entries.lock().unwrap();
            if entries.iter().any(|e| e.did_suffix == op.did_suffix) {
                return Err(StrandError::OperationAlreadyQueued(op.did_suffix.to_string()));
            }
            entries.push(op);
            Ok(())
        }

        async fn dequeue(&self, count: usize) -> Result<Vec<QueuedOperation>, StrandError> {
            let mut entries = self.entries.lock().unwrap();
            let take = count.min(entries.len());
            Ok(entries.drain(..take).collect())
        }

        async fn requeue_front(&self, ops: Vec<QueuedOperation>) -> Result<(), StrandError> {
            let mut entries = self.entries.lock().unwrap();
            for op in ops.into_iter().rev() {
                entries.insert(0, op);
            }
            Ok(())
        }

        async fn contains(&self, did_suffix: &DidSuffix) -> Result<bool, StrandError> {
            Ok(self.entries.lock().unwrap().iter().any(|e| &e.did_suffix == did_suffix))
        }

        async fn len(&self) -> Result<usize, StrandError> {
            Ok(self.entries.lock().unwrap().len())
        }
    }

    #[derive(Default)]
    struct MemoryOperationStore {
        operations: Mutex<HashMap<DidSuffix, Vec<AnchoredOperation>>>,
    }

    #[async_trait]
    impl OperationStore for MemoryOperationStore {
        async fn insert_many(&self, ops: Vec<AnchoredOperation>) -> Result<(), StrandError> {
            let mut store = self.operations.lock().unwrap();
            for op in ops {
                store.entry(op.did_suffix.clone()).or_default().push(op);
            }
            Ok(())
        }

        async fn get(&self, suffix: &DidSuffix) -> Result<Vec<AnchoredOperation>, StrandError> {
            Ok(self.operations.lock().unwrap().get(suffix).cloned().unwrap_or_default())
        }

        async fn delete_greater_than(&self, _: u64) -> Result<(), StrandError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryTransactionStore {
        last: Mutex<Option<LedgerTransaction>>,
    }

    #[async_trait]
    impl TransactionStore for MemoryTransactionStore {
        async fn add_processed(&self, tx: &LedgerTransaction) -> Result<(), StrandError> {
            *self.last.lock().unwrap() = Some(tx.clone());
            Ok(())
        }

        async fn last_processed(&self) -> Result<Option<LedgerTransaction>, StrandError> {
            Ok(self.last.lock().unwrap().clone())
        }

        async fn exponential_sample(&self) -> Result<Vec<LedgerTransaction>, StrandError> {
            Ok(vec![])
        }

        async fn delete_greater_than(&self, _: u64) -> Result<(), StrandError> {
            Ok(())
        }

        async fn record_unresolvable_attempt(
            &self,
            tx: &LedgerTransaction,
            now: i64,
        ) -> Result<UnresolvableTransaction, StrandError> {
            Ok(UnresolvableTransaction { transaction: tx.clone(), attempts: 1, next_retry_at: now })
        }

        async fn remove_unresolvable(&self, _: u64) -> Result<(), StrandError> {
            Ok(())
        }

        async fn due_unresolvable(
            &self,
            _: i64,
        ) -> Result<Vec<UnresolvableTransaction>, StrandError> {
            Ok(vec![])
        }
    }

    fn server() -> RpcServer {
        let versioning = Arc::new(ProtocolVersioning::default());
        let resolver =
            Arc::new(Resolver::new(Arc::new(MemoryOperationStore::default()), versioning.clone()));
        RpcServer::new(Arc::new(RpcServerState {
            resolver,
            queue: Arc::new(MemoryQueue::default()),
            transaction_store: Arc::new(MemoryTransactionStore::default()),
            versioning,
        }))
    }

    fn create_body() -> serde_json::Value {
        let recovery = EcdsaKeyPair::from_seed([81u8; 32]);
        let update = EcdsaKeyPair::from_seed([82u8; 32]);
        let delta = Delta {
            patches: vec![Patch::Replace {
                document: DocumentContent {
                    public_keys: Some(vec![PublicKeyEntry {
                        id: "key1".into(),
                        key_type: "JsonWebKey2020".into(),
                        public_key_jwk: json!({"kty": "EC"}),
                        purposes: Some(vec!["authentication".into()]),
                    }]),
                    services: None,
                },
            }],
            update_commitment: multihash::commitment(&update.public_jwk()).unwrap(),
        };
        let suffix_data = SuffixData {
            delta_hash: delta.hash().unwrap(),
            recovery_commitment: multihash::commitment(&recovery.public_jwk()).unwrap(),
            did_type: None,
        };
        json!({
            "type": "create",
            "suffixData": suffix_data.encode().unwrap(),
            "delta": delta.encode().unwrap(),
        })
    }

    #[tokio::test]
    async fn create_submission_returns_projected_document() {
        let server = server();
        let receipt = server.submit_operation(create_body()).await.unwrap();
        assert_eq!(receipt.status, "queued");
        assert_eq!(receipt.operation_type, "create");
        let document = receipt.did_document.unwrap();
        assert_eq!(document["didDocument"]["verificationMethod"][0]["id"], "#key1");
        let long_form = receipt.long_form_did.unwrap();
        assert!(long_form.starts_with(&format!("{}:", receipt.did)));
        assert_eq!(server.state.queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn long_form_from_receipt_resolves_immediately() {
        let server = server();
        let receipt = server.submit_operation(create_body()).await.unwrap();
        let resolved =
            server.resolve(receipt.long_form_did.unwrap()).await.unwrap().unwrap();
        assert_eq!(resolved["didDocument"]["id"], receipt.did);
    }

    #[tokio::test]
    async fn duplicate_queued_suffix_rejected() {
        let server = server();
        server.submit_operation(create_body()).await.unwrap();
        let err = server.submit_operation(create_body()).await.unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn malformed_operation_rejected_with_client_error() {
        let server = server();
        let err = server
            .submit_operation(json!({"type": "create", "unexpected": true}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
        assert_eq!(server.state.queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_did_resolves_to_null() {
        let server = server();
        let suffix = multihash::commitment(&json!({"nobody": true})).unwrap();
        let resolved = server.resolve(format!("did:strand:{suffix}")).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn status_reports_queue_depth() {
        let server = server();
        server.submit_operation(create_body()).await.unwrap();
        let status = server.get_node_status().await.unwrap();
        assert_eq!(status.queue_depth, 1);
        assert!(status.last_transaction_number.is_none());
    }
}
