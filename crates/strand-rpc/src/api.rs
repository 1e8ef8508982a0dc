use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcNodeStatus, RpcSubmissionReceipt, RpcVersionInfo};

/// Strand JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "strand_" via `namespace = "strand"`.
#[rpc(server, namespace = "strand")]
pub trait StrandApi {
    /// Resolve a DID (short or long form). Returns the resolution result
    /// (document plus metadata, or the deactivated marker), or null when
    /// the DID is unknown.
    #[method(name = "resolve")]
    async fn resolve(&self, did: String) -> RpcResult<Option<serde_json::Value>>;

    /// Submit one DID operation (create/update/recover/deactivate) as its
    /// JSON request body. Validated synchronously, then queued for the next
    /// batch. For creates, the receipt carries the projected document and
    /// the long-form DID usable before anchoring.
    #[method(name = "submitOperation")]
    async fn submit_operation(
        &self,
        operation: serde_json::Value,
    ) -> RpcResult<RpcSubmissionReceipt>;

    /// Observer cursor and batch queue depth.
    #[method(name = "getNodeStatus")]
    async fn get_node_status(&self) -> RpcResult<RpcNodeStatus>;

    /// Node and method version information.
    #[method(name = "getVersion")]
    async fn get_version(&self) -> RpcResult<RpcVersionInfo>;
}
