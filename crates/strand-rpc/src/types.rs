use serde::{Deserialize, Serialize};

// ── Wire types ───────────────────────────────────────────────────────────────

/// Response to a submitted operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcSubmissionReceipt {
    /// The DID the operation targets (short form).
    pub did: String,
    #[serde(rename = "type")]
    pub operation_type: String,
    /// Queue position indicator: always "queued" on acceptance.
    pub status: String,
    /// For creates: the projected document the DID will resolve to once
    /// anchored, plus its long-form DID for immediate use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_form_did: Option<String>,
}

/// Aggregate node health for operators.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcNodeStatus {
    /// Observer cursor, if any transaction has been processed.
    pub last_transaction_number: Option<u64>,
    pub last_transaction_time_hash: Option<String>,
    /// Pending operations awaiting batching.
    pub queue_depth: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcVersionInfo {
    pub node_version: String,
    pub did_method: String,
}
