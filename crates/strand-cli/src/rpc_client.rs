use anyhow::{bail, Context};

/// Simple JSON-RPC 2.0 client used by the CLI to talk to a running node.
///
/// Uses raw HTTP POST with serde_json rather than the full jsonrpsee client
/// to keep the binary lean.
pub struct NodeRpcClient {
    url: String,
    client: reqwest::Client,
}

impl NodeRpcClient {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string(), client: reqwest::Client::new() }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            bail!("RPC error: {}", err);
        }

        Ok(json["result"].clone())
    }

    /// Submit one operation body. Returns the receipt JSON.
    pub async fn submit_operation(
        &self,
        operation: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.call("strand_submitOperation", serde_json::json!([operation])).await
    }

    /// Resolve a DID. Returns the resolution result, or `None` when unknown.
    pub async fn resolve(&self, did: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let result = self.call("strand_resolve", serde_json::json!([did])).await?;
        Ok(if result.is_null() { None } else { Some(result) })
    }

    /// Observer cursor and queue depth.
    pub async fn node_status(&self) -> anyhow::Result<serde_json::Value> {
        self.call("strand_getNodeStatus", serde_json::json!([])).await
    }

    /// Node version info.
    pub async fn version(&self) -> anyhow::Result<serde_json::Value> {
        self.call("strand_getVersion", serde_json::json!([])).await
    }
}
