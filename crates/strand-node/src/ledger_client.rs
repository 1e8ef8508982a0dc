use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use strand_core::traits::LedgerClient;
use strand_core::{LedgerReadResult, LedgerTime, LedgerTransaction, StrandError, ValueTimeLock};

// ── HttpLedgerClient ─────────────────────────────────────────────────────────

/// Ledger access over the sidecar's REST surface.
///
/// Endpoints:
///   GET  /transactions?since=N&transaction-time-hash=H
///   GET  /time
///   POST /firstValid          body: {"transactions": [...]}
///   POST /writes              body: {"anchorString", "fee", "writerLockId"?}
///   GET  /locks/{id}
///
/// A 400 response to /transactions whose error code is
/// `invalid_transaction_number_or_time_hash` is the fork signal.
pub struct HttpLedgerClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct SidecarError {
    code: Option<String>,
}

const CURSOR_INVALID_CODE: &str = "invalid_transaction_number_or_time_hash";

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, StrandError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| StrandError::Ledger(format!("building http client: {e}")))?;
        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), http })
    }

    async fn unpack<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StrandError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| StrandError::Ledger(format!("decoding response: {e}")));
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            if let Ok(err) = response.json::<SidecarError>().await {
                if err.code.as_deref() == Some(CURSOR_INVALID_CODE) {
                    return Err(StrandError::CursorInvalid);
                }
            }
            return Err(StrandError::Ledger("ledger rejected request".into()));
        }
        Err(StrandError::Ledger(format!("ledger returned {status}")))
    }

    fn map_transport(e: reqwest::Error) -> StrandError {
        if e.is_timeout() {
            StrandError::Timeout("ledger request")
        } else {
            StrandError::Ledger(e.to_string())
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn read(
        &self,
        since_transaction_number: Option<u64>,
        since_time_hash: Option<&str>,
    ) -> Result<LedgerReadResult, StrandError> {
        let mut request = self.http.get(format!("{}/transactions", self.base_url));
        if let Some(since) = since_transaction_number {
            request = request.query(&[("since", since.to_string())]);
        }
        if let Some(hash) = since_time_hash {
            request = request.query(&[("transaction-time-hash", hash)]);
        }
        let response = request.send().await.map_err(Self::map_transport)?;
        Self::unpack(response).await
    }

    async fn get_latest_time(&self) -> Result<LedgerTime, StrandError> {
        let response = self
            .http
            .get(format!("{}/time", self.base_url))
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::unpack(response).await
    }

    async fn get_first_valid_transaction(
        &self,
        sample: &[LedgerTransaction],
    ) -> Result<Option<LedgerTransaction>, StrandError> {
        let response = self
            .http
            .post(format!("{}/firstValid", self.base_url))
            .json(&serde_json::json!({ "transactions": sample }))
            .send()
            .await
            .map_err(Self::map_transport)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::unpack(response).await
    }

    async fn write(
        &self,
        anchor_string: &str,
        fee: u64,
        writer_lock_id: Option<&str>,
    ) -> Result<(), StrandError> {
        let mut body = serde_json::json!({
            "anchorString": anchor_string,
            "fee": fee,
        });
        if let Some(lock_id) = writer_lock_id {
            body["writerLockId"] = serde_json::json!(lock_id);
        }
        let response = self
            .http
            .post(format!("{}/writes", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StrandError::Ledger(format!("anchor write returned {}", response.status())))
        }
    }

    async fn get_value_time_lock(
        &self,
        id: Option<&str>,
    ) -> Result<Option<ValueTimeLock>, StrandError> {
        let url = match id {
            Some(id) => format!("{}/locks/{id}", self.base_url),
            None => format!("{}/locks", self.base_url),
        };
        let response = self.http.get(url).send().await.map_err(Self::map_transport)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::unpack(response).await
    }
}
