use strand_core::constants::ANCHOR_PAYLOAD_PREFIX;
use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::{encoder, multihash};

// ── AnchorPayload ────────────────────────────────────────────────────────────

/// The payload written to the ledger: one protocol-generation prefix byte
/// followed by the multihash bytes of the core index file, base64url on the
/// wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorPayload {
    pub core_index_file_uri: String,
}

impl AnchorPayload {
    /// Name the given core index file bytes and wrap them as a payload.
    pub fn for_core_index_file(file_bytes: &[u8]) -> Self {
        Self { core_index_file_uri: multihash::hash_then_encode(file_bytes) }
    }

    pub fn to_anchor_string(&self) -> Result<String, StrandError> {
        let uri_bytes = encoder::decode(&self.core_index_file_uri, "core index file uri")?;
        let mut payload = Vec::with_capacity(1 + uri_bytes.len());
        payload.push(ANCHOR_PAYLOAD_PREFIX);
        payload.extend_from_slice(&uri_bytes);
        Ok(encoder::encode(payload))
    }

    pub fn from_anchor_string(
        anchor_string: &str,
        params: &ProtocolParameters,
    ) -> Result<Self, StrandError> {
        let payload = encoder::decode(anchor_string, "anchor string")?;
        let (&prefix, uri_bytes) = payload.split_first().ok_or(StrandError::MalformedInput {
            context: "anchor string",
            detail: "empty payload".into(),
        })?;
        if prefix != ANCHOR_PAYLOAD_PREFIX {
            return Err(StrandError::MalformedInput {
                context: "anchor string",
                detail: format!("unknown prefix byte {prefix:#04x}"),
            });
        }
        multihash::Multihash::parse(uri_bytes, &params.hash_algorithms_in_multihash_code)?;
        Ok(Self { core_index_file_uri: encoder::encode(uri_bytes) })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
