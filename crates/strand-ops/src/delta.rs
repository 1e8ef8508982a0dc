use serde::{Deserialize, Serialize};

use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::{canonicalize, encoder, multihash};

use crate::patch::Patch;

// ── Delta ────────────────────────────────────────────────────────────────────

/// The data-plane half of an operation: the patches to apply and the
/// commitment the *next* update must reveal against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Delta {
    pub patches: Vec<Patch>,
    pub update_commitment: String,
}

impl Delta {
    /// Decode a base64url delta string, enforcing the decoded-size bound and
    /// validating every patch and the embedded commitment.
    pub fn decode(encoded: &str, params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes = encoder::decode(encoded, "delta")?;
        if bytes.len() > params.max_delta_size {
            return Err(StrandError::SizeExceeded {
                context: "delta",
                size: bytes.len(),
                max: params.max_delta_size,
            });
        }
        let delta: Delta = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput { context: "delta", detail: e.to_string() }
        })?;
        delta.validate(params)?;
        Ok(delta)
    }

    /// Encode as base64url canonical JSON: the chunk-file form, and the
    /// form hashes are computed over.
    pub fn encode(&self) -> Result<String, StrandError> {
        Ok(encoder::encode(canonicalize(self)?))
    }

    /// The multihash of this delta's canonical form, as carried in signed
    /// payloads.
    pub fn hash(&self) -> Result<String, StrandError> {
        multihash::commitment(self)
    }

    pub fn validate(&self, params: &ProtocolParameters) -> Result<(), StrandError> {
        if self.patches.is_empty() {
            return Err(StrandError::MalformedInput {
                context: "delta",
                detail: "patches must be non-empty".into(),
            });
        }
        for patch in &self.patches {
            patch.validate()?;
        }
        validate_commitment_string(&self.update_commitment, params)
    }
}

/// A commitment on the wire must itself be a well-formed base64url multihash
/// using an advertised algorithm.
pub fn validate_commitment_string(
    commitment: &str,
    params: &ProtocolParameters,
) -> Result<(), StrandError> {
    let bytes = encoder::decode(commitment, "commitment")?;
    multihash::Multihash::parse(&bytes, &params.hash_algorithms_in_multihash_code)?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
