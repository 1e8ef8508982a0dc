use serde::{Deserialize, Serialize};

use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::jws::PublicKeyJwk;

use crate::delta::validate_commitment_string;

// ── Signed payloads ──────────────────────────────────────────────────────────
//
// Each control-plane operation signs a small canonical-JSON payload carried
// as the JWS payload segment. The embedded key is the reveal: its multihash
// must equal the commitment stored in DID state.

/// Payload of an update's `signedData` JWS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSignedData {
    pub update_key: PublicKeyJwk,
    pub delta_hash: String,
}

/// Payload of a recover's `signedData` JWS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecoverSignedData {
    pub recovery_key: PublicKeyJwk,
    pub recovery_commitment: String,
    pub delta_hash: String,
}

/// Payload of a deactivate's `signedData` JWS. Binds the DID suffix so a
/// deactivation proof cannot be replayed against another DID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeactivateSignedData {
    pub did_suffix: String,
    pub recovery_key: PublicKeyJwk,
}

impl UpdateSignedData {
    pub fn from_payload(bytes: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let parsed: Self = serde_json::from_slice(bytes).map_err(|e| {
            StrandError::MalformedInput { context: "update signedData", detail: e.to_string() }
        })?;
        validate_commitment_string(&parsed.delta_hash, params)?;
        Ok(parsed)
    }
}

impl RecoverSignedData {
    pub fn from_payload(bytes: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let parsed: Self = serde_json::from_slice(bytes).map_err(|e| {
            StrandError::MalformedInput { context: "recover signedData", detail: e.to_string() }
        })?;
        validate_commitment_string(&parsed.recovery_commitment, params)?;
        validate_commitment_string(&parsed.delta_hash, params)?;
        Ok(parsed)
    }
}

impl DeactivateSignedData {
    pub fn from_payload(bytes: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        serde_json::from_slice(bytes).map_err(|e| StrandError::MalformedInput {
            context: "deactivate signedData",
            detail: e.to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strand_crypto::multihash;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    fn jwk() -> PublicKeyJwk {
        PublicKeyJwk { kty: "EC".into(), crv: "secp256k1".into(), x: "eA".into(), y: "eQ".into() }
    }

    fn hash() -> String {
        multihash::commitment(&json!({"n": 1})).unwrap()
    }

    #[test]
    fn update_payload_round_trip() {
        let payload = UpdateSignedData { update_key: jwk(), delta_hash: hash() };
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert_eq!(UpdateSignedData::from_payload(&bytes, &params()).unwrap(), payload);
    }

    #[test]
    fn recover_payload_checks_commitments() {
        let bad = json!({
            "recoveryKey": jwk(),
            "recoveryCommitment": "bad",
            "deltaHash": hash()
        });
        let err =
            RecoverSignedData::from_payload(&serde_json::to_vec(&bad).unwrap(), &params());
        assert!(err.is_err());
    }

    #[test]
    fn unknown_payload_property_rejected() {
        let bad = json!({
            "updateKey": jwk(),
            "deltaHash": hash(),
            "extra": true
        });
        assert!(UpdateSignedData::from_payload(&serde_json::to_vec(&bad).unwrap(), &params())
            .is_err());
    }

    #[test]
    fn deactivate_payload_parses() {
        let payload = DeactivateSignedData { did_suffix: "EiAx".into(), recovery_key: jwk() };
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert_eq!(DeactivateSignedData::from_payload(&bytes, &params()).unwrap(), payload);
    }
}
