use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use k256::elliptic_curve::generic_array::GenericArray;
use k256::EncodedPoint;
use serde::{Deserialize, Serialize};

use strand_core::StrandError;

use crate::encoder;

// ── PublicKeyJwk ─────────────────────────────────────────────────────────────

/// A secp256k1 public key in JWK form. The only key type the protocol signs
/// with; commitments are computed over the canonical JSON of this struct.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicKeyJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl PublicKeyJwk {
    /// Convert to a verifying key, checking curve/type fields and coordinate
    /// lengths on the way.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, StrandError> {
        if self.kty != "EC" || self.crv != "secp256k1" {
            return Err(StrandError::MalformedInput {
                context: "publicKeyJwk",
                detail: format!("expected EC/secp256k1, found {}/{}", self.kty, self.crv),
            });
        }
        let x = encoder::decode(&self.x, "jwk x coordinate")?;
        let y = encoder::decode(&self.y, "jwk y coordinate")?;
        if x.len() != 32 || y.len() != 32 {
            return Err(StrandError::MalformedInput {
                context: "publicKeyJwk",
                detail: "coordinates must be 32 bytes".into(),
            });
        }
        let point = EncodedPoint::from_affine_coordinates(
            GenericArray::from_slice(&x),
            GenericArray::from_slice(&y),
            false,
        );
        VerifyingKey::from_encoded_point(&point).map_err(|_| StrandError::MalformedInput {
            context: "publicKeyJwk",
            detail: "coordinates are not a point on secp256k1".into(),
        })
    }
}

// ── Protected header ─────────────────────────────────────────────────────────

/// JWS protected header: exactly `alg`, optionally `kid`. Anything else is a
/// schema violation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProtectedHeader {
    alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

// ── Compact JWS ──────────────────────────────────────────────────────────────

/// Sign `payload` as a compact JWS (`header.payload.signature`) with ES256K.
pub fn sign_compact_jws(
    payload: &[u8],
    signing_key: &k256::ecdsa::SigningKey,
    kid: Option<&str>,
) -> Result<String, StrandError> {
    use k256::ecdsa::signature::Signer;

    let header = ProtectedHeader { alg: "ES256K".into(), kid: kid.map(str::to_owned) };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| StrandError::Serialization(e.to_string()))?;

    let signing_input =
        format!("{}.{}", encoder::encode(&header_json), encoder::encode(payload));
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature = signature.normalize_s().unwrap_or(signature);

    Ok(format!("{signing_input}.{}", encoder::encode(signature.to_bytes())))
}

/// Verify a compact JWS against `jwk` and return the decoded payload.
///
/// Header validation is strict: `alg` must be ES256K, `kid` is the only
/// other permitted member, and all three segments must be valid base64url.
pub fn verify_compact_jws(compact: &str, jwk: &PublicKeyJwk) -> Result<Vec<u8>, StrandError> {
    let (header_b64, payload_b64, signature_b64) = split_compact(compact)?;

    let header_bytes = encoder::decode(header_b64, "jws protected header")?;
    let header: ProtectedHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| StrandError::JwsHeaderInvalid(e.to_string()))?;
    if header.alg != "ES256K" {
        return Err(StrandError::JwsHeaderInvalid(format!(
            "alg must be ES256K, found {}",
            header.alg
        )));
    }

    let payload = encoder::decode(payload_b64, "jws payload")?;
    let signature_bytes = encoder::decode(signature_b64, "jws signature")?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|_| StrandError::SignatureInvalid)?;

    let verifying_key = jwk.to_verifying_key()?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| StrandError::SignatureInvalid)?;

    Ok(payload)
}

/// Strictly validate a compact JWS's shape and header, and decode its
/// payload *without* checking the signature.
///
/// Parse-time schema validation uses this; the signature itself can only be
/// checked once the key is known (at resolution), but a malformed header or
/// segment is rejected immediately.
pub fn decode_unverified_payload(compact: &str) -> Result<Vec<u8>, StrandError> {
    let (header_b64, payload_b64, signature_b64) = split_compact(compact)?;
    let header_bytes = encoder::decode(header_b64, "jws protected header")?;
    let header: ProtectedHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| StrandError::JwsHeaderInvalid(e.to_string()))?;
    if header.alg != "ES256K" {
        return Err(StrandError::JwsHeaderInvalid(format!(
            "alg must be ES256K, found {}",
            header.alg
        )));
    }
    encoder::decode(signature_b64, "jws signature")?;
    encoder::decode(payload_b64, "jws payload")
}

/// The `kid` of a compact JWS's protected header, if present and valid.
pub fn parse_kid(compact: &str) -> Result<Option<String>, StrandError> {
    let (header_b64, _, _) = split_compact(compact)?;
    let header_bytes = encoder::decode(header_b64, "jws protected header")?;
    let header: ProtectedHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| StrandError::JwsHeaderInvalid(e.to_string()))?;
    Ok(header.kid)
}

fn split_compact(compact: &str) -> Result<(&str, &str, &str), StrandError> {
    let mut parts = compact.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !s.is_empty() => Ok((h, p, s)),
        _ => Err(StrandError::MalformedInput {
            context: "compact jws",
            detail: "expected exactly three dot-separated segments".into(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
