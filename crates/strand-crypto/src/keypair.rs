use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use strand_core::StrandError;

use crate::encoder;
use crate::jws::PublicKeyJwk;

/// A secp256k1 keypair for signing operation payloads.
///
/// The node itself never holds DID controller keys; this type exists for the
/// batch-writer tooling and for tests, where deterministic keys from fixed
/// seeds keep fixtures reproducible.
pub struct EcdsaKeyPair {
    signing_key: SigningKey,
}

impl EcdsaKeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::random(&mut OsRng) }
    }

    /// Derive a keypair from a fixed 32-byte seed. Panics only on the
    /// all-zero / out-of-range seeds, which the callers never produce.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key =
            SigningKey::from_slice(&seed).expect("seed is a valid secp256k1 scalar");
        Self { signing_key }
    }

    /// Restore from raw secret scalar bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, StrandError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| StrandError::MalformedInput {
            context: "secret key",
            detail: "not a valid secp256k1 scalar".into(),
        })?;
        Ok(Self { signing_key })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The public key in JWK form, as embedded in signed payloads and hashed
    /// into commitments.
    pub fn public_jwk(&self) -> PublicKeyJwk {
        let verifying_key: &VerifyingKey = self.signing_key.verifying_key();
        let point = verifying_key.to_encoded_point(false);
        PublicKeyJwk {
            kty: "EC".into(),
            crv: "secp256k1".into(),
            x: encoder::encode(point.x().expect("uncompressed point has x")),
            y: encoder::encode(point.y().expect("uncompressed point has y")),
        }
    }
}

impl std::fmt::Debug for EcdsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EcdsaKeyPair {{ x: {}… }}", &self.public_jwk().x[..8])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
