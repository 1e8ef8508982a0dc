use serde::Serialize;
use sha2::{Digest, Sha256};

use strand_core::constants::{MULTIHASH_SHA256_CODE, MULTIHASH_SHA256_LENGTH};
use strand_core::StrandError;

use crate::canonicalizer::canonicalize;
use crate::encoder;

// ── Multihash ────────────────────────────────────────────────────────────────

/// A parsed self-describing hash: `<code><length><digest>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Multihash {
    pub code: u64,
    pub digest: Vec<u8>,
}

impl Multihash {
    /// Compute the SHA-256 multihash of `bytes`, the only algorithm new
    /// commitments may use.
    pub fn sha256(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes).to_vec();
        Self { code: MULTIHASH_SHA256_CODE, digest }
    }

    /// Serialize to `<code><length><digest>` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.digest.len());
        out.push(self.code as u8);
        out.push(self.digest.len() as u8);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parse `<code><length><digest>`, accepting only codes in `allowed` and
    /// requiring the digest length to match the declared length byte.
    pub fn parse(bytes: &[u8], allowed: &[u64]) -> Result<Self, StrandError> {
        if bytes.len() < 2 {
            return Err(StrandError::InvalidMultihash("shorter than header".into()));
        }
        let code = bytes[0] as u64;
        let length = bytes[1] as usize;
        let digest = &bytes[2..];
        if digest.len() != length {
            return Err(StrandError::InvalidMultihash(format!(
                "declared digest length {length}, found {}",
                digest.len()
            )));
        }
        if code == MULTIHASH_SHA256_CODE && length != MULTIHASH_SHA256_LENGTH as usize {
            return Err(StrandError::InvalidMultihash(format!(
                "SHA-256 digest must be {} bytes, found {length}",
                MULTIHASH_SHA256_LENGTH
            )));
        }
        if !allowed.contains(&code) {
            return Err(StrandError::UnsupportedHashAlgorithm { code, allowed: allowed.to_vec() });
        }
        Ok(Self { code, digest: digest.to_vec() })
    }

    /// Recompute the digest of `bytes` under this multihash's algorithm and
    /// compare. Codes we can no longer compute fail with
    /// `UnsupportedHashAlgorithm` rather than silently mismatching.
    pub fn matches(&self, bytes: &[u8]) -> Result<bool, StrandError> {
        match self.code {
            MULTIHASH_SHA256_CODE => Ok(Sha256::digest(bytes).as_slice() == &self.digest[..]),
            code => Err(StrandError::UnsupportedHashAlgorithm {
                code,
                allowed: vec![MULTIHASH_SHA256_CODE],
            }),
        }
    }
}

// ── Commitment helpers ────────────────────────────────────────────────────────

/// `commitment(x) = base64url(multihash(canonicalize(x)))`.
///
/// Used to derive DID suffixes, delta hashes, and the next update/recovery
/// commitments alike.
pub fn commitment<T: Serialize>(value: &T) -> Result<String, StrandError> {
    let canonical = canonicalize(value)?;
    Ok(encoder::encode(Multihash::sha256(&canonical).to_bytes()))
}

/// SHA-256 multihash of raw bytes, base64url-encoded. Content URIs and file
/// names on the ledger use this form.
pub fn hash_then_encode(bytes: &[u8]) -> String {
    encoder::encode(Multihash::sha256(bytes).to_bytes())
}

/// Check that a revealed value hashes to a stored commitment.
///
/// The stored side may use any algorithm advertised in `allowed` (retired
/// generations stay verifiable); the revealed side is canonicalized first.
pub fn verify_reveal<T: Serialize>(
    revealed: &T,
    stored_commitment: &str,
    allowed: &[u64],
) -> Result<(), StrandError> {
    let stored = encoder::decode(stored_commitment, "commitment")?;
    let multihash = Multihash::parse(&stored, allowed)?;
    let canonical = canonicalize(revealed)?;
    if multihash.matches(&canonical)? {
        Ok(())
    } else {
        Err(StrandError::CommitmentMismatch)
    }
}

/// Check that an encoded delta string hashes to the signed delta hash.
pub fn verify_encoded_hash(
    bytes: &[u8],
    expected_hash: &str,
    allowed: &[u64],
) -> Result<(), StrandError> {
    let stored = encoder::decode(expected_hash, "deltaHash")?;
    let multihash = Multihash::parse(&stored, allowed)?;
    if multihash.matches(bytes)? {
        Ok(())
    } else {
        Err(StrandError::DeltaHashMismatch)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
