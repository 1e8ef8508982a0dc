use olpc_cjson::CanonicalFormatter;
use serde::Serialize;

use strand_core::StrandError;

/// Serialize `value` to RFC 8785 canonical JSON bytes: object members sorted
/// by code point, no insignificant whitespace, shortest-round-trip numbers.
///
/// All commitments, hashes, and signed payloads in the protocol are computed
/// over this form.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, StrandError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
    value
        .serialize(&mut ser)
        .map_err(|e| StrandError::Serialization(format!("canonicalization: {e}")))?;
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
