use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use strand_core::StrandError;

/// Base64url-encode without padding.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Strict base64url decode: any character outside `[A-Za-z0-9_-]` rejects,
/// as does padding. `context` names the field for the error message.
pub fn decode(s: &str, context: &'static str) -> Result<Vec<u8>, StrandError> {
    if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return Err(StrandError::InvalidBase64Url(context));
    }
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| StrandError::InvalidBase64Url(context))
}

/// True when `s` is non-empty and contains only base64url characters.
pub fn is_base64url(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"strand protocol \x00\xff";
        let encoded = encode(data);
        assert_eq!(decode(&encoded, "test").unwrap(), data);
    }

    #[test]
    fn no_padding_emitted() {
        // 1-byte input would pad to "AA==" in standard base64.
        assert_eq!(encode([0u8]), "AA");
    }

    #[test]
    fn rejects_standard_alphabet() {
        assert!(decode("a+b", "test").is_err());
        assert!(decode("a/b", "test").is_err());
    }

    #[test]
    fn rejects_padding_and_whitespace() {
        assert!(decode("AA==", "test").is_err());
        assert!(decode("AA A", "test").is_err());
        assert!(decode("AA\n", "test").is_err());
    }

    #[test]
    fn url_safe_characters_accepted() {
        assert_eq!(decode("_-_-", "test").unwrap().len(), 3);
    }
}
