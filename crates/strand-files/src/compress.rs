use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use strand_core::StrandError;

/// Gzip-compress `bytes` at the default level.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, StrandError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map_err(|e| StrandError::Serialization(format!("gzip compression: {e}")))
}

/// Decompress with a hard bound on the output size.
///
/// The bound is enforced *during* decompression, not after: a hostile file
/// cannot make the node materialize more than `max_size + 1` bytes.
/// `context` names the file kind for the error.
pub fn decompress_bounded(
    bytes: &[u8],
    max_size: usize,
    context: &'static str,
) -> Result<Vec<u8>, StrandError> {
    let mut out = Vec::new();
    let decoder = GzDecoder::new(bytes);
    decoder
        .take(max_size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| StrandError::MalformedInput { context, detail: format!("gzip: {e}") })?;
    if out.len() > max_size {
        return Err(StrandError::SizeExceeded { context, size: out.len(), max: max_size });
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = br#"{"deltas":["aGVsbG8"]}"#;
        let packed = compress(data).unwrap();
        let unpacked = decompress_bounded(&packed, 1024, "test file").unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn bound_enforced_mid_stream() {
        // Highly compressible payload: tiny on the wire, large decompressed.
        let data = vec![0u8; 100_000];
        let packed = compress(&data).unwrap();
        assert!(packed.len() < 1_000);
        assert!(matches!(
            decompress_bounded(&packed, 50_000, "test file"),
            Err(StrandError::SizeExceeded { context: "test file", .. })
        ));
    }

    #[test]
    fn exact_size_accepted() {
        let data = vec![7u8; 4_096];
        let packed = compress(&data).unwrap();
        assert_eq!(decompress_bounded(&packed, 4_096, "test file").unwrap(), data);
        assert!(decompress_bounded(&packed, 4_095, "test file").is_err());
    }

    #[test]
    fn garbage_input_rejected() {
        assert!(matches!(
            decompress_bounded(b"not gzip at all", 1024, "test file"),
            Err(StrandError::MalformedInput { context: "test file", .. })
        ));
    }
}
