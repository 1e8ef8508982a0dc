use serde::{Deserialize, Serialize};

use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::{canonicalize, encoder};

use crate::compress;

// ── ChunkFile ────────────────────────────────────────────────────────────────

/// The batch's data plane: every delta, base64url-encoded, concatenated in
/// the order Create, Recover, Update (each section in its index file's
/// reference order). Operation index assignment during transaction
/// processing relies on this ordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChunkFile {
    pub deltas: Vec<String>,
}

impl ChunkFile {
    pub fn build(deltas: Vec<String>, params: &ProtocolParameters) -> Result<Vec<u8>, StrandError> {
        let file = ChunkFile { deltas };
        file.validate(params)?;
        compress::compress(&canonicalize(&file)?)
    }

    pub fn parse(compressed: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes =
            compress::decompress_bounded(compressed, params.max_chunk_file_size, "chunk file")?;
        let file: ChunkFile = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput { context: "chunk file", detail: e.to_string() }
        })?;
        file.validate(params)?;
        Ok(file)
    }

    fn validate(&self, params: &ProtocolParameters) -> Result<(), StrandError> {
        if self.deltas.is_empty() {
            return Err(StrandError::MalformedInput {
                context: "chunk file",
                detail: "deltas must be non-empty".into(),
            });
        }
        if self.deltas.len() > params.max_operations_per_batch {
            return Err(StrandError::SizeExceeded {
                context: "chunk file deltas",
                size: self.deltas.len(),
                max: params.max_operations_per_batch,
            });
        }
        // Only shape and size here: a delta that decodes but fails deeper
        // validation becomes an ineffective operation at resolution, not a
        // rejected chunk file.
        for delta in &self.deltas {
            let bytes = encoder::decode(delta, "chunk file delta")?;
            if bytes.len() > params.max_delta_size {
                return Err(StrandError::SizeExceeded {
                    context: "chunk file delta",
                    size: bytes.len(),
                    max: params.max_delta_size,
                });
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    #[test]
    fn build_parse_round_trip() {
        let deltas = vec![encoder::encode(b"{\"a\":1}"), encoder::encode(b"{\"b\":2}")];
        let compressed = ChunkFile::build(deltas.clone(), &params()).unwrap();
        let file = ChunkFile::parse(&compressed, &params()).unwrap();
        assert_eq!(file.deltas, deltas);
    }

    #[test]
    fn empty_chunk_rejected() {
        assert!(ChunkFile::build(vec![], &params()).is_err());
    }

    #[test]
    fn non_base64url_delta_rejected() {
        let compressed = compress::compress(br#"{"deltas":["not base64!"]}"#).unwrap();
        assert!(ChunkFile::parse(&compressed, &params()).is_err());
    }

    #[test]
    fn oversized_delta_rejected() {
        let big = encoder::encode(vec![b'x'; 1_001]);
        assert!(matches!(
            ChunkFile::build(vec![big], &params()),
            Err(StrandError::SizeExceeded { context: "chunk file delta", .. })
        ));
    }

    #[test]
    fn file_size_bound_enforced() {
        let deltas: Vec<String> = (0..50).map(|i| encoder::encode(format!("{{\"i\":{i}}}"))).collect();
        let compressed = ChunkFile::build(deltas, &params()).unwrap();
        let tight = ProtocolParameters { max_chunk_file_size: 64, ..params() };
        assert!(matches!(
            ChunkFile::parse(&compressed, &tight),
            Err(StrandError::SizeExceeded { .. })
        ));
    }
}
