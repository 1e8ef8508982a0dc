use serde::{Deserialize, Serialize};

use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::canonicalize;

use crate::compress;

// ── CoreProofFile ────────────────────────────────────────────────────────────

/// One compact JWS proof. The file carries proofs positionally: entry `i`
/// belongs to reference `i` of the matching index file section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProofEntry {
    pub signed_data: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreProofOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recover: Vec<ProofEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deactivate: Vec<ProofEntry>,
}

/// The signed payloads for every recover and deactivate in a batch, in core
/// index file reference order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreProofFile {
    pub operations: CoreProofOperations,
}

impl CoreProofFile {
    pub fn build(
        recover_proofs: Vec<String>,
        deactivate_proofs: Vec<String>,
    ) -> Result<Vec<u8>, StrandError> {
        let file = CoreProofFile {
            operations: CoreProofOperations {
                recover: recover_proofs.into_iter().map(|signed_data| ProofEntry { signed_data }).collect(),
                deactivate: deactivate_proofs
                    .into_iter()
                    .map(|signed_data| ProofEntry { signed_data })
                    .collect(),
            },
        };
        file.validate()?;
        compress::compress(&canonicalize(&file)?)
    }

    pub fn parse(compressed: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes =
            compress::decompress_bounded(compressed, params.max_proof_file_size, "core proof file")?;
        let file: CoreProofFile = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput { context: "core proof file", detail: e.to_string() }
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Length/order agreement with the core index file's references.
    pub fn check_against(
        &self,
        recover_references: usize,
        deactivate_references: usize,
    ) -> Result<(), StrandError> {
        if self.operations.recover.len() != recover_references
            || self.operations.deactivate.len() != deactivate_references
        {
            return Err(StrandError::ProofReferenceMismatch(format!(
                "core proof file carries {}/{} proofs, index references {}/{}",
                self.operations.recover.len(),
                self.operations.deactivate.len(),
                recover_references,
                deactivate_references,
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), StrandError> {
        if self.operations.recover.is_empty() && self.operations.deactivate.is_empty() {
            return Err(StrandError::MalformedInput {
                context: "core proof file",
                detail: "no proofs".into(),
            });
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
        let compressed =
            CoreProofFile::build(vec!["h.p.s1".into(), "h.p.s2".into()], vec!["h.p.s3".into()])
                .unwrap();
        let file = CoreProofFile::parse(&compressed, &params()).unwrap();
        assert_eq!(file.operations.recover.len(), 2);
        assert_eq!(file.operations.deactivate.len(), 1);
        file.check_against(2, 1).unwrap();
    }

    #[test]
    fn reference_count_mismatch_detected() {
        let compressed = CoreProofFile::build(vec!["h.p.s".into()], vec![]).unwrap();
        let file = CoreProofFile::parse(&compressed, &params()).unwrap();
        assert!(matches!(
            file.check_against(2, 0),
            Err(StrandError::ProofReferenceMismatch(_))
        ));
        assert!(file.check_against(1, 1).is_err());
    }

    #[test]
    fn empty_proof_file_rejected() {
        assert!(CoreProofFile::build(vec![], vec![]).is_err());
    }

    #[test]
    fn size_bound_applied() {
        let proofs: Vec<String> = (0..100).map(|i| format!("h.p.signature{i}")).collect();
        let compressed = CoreProofFile::build(proofs, vec![]).unwrap();
        let tight = ProtocolParameters { max_proof_file_size: 100, ..params() };
        assert!(matches!(
            CoreProofFile::parse(&compressed, &tight),
            Err(StrandError::SizeExceeded { .. })
        ));
    }
}
