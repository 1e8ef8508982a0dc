use serde::{Deserialize, Serialize};

use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::canonicalize;

use crate::compress;
use crate::core_proof::ProofEntry;

// ── ProvisionalProofFile ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionalProofOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<ProofEntry>,
}

/// The signed payloads for every update in a batch, in provisional index
/// file reference order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionalProofFile {
    pub operations: ProvisionalProofOperations,
}

impl ProvisionalProofFile {
    pub fn build(update_proofs: Vec<String>) -> Result<Vec<u8>, StrandError> {
        let file = ProvisionalProofFile {
            operations: ProvisionalProofOperations {
                update: update_proofs
                    .into_iter()
                    .map(|signed_data| ProofEntry { signed_data })
                    .collect(),
            },
        };
        file.validate()?;
        compress::compress(&canonicalize(&file)?)
    }

    pub fn parse(compressed: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes = compress::decompress_bounded(
            compressed,
            params.max_proof_file_size,
            "provisional proof file",
        )?;
        let file: ProvisionalProofFile = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput {
                context: "provisional proof file",
                detail: e.to_string(),
            }
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Length/order agreement with the provisional index file's references.
    pub fn check_against(&self, update_references: usize) -> Result<(), StrandError> {
        if self.operations.update.len() != update_references {
            return Err(StrandError::ProofReferenceMismatch(format!(
                "provisional proof file carries {} proofs, index references {}",
                self.operations.update.len(),
                update_references,
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), StrandError> {
        if self.operations.update.is_empty() {
            return Err(StrandError::MalformedInput {
                context: "provisional proof file",
                detail: "no proofs".into(),
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
