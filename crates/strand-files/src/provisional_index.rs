use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use strand_core::{ProtocolParameters, StrandError};
use strand_crypto::canonicalize;

use crate::compress;
use crate::core_index::{validate_cas_uri, OperationReference};

// ── ProvisionalIndexFile ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChunkReference {
    pub chunk_file_uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionalIndexOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<OperationReference>,
}

/// Companion of the core index file: update references plus the location of
/// the batch's single chunk file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionalIndexFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_proof_file_uri: Option<String>,
    /// Exactly one entry in this protocol generation; kept as an array for
    /// forward compatibility with multi-chunk batches.
    pub chunks: Vec<ChunkReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<ProvisionalIndexOperations>,
}

impl ProvisionalIndexFile {
    pub fn build(
        chunk_file_uri: String,
        provisional_proof_file_uri: Option<String>,
        update: Vec<OperationReference>,
        params: &ProtocolParameters,
    ) -> Result<Vec<u8>, StrandError> {
        let operations =
            if update.is_empty() { None } else { Some(ProvisionalIndexOperations { update }) };
        let file = ProvisionalIndexFile {
            provisional_proof_file_uri,
            chunks: vec![ChunkReference { chunk_file_uri }],
            operations,
        };
        file.validate(params)?;
        compress::compress(&canonicalize(&file)?)
    }

    pub fn parse(compressed: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes = compress::decompress_bounded(
            compressed,
            params.max_provisional_index_file_size,
            "provisional index file",
        )?;
        let file: ProvisionalIndexFile = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput {
                context: "provisional index file",
                detail: e.to_string(),
            }
        })?;
        file.validate(params)?;
        Ok(file)
    }

    pub fn chunk_file_uri(&self) -> &str {
        &self.chunks[0].chunk_file_uri
    }

    pub fn update_references(&self) -> &[OperationReference] {
        self.operations.as_ref().map_or(&[], |o| o.update.as_slice())
    }

    fn validate(&self, params: &ProtocolParameters) -> Result<(), StrandError> {
        if self.chunks.len() != 1 {
            return Err(StrandError::MalformedInput {
                context: "provisional index file",
                detail: format!("expected exactly one chunk reference, found {}", self.chunks.len()),
            });
        }
        validate_cas_uri(&self.chunks[0].chunk_file_uri, "chunkFileUri", params)?;

        let updates = self.update_references();
        if updates.len() > params.max_operations_per_batch {
            return Err(StrandError::SizeExceeded {
                context: "provisional index file operations",
                size: updates.len(),
                max: params.max_operations_per_batch,
            });
        }

        // Proof file exists exactly when there are updates to prove.
        match (&self.provisional_proof_file_uri, updates.is_empty()) {
            (None, false) => {
                return Err(StrandError::MalformedInput {
                    context: "provisional index file",
                    detail: "provisionalProofFileUri is required when updates exist".into(),
                })
            }
            (Some(_), true) => {
                return Err(StrandError::MalformedInput {
                    context: "provisional index file",
                    detail: "provisionalProofFileUri is forbidden without updates".into(),
                })
            }
            _ => {}
        }
        if let Some(uri) = &self.provisional_proof_file_uri {
            validate_cas_uri(uri, "provisionalProofFileUri", params)?;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for reference in updates {
            if !seen.insert(reference.did_suffix.as_str()) {
                return Err(StrandError::DuplicateDidReference(reference.did_suffix.clone()));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
