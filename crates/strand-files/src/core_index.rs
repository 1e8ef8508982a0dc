use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use strand_core::{DidSuffix, ProtocolParameters, StrandError};
use strand_crypto::{canonicalize, encoder, multihash};
use strand_ops::operation::SuffixData;

use crate::compress;

// ── References ───────────────────────────────────────────────────────────────

/// Create reference: the encoded suffix data itself (the DID suffix is
/// derived from it, so no explicit suffix member).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateReference {
    pub suffix_data: String,
}

/// Recover / deactivate / update reference: the target DID and the reveal
/// value consuming its current commitment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperationReference {
    pub did_suffix: String,
    pub reveal_value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreIndexOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<CreateReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recover: Vec<OperationReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deactivate: Vec<OperationReference>,
}

// ── CoreIndexFile ────────────────────────────────────────────────────────────

/// The root descriptor of one batch, named on the ledger by the multihash of
/// its bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreIndexFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_lock_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_index_file_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_proof_file_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<CoreIndexOperations>,
}

impl CoreIndexFile {
    /// Assemble a core index file from batch parts. Enforces the same
    /// invariants `parse` checks, so a writer can never emit a file its own
    /// observer would reject.
    pub fn build(
        writer_lock_id: Option<String>,
        provisional_index_file_uri: Option<String>,
        core_proof_file_uri: Option<String>,
        create: Vec<CreateReference>,
        recover: Vec<OperationReference>,
        deactivate: Vec<OperationReference>,
        params: &ProtocolParameters,
    ) -> Result<Vec<u8>, StrandError> {
        let operations = CoreIndexOperations { create, recover, deactivate };
        let file = CoreIndexFile {
            writer_lock_id,
            provisional_index_file_uri,
            core_proof_file_uri,
            operations: Some(operations),
        };
        file.validate(params)?;
        compress::compress(&canonicalize(&file)?)
    }

    /// Decompress under the size bound, parse, and validate.
    pub fn parse(compressed: &[u8], params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes = compress::decompress_bounded(
            compressed,
            params.max_core_index_file_size,
            "core index file",
        )?;
        let file: CoreIndexFile = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput { context: "core index file", detail: e.to_string() }
        })?;
        file.validate(params)?;
        Ok(file)
    }

    fn validate(&self, params: &ProtocolParameters) -> Result<(), StrandError> {
        if let Some(lock_id) = &self.writer_lock_id {
            if lock_id.len() > params.max_writer_lock_id_size {
                return Err(StrandError::SizeExceeded {
                    context: "writer lock id",
                    size: lock_id.len(),
                    max: params.max_writer_lock_id_size,
                });
            }
        }

        let ops = self.operations.as_ref();
        let creates = ops.map_or(0, |o| o.create.len());
        let recovers = ops.map_or(0, |o| o.recover.len());
        let deactivates = ops.map_or(0, |o| o.deactivate.len());
        let total = creates + recovers + deactivates;
        if total > params.max_operations_per_batch {
            return Err(StrandError::SizeExceeded {
                context: "core index file operations",
                size: total,
                max: params.max_operations_per_batch,
            });
        }

        // A deactivate-only batch has no deltas anywhere, so no chunk and no
        // provisional index. Every other batch must point at a provisional
        // index file, including an update-only batch, which leaves no core
        // references at all.
        let deactivates_only = deactivates > 0 && creates == 0 && recovers == 0;
        match (&self.provisional_index_file_uri, deactivates_only) {
            (None, false) => {
                return Err(StrandError::MalformedInput {
                    context: "core index file",
                    detail: "provisionalIndexFileUri is required unless the batch is deactivate-only"
                        .into(),
                })
            }
            (Some(_), true) => {
                return Err(StrandError::MalformedInput {
                    context: "core index file",
                    detail: "provisionalIndexFileUri is forbidden in a deactivate-only batch".into(),
                })
            }
            _ => {}
        }
        if let Some(uri) = &self.provisional_index_file_uri {
            validate_cas_uri(uri, "provisionalIndexFileUri", params)?;
        }

        // Core proof file exists exactly when there are proofs to carry.
        let has_proofs = recovers + deactivates > 0;
        match (&self.core_proof_file_uri, has_proofs) {
            (None, true) => {
                return Err(StrandError::MalformedInput {
                    context: "core index file",
                    detail: "coreProofFileUri is required when recovers or deactivates exist".into(),
                })
            }
            (Some(_), false) => {
                return Err(StrandError::MalformedInput {
                    context: "core index file",
                    detail: "coreProofFileUri is forbidden without recovers or deactivates".into(),
                })
            }
            _ => {}
        }
        if let Some(uri) = &self.core_proof_file_uri {
            validate_cas_uri(uri, "coreProofFileUri", params)?;
        }

        // One DID may appear at most once across create/recover/deactivate.
        let mut seen: HashSet<String> = HashSet::new();
        if let Some(ops) = ops {
            for create in &ops.create {
                let suffix_data = SuffixData::decode(&create.suffix_data, params)?;
                let suffix = suffix_data.did_suffix()?;
                if !seen.insert(suffix.as_str().to_string()) {
                    return Err(StrandError::DuplicateDidReference(suffix.to_string()));
                }
            }
            for reference in ops.recover.iter().chain(&ops.deactivate) {
                if !seen.insert(reference.did_suffix.clone()) {
                    return Err(StrandError::DuplicateDidReference(reference.did_suffix.clone()));
                }
            }
        }
        Ok(())
    }

    /// All DID suffixes this file creates, in reference order.
    pub fn created_suffixes(
        &self,
        params: &ProtocolParameters,
    ) -> Result<Vec<(DidSuffix, SuffixData)>, StrandError> {
        let mut out = Vec::new();
        if let Some(ops) = &self.operations {
            for create in &ops.create {
                let suffix_data = SuffixData::decode(&create.suffix_data, params)?;
                out.push((suffix_data.did_suffix()?, suffix_data));
            }
        }
        Ok(out)
    }
}

/// A CAS URI is the base64url multihash of the file's bytes.
pub(crate) fn validate_cas_uri(
    uri: &str,
    context: &'static str,
    params: &ProtocolParameters,
) -> Result<(), StrandError> {
    let bytes = encoder::decode(uri, context)?;
    multihash::Multihash::parse(&bytes, &params.hash_algorithms_in_multihash_code)
        .map_err(|_| StrandError::MalformedInput {
            context,
            detail: format!("{uri} is not a content multihash"),
        })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strand_crypto::EcdsaKeyPair;
    use strand_ops::{Delta, Patch};

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    fn uri_of(content: &[u8]) -> String {
        multihash::hash_then_encode(content)
    }

    fn create_ref(seed: u8) -> CreateReference {
        let recovery = EcdsaKeyPair::from_seed([seed; 32]);
        let update = EcdsaKeyPair::from_seed([seed.wrapping_add(1); 32]);
        let delta = Delta {
            patches: vec![Patch::RemoveServices { ids: vec!["s1".into()] }],
            update_commitment: multihash::commitment(&update.public_jwk()).unwrap(),
        };
        let suffix_data = SuffixData {
            delta_hash: delta.hash().unwrap(),
            recovery_commitment: multihash::commitment(&recovery.public_jwk()).unwrap(),
            did_type: None,
        };
        CreateReference { suffix_data: suffix_data.encode().unwrap() }
    }

    fn op_ref(name: &str) -> OperationReference {
        OperationReference {
            did_suffix: multihash::commitment(&serde_json::json!({ "did": name })).unwrap(),
            reveal_value: multihash::commitment(&serde_json::json!({ "key": name })).unwrap(),
        }
    }

    #[test]
    fn build_parse_round_trip() {
        let compressed = CoreIndexFile::build(
            Some("lock-1".into()),
            Some(uri_of(b"provisional")),
            Some(uri_of(b"proof")),
            vec![create_ref(20)],
            vec![op_ref("r1")],
            vec![op_ref("d1")],
            &params(),
        )
        .unwrap();
        let file = CoreIndexFile::parse(&compressed, &params()).unwrap();
        assert_eq!(file.writer_lock_id.as_deref(), Some("lock-1"));
        let ops = file.operations.unwrap();
        assert_eq!((ops.create.len(), ops.recover.len(), ops.deactivate.len()), (1, 1, 1));
    }

    #[test]
    fn deactivate_only_batch_omits_provisional_uri() {
        let compressed = CoreIndexFile::build(
            None,
            None,
            Some(uri_of(b"proof")),
            vec![],
            vec![],
            vec![op_ref("d1")],
            &params(),
        )
        .unwrap();
        let file = CoreIndexFile::parse(&compressed, &params()).unwrap();
        assert!(file.provisional_index_file_uri.is_none());
    }

    #[test]
    fn deactivate_only_batch_rejects_provisional_uri() {
        let err = CoreIndexFile::build(
            None,
            Some(uri_of(b"provisional")),
            Some(uri_of(b"proof")),
            vec![],
            vec![],
            vec![op_ref("d1")],
            &params(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn missing_proof_uri_with_recovers_rejected() {
        let err = CoreIndexFile::build(
            None,
            Some(uri_of(b"provisional")),
            None,
            vec![],
            vec![op_ref("r1")],
            vec![],
            &params(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn duplicate_did_across_sections_rejected() {
        let shared = op_ref("same");
        let err = CoreIndexFile::build(
            None,
            Some(uri_of(b"provisional")),
            Some(uri_of(b"proof")),
            vec![],
            vec![shared.clone()],
            vec![shared],
            &params(),
        );
        assert!(matches!(err, Err(StrandError::DuplicateDidReference(_))));
    }

    #[test]
    fn empty_file_rejected() {
        // No references and no provisional index: nothing anchored at all.
        let err = CoreIndexFile::build(None, None, None, vec![], vec![], vec![], &params());
        assert!(err.is_err());
    }

    #[test]
    fn update_only_batch_has_no_core_references() {
        let compressed = CoreIndexFile::build(
            None,
            Some(uri_of(b"provisional")),
            None,
            vec![],
            vec![],
            vec![],
            &params(),
        )
        .unwrap();
        let file = CoreIndexFile::parse(&compressed, &params()).unwrap();
        assert!(file.operations.as_ref().map_or(0, |o| o.create.len()) == 0);
        assert_eq!(file.provisional_index_file_uri.as_deref(), Some(uri_of(b"provisional").as_str()));
    }

    #[test]
    fn overlong_writer_lock_id_rejected() {
        let err = CoreIndexFile::build(
            Some("x".repeat(51)),
            Some(uri_of(b"provisional")),
            None,
            vec![create_ref(30)],
            vec![],
            vec![],
            &params(),
        );
        assert!(matches!(err, Err(StrandError::SizeExceeded { context: "writer lock id", .. })));
    }

    #[test]
    fn unknown_property_rejected() {
        let json = serde_json::json!({
            "operations": {"create": []},
            "mapFileUri": uri_of(b"x")
        });
        let compressed = compress::compress(serde_json::to_string(&json).unwrap().as_bytes()).unwrap();
        assert!(CoreIndexFile::parse(&compressed, &params()).is_err());
    }

    #[test]
    fn batch_cap_enforced_exactly() {
        let p = ProtocolParameters { max_operations_per_batch: 2, ..params() };
        let ok = CoreIndexFile::build(
            None,
            Some(uri_of(b"provisional")),
            None,
            vec![create_ref(40), create_ref(50)],
            vec![],
            vec![],
            &p,
        );
        assert!(ok.is_ok());
        let err = CoreIndexFile::build(
            None,
            Some(uri_of(b"provisional")),
            None,
            vec![create_ref(40), create_ref(50), create_ref(60)],
            vec![],
            vec![],
            &p,
        );
        assert!(matches!(err, Err(StrandError::SizeExceeded { .. })));
    }
}
