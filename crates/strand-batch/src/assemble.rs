use strand_core::{ProtocolParameters, QueuedOperation, StrandError};
use strand_files::{
    ChunkFile, CoreProofFile, CreateReference, OperationReference, ProvisionalProofFile,
};
use strand_ops::{parse_operation, OperationSource, ParsedOperation};

// ── AssembledBatch ───────────────────────────────────────────────────────────

/// The file bodies for one batch, before content-store publication. The core
/// and provisional index files are built later, once the other files' URIs
/// are known.
pub struct AssembledBatch {
    pub create_references: Vec<CreateReference>,
    pub recover_references: Vec<OperationReference>,
    pub deactivate_references: Vec<OperationReference>,
    pub update_references: Vec<OperationReference>,
    /// gzip bytes; `None` when the section is empty.
    pub core_proof_file: Option<Vec<u8>>,
    pub provisional_proof_file: Option<Vec<u8>>,
    pub chunk_file: Option<Vec<u8>>,
    pub operation_count: usize,
}

/// Partition drained queue entries by type (FIFO order preserved within each
/// type) and build the proof and chunk file bodies.
///
/// Chunk deltas are concatenated Create, Recover, Update, matching the
/// order the transaction processor reassigns them in.
pub fn assemble_batch(
    operations: &[QueuedOperation],
    params: &ProtocolParameters,
) -> Result<AssembledBatch, StrandError> {
    let mut create_references = Vec::new();
    let mut recover_references = Vec::new();
    let mut deactivate_references = Vec::new();
    let mut update_references = Vec::new();

    let mut create_deltas = Vec::new();
    let mut recover_deltas = Vec::new();
    let mut update_deltas = Vec::new();

    let mut recover_proofs = Vec::new();
    let mut deactivate_proofs = Vec::new();
    let mut update_proofs = Vec::new();

    for queued in operations {
        // Queue entries were validated at submission; parse again so a
        // corrupted entry fails the batch instead of anchoring garbage.
        let parsed = parse_operation(&queued.operation_buffer, params, OperationSource::Submission)?;
        match parsed {
            ParsedOperation::Create(create) => {
                create_references
                    .push(CreateReference { suffix_data: create.suffix_data.encode()? });
                let delta = create.delta.expect("submission-parsed create has a delta");
                create_deltas.push(delta.encode()?);
            }
            ParsedOperation::Recover(recover) => {
                recover_references.push(OperationReference {
                    did_suffix: recover.did_suffix.as_str().into(),
                    reveal_value: recover.reveal_value,
                });
                recover_proofs.push(recover.signed_data_jws);
                let delta = recover.delta.expect("submission-parsed recover has a delta");
                recover_deltas.push(delta.encode()?);
            }
            ParsedOperation::Deactivate(deactivate) => {
                deactivate_references.push(OperationReference {
                    did_suffix: deactivate.did_suffix.as_str().into(),
                    reveal_value: deactivate.reveal_value,
                });
                deactivate_proofs.push(deactivate.signed_data_jws);
            }
            ParsedOperation::Update(update) => {
                update_references.push(OperationReference {
                    did_suffix: update.did_suffix.as_str().into(),
                    reveal_value: update.reveal_value,
                });
                update_proofs.push(update.signed_data_jws);
                let delta = update.delta.expect("submission-parsed update has a delta");
                update_deltas.push(delta.encode()?);
            }
        }
    }

    let core_proof_file = if recover_proofs.is_empty() && deactivate_proofs.is_empty() {
        None
    } else {
        Some(CoreProofFile::build(recover_proofs, deactivate_proofs)?)
    };
    let provisional_proof_file = if update_proofs.is_empty() {
        None
    } else {
        Some(ProvisionalProofFile::build(update_proofs)?)
    };

    let mut deltas = create_deltas;
    deltas.append(&mut recover_deltas);
    deltas.append(&mut update_deltas);
    let chunk_file =
        if deltas.is_empty() { None } else { Some(ChunkFile::build(deltas, params)?) };

    Ok(AssembledBatch {
        operation_count: operations.len(),
        create_references,
        recover_references,
        deactivate_references,
        update_references,
        core_proof_file,
        provisional_proof_file,
        chunk_file,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use strand_core::DidSuffix;
    use strand_crypto::{canonicalize, jws, multihash, EcdsaKeyPair};
    use strand_ops::operation::SuffixData;
    use strand_ops::signed_data::{DeactivateSignedData, UpdateSignedData};
    use strand_ops::{Delta, DocumentContent, Patch, PublicKeyEntry};

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    fn kp(seed: u8) -> EcdsaKeyPair {
        EcdsaKeyPair::from_seed([seed; 32])
    }

    fn commit(keypair: &EcdsaKeyPair) -> String {
        multihash::commitment(&keypair.public_jwk()).unwrap()
    }

    fn replace_delta(next_update: &EcdsaKeyPair) -> Delta {
        Delta {
            patches: vec![Patch::Replace {
                document: DocumentContent {
                    public_keys: Some(vec![PublicKeyEntry {
                        id: "key1".into(),
                        key_type: "JsonWebKey2020".into(),
                        public_key_jwk: json!({"kty": "EC"}),
                        purposes: None,
                    }]),
                    services: None,
                },
            }],
            update_commitment: commit(next_update),
        }
    }

    pub(crate) fn queued_create(recovery_seed: u8, update_seed: u8) -> QueuedOperation {
        let delta = replace_delta(&kp(update_seed));
        let suffix_data = SuffixData {
            delta_hash: delta.hash().unwrap(),
            recovery_commitment: commit(&kp(recovery_seed)),
            did_type: None,
        };
        let suffix = suffix_data.did_suffix().unwrap();
        let buffer = serde_json::to_vec(&json!({
            "type": "create",
            "suffixData": suffix_data.encode().unwrap(),
            "delta": delta.encode().unwrap(),
        }))
        .unwrap();
        QueuedOperation { did_suffix: suffix, operation_buffer: buffer }
    }

    pub(crate) fn queued_update(suffix: &str, update_seed: u8, next_seed: u8) -> QueuedOperation {
        let update = kp(update_seed);
        let delta = Delta {
            patches: vec![Patch::RemoveServices { ids: vec!["old".into()] }],
            update_commitment: commit(&kp(next_seed)),
        };
        let signed = UpdateSignedData {
            update_key: update.public_jwk(),
            delta_hash: delta.hash().unwrap(),
        };
        let payload = canonicalize(&signed).unwrap();
        let jws = jws::sign_compact_jws(&payload, update.signing_key(), None).unwrap();
        let buffer = serde_json::to_vec(&json!({
            "type": "update",
            "didSuffix": suffix,
            "revealValue": commit(&update),
            "delta": delta.encode().unwrap(),
            "signedData": jws,
        }))
        .unwrap();
        QueuedOperation { did_suffix: DidSuffix::new(suffix), operation_buffer: buffer }
    }

    pub(crate) fn queued_deactivate(suffix: &str, recovery_seed: u8) -> QueuedOperation {
        let recovery = kp(recovery_seed);
        let signed = DeactivateSignedData {
            did_suffix: suffix.to_string(),
            recovery_key: recovery.public_jwk(),
        };
        let payload = canonicalize(&signed).unwrap();
        let jws = jws::sign_compact_jws(&payload, recovery.signing_key(), None).unwrap();
        let buffer = serde_json::to_vec(&json!({
            "type": "deactivate",
            "didSuffix": suffix,
            "revealValue": commit(&recovery),
            "signedData": jws,
        }))
        .unwrap();
        QueuedOperation { did_suffix: DidSuffix::new(suffix), operation_buffer: buffer }
    }

    fn suffix_of(seed: u8) -> String {
        multihash::commitment(&json!({ "seed": seed })).unwrap()
    }

    #[test]
    fn partitions_and_orders_deltas() {
        let ops = vec![
            queued_update(&suffix_of(1), 31, 32),
            queued_create(33, 34),
            queued_deactivate(&suffix_of(2), 35),
        ];
        let batch = assemble_batch(&ops, &params()).unwrap();

        assert_eq!(batch.operation_count, 3);
        assert_eq!(batch.create_references.len(), 1);
        assert_eq!(batch.update_references.len(), 1);
        assert_eq!(batch.deactivate_references.len(), 1);
        assert!(batch.recover_references.is_empty());

        // Chunk deltas: create first, then update (no recover section).
        let chunk = ChunkFile::parse(batch.chunk_file.as_ref().unwrap(), &params()).unwrap();
        assert_eq!(chunk.deltas.len(), 2);

        let core_proof =
            CoreProofFile::parse(batch.core_proof_file.as_ref().unwrap(), &params()).unwrap();
        core_proof.check_against(0, 1).unwrap();

        let provisional_proof =
            ProvisionalProofFile::parse(batch.provisional_proof_file.as_ref().unwrap(), &params())
                .unwrap();
        provisional_proof.check_against(1).unwrap();
    }

    #[test]
    fn deactivate_only_batch_has_no_chunk() {
        let ops = vec![queued_deactivate(&suffix_of(3), 36)];
        let batch = assemble_batch(&ops, &params()).unwrap();
        assert!(batch.chunk_file.is_none());
        assert!(batch.provisional_proof_file.is_none());
        assert!(batch.core_proof_file.is_some());
    }

    #[test]
    fn corrupt_queue_entry_fails_assembly() {
        let mut op = queued_create(37, 38);
        op.operation_buffer = b"not json".to_vec();
        assert!(assemble_batch(&[op], &params()).is_err());
    }
}
