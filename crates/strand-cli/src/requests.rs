use serde_json::{json, Value};

use strand_core::StrandError;
use strand_crypto::{canonicalize, jws, multihash, EcdsaKeyPair};
use strand_ops::operation::SuffixData;
use strand_ops::signed_data::{DeactivateSignedData, RecoverSignedData, UpdateSignedData};
use strand_ops::{Delta, DocumentContent, LongFormSegment, Patch};

// ── Request builders ─────────────────────────────────────────────────────────
//
// Client-side construction of the four operation request bodies. The node
// only ever sees public keys and signatures; all secrets stay here.

/// A built create request plus everything the controller needs to keep.
pub struct BuiltCreate {
    pub body: Value,
    pub did_suffix: String,
    pub long_form_did: String,
}

/// Build a create request establishing `document`, committing to the given
/// recovery and update keys.
pub fn build_create(
    document: DocumentContent,
    recovery: &EcdsaKeyPair,
    update: &EcdsaKeyPair,
) -> Result<BuiltCreate, StrandError> {
    let delta = Delta {
        patches: vec![Patch::Replace { document }],
        update_commitment: multihash::commitment(&update.public_jwk())?,
    };
    let suffix_data = SuffixData {
        delta_hash: delta.hash()?,
        recovery_commitment: multihash::commitment(&recovery.public_jwk())?,
        did_type: None,
    };
    let did_suffix = suffix_data.did_suffix()?;

    let encoded_suffix_data = suffix_data.encode()?;
    let encoded_delta = delta.encode()?;
    let segment = LongFormSegment::new(encoded_suffix_data.clone(), encoded_delta.clone());
    let long_form_did = format!(
        "did:{}:{}:{}",
        strand_core::constants::DID_METHOD_NAME,
        did_suffix,
        segment.encode()?
    );

    Ok(BuiltCreate {
        body: json!({
            "type": "create",
            "suffixData": encoded_suffix_data,
            "delta": encoded_delta,
        }),
        did_suffix: did_suffix.to_string(),
        long_form_did,
    })
}

/// Build an update request applying `patches`, revealing the current update
/// key and committing to the next one.
pub fn build_update(
    did_suffix: &str,
    patches: Vec<Patch>,
    current_update: &EcdsaKeyPair,
    next_update: &EcdsaKeyPair,
) -> Result<Value, StrandError> {
    if current_update.public_jwk() == next_update.public_jwk() {
        // The resolver rejects a rotation onto the commitment it consumed;
        // refuse client-side before an anchor fee is wasted.
        return Err(StrandError::CommitmentReused);
    }
    let delta = Delta {
        patches,
        update_commitment: multihash::commitment(&next_update.public_jwk())?,
    };
    let signed = UpdateSignedData {
        update_key: current_update.public_jwk(),
        delta_hash: delta.hash()?,
    };
    let payload = canonicalize(&signed)?;
    let signed_data = jws::sign_compact_jws(&payload, current_update.signing_key(), None)?;

    Ok(json!({
        "type": "update",
        "didSuffix": did_suffix,
        "revealValue": multihash::commitment(&current_update.public_jwk())?,
        "delta": delta.encode()?,
        "signedData": signed_data,
    }))
}

/// Build a recover request replacing the document outright and rotating both
/// key chains.
pub fn build_recover(
    did_suffix: &str,
    document: DocumentContent,
    current_recovery: &EcdsaKeyPair,
    next_recovery: &EcdsaKeyPair,
    next_update: &EcdsaKeyPair,
) -> Result<Value, StrandError> {
    let delta = Delta {
        patches: vec![Patch::Replace { document }],
        update_commitment: multihash::commitment(&next_update.public_jwk())?,
    };
    let signed = RecoverSignedData {
        recovery_key: current_recovery.public_jwk(),
        recovery_commitment: multihash::commitment(&next_recovery.public_jwk())?,
        delta_hash: delta.hash()?,
    };
    let payload = canonicalize(&signed)?;
    let signed_data = jws::sign_compact_jws(&payload, current_recovery.signing_key(), None)?;

    Ok(json!({
        "type": "recover",
        "didSuffix": did_suffix,
        "revealValue": multihash::commitment(&current_recovery.public_jwk())?,
        "delta": delta.encode()?,
        "signedData": signed_data,
    }))
}

/// Build a deactivate request, revealing the current recovery key.
pub fn build_deactivate(
    did_suffix: &str,
    current_recovery: &EcdsaKeyPair,
) -> Result<Value, StrandError> {
    let signed = DeactivateSignedData {
        did_suffix: did_suffix.to_string(),
        recovery_key: current_recovery.public_jwk(),
    };
    let payload = canonicalize(&signed)?;
    let signed_data = jws::sign_compact_jws(&payload, current_recovery.signing_key(), None)?;

    Ok(json!({
        "type": "deactivate",
        "didSuffix": did_suffix,
        "revealValue": multihash::commitment(&current_recovery.public_jwk())?,
        "signedData": signed_data,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{ProtocolParameters, StrandError};
    use strand_ops::{parse_did, parse_operation, OperationSource, ParsedOperation, PublicKeyEntry};

    fn kp(seed: u8) -> EcdsaKeyPair {
        EcdsaKeyPair::from_seed([seed; 32])
    }

    fn document() -> DocumentContent {
        DocumentContent {
            public_keys: Some(vec![PublicKeyEntry {
                id: "signing".into(),
                key_type: "JsonWebKey2020".into(),
                public_key_jwk: serde_json::json!({"kty": "EC"}),
                purposes: Some(vec!["authentication".into()]),
            }]),
            services: None,
        }
    }

    fn params() -> ProtocolParameters {
        ProtocolParameters::default()
    }

    #[test]
    fn built_create_passes_node_side_validation() {
        let built = build_create(document(), &kp(1), &kp(2)).unwrap();
        let buffer = serde_json::to_vec(&built.body).unwrap();
        let parsed = parse_operation(&buffer, &params(), OperationSource::Submission).unwrap();
        assert_eq!(parsed.did_suffix().as_str(), built.did_suffix);

        // The long-form DID embeds the same create.
        let parsed_did = parse_did(&built.long_form_did).unwrap();
        assert_eq!(parsed_did.suffix.as_str(), built.did_suffix);
        parsed_did.long_form.unwrap().open(&parsed_did.suffix, &params()).unwrap();
    }

    #[test]
    fn built_update_reveals_current_key() {
        let built = build_create(document(), &kp(1), &kp(2)).unwrap();
        let body = build_update(
            &built.did_suffix,
            vec![Patch::RemoveServices { ids: vec!["old".into()] }],
            &kp(2),
            &kp(3),
        )
        .unwrap();
        let buffer = serde_json::to_vec(&body).unwrap();
        let parsed = parse_operation(&buffer, &params(), OperationSource::Submission).unwrap();
        let ParsedOperation::Update(update) = parsed else { panic!("expected update") };
        // Reveal matches the key in the signed payload; the node enforces
        // this chain against the stored commitment.
        multihash::verify_reveal(
            &update.signed_data.update_key,
            &update.reveal_value,
            &params().hash_algorithms_in_multihash_code,
        )
        .unwrap();
    }

    #[test]
    fn built_recover_and_deactivate_parse() {
        let built = build_create(document(), &kp(1), &kp(2)).unwrap();
        let recover =
            build_recover(&built.did_suffix, document(), &kp(1), &kp(4), &kp(5)).unwrap();
        let deactivate = build_deactivate(&built.did_suffix, &kp(4)).unwrap();

        for body in [recover, deactivate] {
            let buffer = serde_json::to_vec(&body).unwrap();
            parse_operation(&buffer, &params(), OperationSource::Submission).unwrap();
        }
    }

    #[test]
    fn update_refusing_key_reuse() {
        let built = build_create(document(), &kp(1), &kp(2)).unwrap();
        let err = build_update(
            &built.did_suffix,
            vec![Patch::RemoveServices { ids: vec!["old".into()] }],
            &kp(2),
            &kp(2),
        );
        assert!(matches!(err, Err(StrandError::CommitmentReused)));
    }
}
