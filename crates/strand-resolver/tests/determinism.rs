//! Stream-level properties of resolution: any insertion order of the same
//! anchored operations yields the same state, failed operations never move
//! commitments, and a deactivated DID is inert under every later operation.
//!
//! Run with:
//!   cargo test -p strand-resolver --test determinism

use serde_json::json;

use strand_core::{AnchoredOperation, DidSuffix, OperationType, ProtocolVersioning};
use strand_crypto::{canonicalize, jws, multihash, EcdsaKeyPair};
use strand_ops::operation::SuffixData;
use strand_ops::signed_data::{DeactivateSignedData, RecoverSignedData, UpdateSignedData};
use strand_ops::{Delta, DocumentContent, Patch, PublicKeyEntry};
use strand_resolver::apply::apply_stream;
use strand_resolver::DidState;

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn kp(seed: u8) -> EcdsaKeyPair {
    EcdsaKeyPair::from_seed([seed; 32])
}

fn commit(keypair: &EcdsaKeyPair) -> String {
    multihash::commitment(&keypair.public_jwk()).unwrap()
}

fn doc_key(id: &str) -> PublicKeyEntry {
    PublicKeyEntry {
        id: id.into(),
        key_type: "JsonWebKey2020".into(),
        public_key_jwk: json!({"kty": "EC", "marker": id}),
        purposes: Some(vec!["authentication".into()]),
    }
}

fn anchored(
    buffer: Vec<u8>,
    operation_type: OperationType,
    suffix: &DidSuffix,
    txn: u64,
) -> AnchoredOperation {
    AnchoredOperation {
        did_suffix: suffix.clone(),
        operation_type,
        operation_buffer: buffer,
        transaction_number: txn,
        transaction_time: txn,
        operation_index: 0,
    }
}

/// Build a realistic six-operation history:
/// create, update, forged update, recover, update, deactivate.
fn history() -> (Vec<AnchoredOperation>, DidSuffix) {
    let recovery0 = kp(1);
    let update0 = kp(2);
    let update1 = kp(3);
    let recovery1 = kp(4);
    let update2 = kp(5);
    let update3 = kp(6);

    let create_delta = Delta {
        patches: vec![Patch::Replace {
            document: DocumentContent { public_keys: Some(vec![doc_key("key1")]), services: None },
        }],
        update_commitment: commit(&update0),
    };
    let suffix_data = SuffixData {
        delta_hash: create_delta.hash().unwrap(),
        recovery_commitment: commit(&recovery0),
        did_type: None,
    };
    let suffix = suffix_data.did_suffix().unwrap();

    let create = anchored(
        serde_json::to_vec(&json!({
            "type": "create",
            "suffixData": suffix_data.encode().unwrap(),
            "delta": create_delta.encode().unwrap(),
        }))
        .unwrap(),
        OperationType::Create,
        &suffix,
        10,
    );

    let update_op = |signer: &EcdsaKeyPair, delta: &Delta, txn: u64| {
        let signed = UpdateSignedData {
            update_key: signer.public_jwk(),
            delta_hash: delta.hash().unwrap(),
        };
        let payload = canonicalize(&signed).unwrap();
        let jws = jws::sign_compact_jws(&payload, signer.signing_key(), None).unwrap();
        anchored(
            serde_json::to_vec(&json!({
                "type": "update",
                "didSuffix": suffix.as_str(),
                "revealValue": commit(signer),
                "delta": delta.encode().unwrap(),
                "signedData": jws,
            }))
            .unwrap(),
            OperationType::Update,
            &suffix,
            txn,
        )
    };

    let good_update = update_op(
        &update0,
        &Delta {
            patches: vec![Patch::AddPublicKeys { public_keys: vec![doc_key("key2")] }],
            update_commitment: commit(&update1),
        },
        11,
    );
    let forged_update = update_op(
        &kp(66),
        &Delta {
            patches: vec![Patch::AddPublicKeys { public_keys: vec![doc_key("forged")] }],
            update_commitment: commit(&kp(67)),
        },
        12,
    );

    let recover_delta = Delta {
        patches: vec![Patch::Replace {
            document: DocumentContent { public_keys: Some(vec![doc_key("key3")]), services: None },
        }],
        update_commitment: commit(&update2),
    };
    let recover_signed = RecoverSignedData {
        recovery_key: recovery0.public_jwk(),
        recovery_commitment: commit(&recovery1),
        delta_hash: recover_delta.hash().unwrap(),
    };
    let recover_payload = canonicalize(&recover_signed).unwrap();
    let recover_jws =
        jws::sign_compact_jws(&recover_payload, recovery0.signing_key(), None).unwrap();
    let recover = anchored(
        serde_json::to_vec(&json!({
            "type": "recover",
            "didSuffix": suffix.as_str(),
            "revealValue": commit(&recovery0),
            "delta": recover_delta.encode().unwrap(),
            "signedData": recover_jws,
        }))
        .unwrap(),
        OperationType::Recover,
        &suffix,
        13,
    );

    let post_recover_update = update_op(
        &update2,
        &Delta {
            patches: vec![Patch::AddPublicKeys { public_keys: vec![doc_key("key4")] }],
            update_commitment: commit(&update3),
        },
        14,
    );

    let deactivate_signed = DeactivateSignedData {
        did_suffix: suffix.as_str().to_string(),
        recovery_key: recovery1.public_jwk(),
    };
    let deactivate_payload = canonicalize(&deactivate_signed).unwrap();
    let deactivate_jws =
        jws::sign_compact_jws(&deactivate_payload, recovery1.signing_key(), None).unwrap();
    let deactivate = anchored(
        serde_json::to_vec(&json!({
            "type": "deactivate",
            "didSuffix": suffix.as_str(),
            "revealValue": commit(&recovery1),
            "signedData": deactivate_jws,
        }))
        .unwrap(),
        OperationType::Deactivate,
        &suffix,
        15,
    );

    (vec![create, good_update, forged_update, recover, post_recover_update, deactivate], suffix)
}

fn resolve(ops: Vec<AnchoredOperation>) -> Option<DidState> {
    apply_stream(ops, &ProtocolVersioning::default())
}

// ── Properties ────────────────────────────────────────────────────────────────

#[test]
fn every_insertion_order_resolves_identically() {
    let (ops, _) = history();
    let reference = resolve(ops.clone()).expect("history resolves");

    // Rotations plus a few hand-picked shuffles cover a representative set
    // of insertion orders without a randomness dependency.
    let mut orders: Vec<Vec<usize>> = (0..ops.len())
        .map(|r| (0..ops.len()).map(|i| (i + r) % ops.len()).collect())
        .collect();
    orders.push(vec![5, 3, 1, 4, 2, 0]);
    orders.push(vec![2, 0, 4, 1, 5, 3]);

    for order in orders {
        let shuffled: Vec<AnchoredOperation> = order.iter().map(|&i| ops[i].clone()).collect();
        assert_eq!(resolve(shuffled).unwrap(), reference, "order {order:?}");
    }
}

#[test]
fn prefix_states_show_commitment_monotonicity() {
    let (ops, _) = history();

    let mut previous: Option<DidState> = None;
    for len in 1..=ops.len() {
        let state = resolve(ops[..len].to_vec()).expect("prefix resolves");
        if let Some(previous) = &previous {
            let advanced = state.last_operation_transaction_number
                > previous.last_operation_transaction_number;
            if advanced {
                // An effective operation moved at least one commitment.
                assert!(
                    state.next_update_commitment != previous.next_update_commitment
                        || state.next_recovery_commitment != previous.next_recovery_commitment,
                    "effective operation at prefix {len} left both commitments in place"
                );
            } else {
                // An ineffective one moved neither.
                assert_eq!(state, *previous, "ineffective operation changed state");
            }
        }
        previous = Some(state);
    }

    let terminal = previous.unwrap();
    assert!(terminal.is_deactivated());
}

#[test]
fn operations_after_deactivation_are_inert() {
    let (ops, suffix) = history();
    let terminal = resolve(ops.clone()).unwrap();

    // Replay the whole history again after the deactivate, renumbered later.
    let mut extended = ops.clone();
    for (offset, op) in ops.into_iter().enumerate() {
        let mut late = op;
        late.transaction_number = 100 + offset as u64;
        late.transaction_time = late.transaction_number;
        extended.push(late);
    }
    let after = resolve(extended).unwrap();

    assert!(after.is_deactivated());
    assert_eq!(after.document, terminal.document);
    assert_eq!(after.last_operation_transaction_number, terminal.last_operation_transaction_number);
    assert_eq!(suffix.as_str().len(), 46);
}
