use tracing::debug;

use strand_core::{AnchoredOperation, ProtocolParameters, StrandError};
use strand_crypto::{canonicalize, jws, multihash};
use strand_ops::{
    parse_operation, CreateOperation, DeactivateOperation, Delta, OperationSource, ParsedOperation,
    Patch, RecoverOperation, UpdateOperation,
};

use crate::state::{DidState, DocumentState};

// ── Stream application ───────────────────────────────────────────────────────

/// Apply one anchored operation to the current state of its DID.
///
/// Ineffective operations (failed parse, commitment mismatch, bad signature,
/// hash mismatch where the rules say so) leave the state untouched; the
/// caller continues with the next operation in the stream.
pub fn apply_operation(
    state: Option<DidState>,
    operation: &AnchoredOperation,
    params: &ProtocolParameters,
) -> Option<DidState> {
    let parsed = match parse_operation(&operation.operation_buffer, params, OperationSource::Anchored)
    {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(suffix = %operation.did_suffix, txn = operation.transaction_number,
                   error = %e, "anchored operation failed to parse; skipped");
            return state;
        }
    };
    if parsed.did_suffix() != &operation.did_suffix {
        debug!(suffix = %operation.did_suffix, txn = operation.transaction_number,
               "anchored operation body targets a different suffix; skipped");
        return state;
    }

    let applied = match (parsed, &state) {
        (ParsedOperation::Create(create), None) => apply_create(&create, operation, params),
        (ParsedOperation::Create(_), Some(_)) => {
            Err(StrandError::Other("create after existing state".into()))
        }
        (_, None) => Err(StrandError::Other("no prior create for suffix".into())),
        (ParsedOperation::Update(update), Some(current)) => {
            apply_update(&update, current, operation, params)
        }
        (ParsedOperation::Recover(recover), Some(current)) => {
            apply_recover(&recover, current, operation, params)
        }
        (ParsedOperation::Deactivate(deactivate), Some(current)) => {
            apply_deactivate(&deactivate, current, operation, params)
        }
    };

    match applied {
        Ok(next) => Some(next),
        Err(e) => {
            debug!(suffix = %operation.did_suffix, txn = operation.transaction_number,
                   kind = %operation.operation_type, error = %e, "operation ineffective");
            state
        }
    }
}

/// Fold a full ascending operation stream into a final state.
pub fn apply_stream(
    mut operations: Vec<AnchoredOperation>,
    versioning: &strand_core::ProtocolVersioning,
) -> Option<DidState> {
    operations.sort_by_key(AnchoredOperation::order_key);
    let mut state = None;
    for operation in &operations {
        let params = versioning.parameters_at(operation.transaction_time);
        state = apply_operation(state, operation, params);
    }
    state
}

// ── Per-type rules ───────────────────────────────────────────────────────────

fn apply_create(
    create: &CreateOperation,
    operation: &AnchoredOperation,
    params: &ProtocolParameters,
) -> Result<DidState, StrandError> {
    // The conservative rule: a create whose delta is missing or mismatched
    // still establishes the DID and its recovery commitment, but leaves the
    // document empty and updates blocked until a recover supplies a delta.
    let (document, next_update_commitment) =
        match usable_delta(&create.delta, &create.suffix_data.delta_hash, params) {
            Some(delta) => {
                let mut document = DocumentState::default();
                apply_patches(&mut document, &delta.patches);
                (document, Some(delta.update_commitment))
            }
            None => (DocumentState::default(), None),
        };

    Ok(DidState {
        document,
        next_recovery_commitment: Some(create.suffix_data.recovery_commitment.clone()),
        next_update_commitment,
        last_operation_transaction_number: operation.transaction_number,
    })
}

fn apply_update(
    update: &UpdateOperation,
    state: &DidState,
    operation: &AnchoredOperation,
    params: &ProtocolParameters,
) -> Result<DidState, StrandError> {
    let current_commitment = state
        .next_update_commitment
        .as_deref()
        .ok_or(StrandError::CommitmentMismatch)?;

    multihash::verify_reveal(
        &update.signed_data.update_key,
        current_commitment,
        &params.hash_algorithms_in_multihash_code,
    )?;
    jws::verify_compact_jws(&update.signed_data_jws, &update.signed_data.update_key)?;

    // An update with no usable delta is discarded wholesale. The commitment
    // does NOT rotate, so the holder can try again.
    let delta = usable_delta(&update.delta, &update.signed_data.delta_hash, params)
        .ok_or(StrandError::DeltaHashMismatch)?;
    if delta.update_commitment == current_commitment {
        return Err(StrandError::CommitmentReused);
    }

    let mut document = state.document.clone();
    apply_patches(&mut document, &delta.patches);

    Ok(DidState {
        document,
        next_recovery_commitment: state.next_recovery_commitment.clone(),
        next_update_commitment: Some(delta.update_commitment),
        last_operation_transaction_number: operation.transaction_number,
    })
}

fn apply_recover(
    recover: &RecoverOperation,
    state: &DidState,
    operation: &AnchoredOperation,
    params: &ProtocolParameters,
) -> Result<DidState, StrandError> {
    let current_commitment = state
        .next_recovery_commitment
        .as_deref()
        .ok_or(StrandError::CommitmentMismatch)?;

    multihash::verify_reveal(
        &recover.signed_data.recovery_key,
        current_commitment,
        &params.hash_algorithms_in_multihash_code,
    )?;
    jws::verify_compact_jws(&recover.signed_data_jws, &recover.signed_data.recovery_key)?;

    let next_recovery = recover.signed_data.recovery_commitment.clone();
    if next_recovery == current_commitment {
        return Err(StrandError::CommitmentReused);
    }

    // A recover rebuilds the document from scratch. Without a usable delta
    // the document is unreachable until a later recover, but the recovery
    // commitment still rotates: the authentication succeeded.
    let (document, next_update_commitment) =
        match usable_delta(&recover.delta, &recover.signed_data.delta_hash, params) {
            Some(delta) => {
                let mut document = DocumentState::default();
                apply_patches(&mut document, &delta.patches);
                (document, Some(delta.update_commitment))
            }
            None => (DocumentState::default(), None),
        };

    Ok(DidState {
        document,
        next_recovery_commitment: Some(next_recovery),
        next_update_commitment,
        last_operation_transaction_number: operation.transaction_number,
    })
}

fn apply_deactivate(
    deactivate: &DeactivateOperation,
    state: &DidState,
    operation: &AnchoredOperation,
    params: &ProtocolParameters,
) -> Result<DidState, StrandError> {
    let current_commitment = state
        .next_recovery_commitment
        .as_deref()
        .ok_or(StrandError::CommitmentMismatch)?;

    multihash::verify_reveal(
        &deactivate.signed_data.recovery_key,
        current_commitment,
        &params.hash_algorithms_in_multihash_code,
    )?;
    jws::verify_compact_jws(&deactivate.signed_data_jws, &deactivate.signed_data.recovery_key)?;

    // Terminal: both commitments cleared, nothing can follow.
    Ok(DidState {
        document: DocumentState::default(),
        next_recovery_commitment: None,
        next_update_commitment: None,
        last_operation_transaction_number: operation.transaction_number,
    })
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A delta is usable when it is present and its canonical form hashes to the
/// signed delta hash.
fn usable_delta(delta: &Option<Delta>, expected_hash: &str, params: &ProtocolParameters) -> Option<Delta> {
    let delta = delta.as_ref()?;
    let canonical = canonicalize(delta).ok()?;
    multihash::verify_encoded_hash(
        &canonical,
        expected_hash,
        &params.hash_algorithms_in_multihash_code,
    )
    .ok()?;
    Some(delta.clone())
}

fn apply_patches(document: &mut DocumentState, patches: &[Patch]) {
    for patch in patches {
        match patch {
            Patch::Replace { document: content } => document.replace_with(content),
            Patch::AddPublicKeys { public_keys } => document.add_public_keys(public_keys),
            Patch::RemovePublicKeys { ids } => document.remove_public_keys(ids),
            Patch::AddServices { services } => document.add_services(services),
            Patch::RemoveServices { ids } => document.remove_services(ids),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
