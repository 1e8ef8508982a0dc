use serde::{Deserialize, Serialize};

use strand_core::{DidSuffix, OperationType, ProtocolParameters, StrandError};
use strand_crypto::{encoder, jws, multihash};

use crate::delta::{validate_commitment_string, Delta};
use crate::signed_data::{DeactivateSignedData, RecoverSignedData, UpdateSignedData};

// ── SuffixData ───────────────────────────────────────────────────────────────

/// The signed half of a create: the hash of its first delta and the initial
/// recovery commitment. The DID suffix is the commitment of this struct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuffixData {
    pub delta_hash: String,
    pub recovery_commitment: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub did_type: Option<String>,
}

impl SuffixData {
    /// Decode a base64url suffix-data string and validate its members.
    pub fn decode(encoded: &str, params: &ProtocolParameters) -> Result<Self, StrandError> {
        let bytes = encoder::decode(encoded, "suffixData")?;
        let parsed: Self = serde_json::from_slice(&bytes).map_err(|e| {
            StrandError::MalformedInput { context: "suffixData", detail: e.to_string() }
        })?;
        validate_commitment_string(&parsed.delta_hash, params)?;
        validate_commitment_string(&parsed.recovery_commitment, params)?;
        Ok(parsed)
    }

    /// Encode as base64url canonical JSON.
    pub fn encode(&self) -> Result<String, StrandError> {
        Ok(encoder::encode(strand_crypto::canonicalize(self)?))
    }

    /// The DID unique suffix this create establishes.
    pub fn did_suffix(&self) -> Result<DidSuffix, StrandError> {
        Ok(DidSuffix::new(multihash::commitment(self)?))
    }
}

// ── Parsed operations ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct CreateOperation {
    pub did_suffix: DidSuffix,
    pub suffix_data: SuffixData,
    pub delta: Option<Delta>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateOperation {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
    pub signed_data_jws: String,
    pub signed_data: UpdateSignedData,
    pub delta: Option<Delta>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecoverOperation {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
    pub signed_data_jws: String,
    pub signed_data: RecoverSignedData,
    pub delta: Option<Delta>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeactivateOperation {
    pub did_suffix: DidSuffix,
    pub reveal_value: String,
    pub signed_data_jws: String,
    pub signed_data: DeactivateSignedData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedOperation {
    Create(CreateOperation),
    Update(UpdateOperation),
    Recover(RecoverOperation),
    Deactivate(DeactivateOperation),
}

impl ParsedOperation {
    pub fn operation_type(&self) -> OperationType {
        match self {
            ParsedOperation::Create(_) => OperationType::Create,
            ParsedOperation::Update(_) => OperationType::Update,
            ParsedOperation::Recover(_) => OperationType::Recover,
            ParsedOperation::Deactivate(_) => OperationType::Deactivate,
        }
    }

    pub fn did_suffix(&self) -> &DidSuffix {
        match self {
            ParsedOperation::Create(op) => &op.did_suffix,
            ParsedOperation::Update(op) => &op.did_suffix,
            ParsedOperation::Recover(op) => &op.did_suffix,
            ParsedOperation::Deactivate(op) => &op.did_suffix,
        }
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

/// Where an operation buffer came from, which decides delta strictness.
///
/// A submitted request with a missing or malformed delta is an error back to
/// the caller. An anchored buffer was composed by the transaction processor
/// from ledger files: its delta may legitimately be absent (missing chunk
/// file), and a malformed one degrades to absent so the control-plane parts
/// still apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationSource {
    Submission,
    Anchored,
}

// serde's internally-tagged enums do not support `deny_unknown_fields`, so
// the wire form goes through one exhaustive raw struct and the type decides
// which exact member subset must be present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawOperation {
    #[serde(rename = "type")]
    operation_type: OperationType,
    #[serde(default)]
    suffix_data: Option<String>,
    #[serde(default)]
    did_suffix: Option<String>,
    #[serde(default)]
    reveal_value: Option<String>,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    signed_data: Option<String>,
}

/// Parse and validate one operation request buffer.
pub fn parse_operation(
    buffer: &[u8],
    params: &ProtocolParameters,
    source: OperationSource,
) -> Result<ParsedOperation, StrandError> {
    if buffer.len() > params.max_operation_size {
        return Err(StrandError::SizeExceeded {
            context: "operation",
            size: buffer.len(),
            max: params.max_operation_size,
        });
    }
    let raw: RawOperation = serde_json::from_slice(buffer).map_err(|e| {
        StrandError::MalformedInput { context: "operation", detail: e.to_string() }
    })?;

    match raw.operation_type {
        OperationType::Create => parse_create(raw, params, source),
        OperationType::Update => parse_update(raw, params, source),
        OperationType::Recover => parse_recover(raw, params, source),
        OperationType::Deactivate => parse_deactivate(raw, params),
    }
}

fn parse_create(
    raw: RawOperation,
    params: &ProtocolParameters,
    source: OperationSource,
) -> Result<ParsedOperation, StrandError> {
    require_absent(raw.did_suffix.is_none(), "create", "didSuffix")?;
    require_absent(raw.reveal_value.is_none(), "create", "revealValue")?;
    require_absent(raw.signed_data.is_none(), "create", "signedData")?;

    let encoded_suffix_data = raw.suffix_data.ok_or(StrandError::MalformedInput {
        context: "create",
        detail: "suffixData is required".into(),
    })?;
    let suffix_data = SuffixData::decode(&encoded_suffix_data, params)?;
    let did_suffix = suffix_data.did_suffix()?;
    let delta = parse_delta_member(raw.delta, params, source, "create")?;

    Ok(ParsedOperation::Create(CreateOperation { did_suffix, suffix_data, delta }))
}

fn parse_update(
    raw: RawOperation,
    params: &ProtocolParameters,
    source: OperationSource,
) -> Result<ParsedOperation, StrandError> {
    require_absent(raw.suffix_data.is_none(), "update", "suffixData")?;
    let (did_suffix, reveal_value) = parse_reference_members(&raw, params, "update")?;

    let signed_data_jws = raw.signed_data.ok_or(StrandError::MalformedInput {
        context: "update",
        detail: "signedData is required".into(),
    })?;
    let payload = jws::decode_unverified_payload(&signed_data_jws)?;
    let signed_data = UpdateSignedData::from_payload(&payload, params)?;
    let delta = parse_delta_member(raw.delta, params, source, "update")?;

    Ok(ParsedOperation::Update(UpdateOperation {
        did_suffix,
        reveal_value,
        signed_data_jws,
        signed_data,
        delta,
    }))
}

fn parse_recover(
    raw: RawOperation,
    params: &ProtocolParameters,
    source: OperationSource,
) -> Result<ParsedOperation, StrandError> {
    require_absent(raw.suffix_data.is_none(), "recover", "suffixData")?;
    let (did_suffix, reveal_value) = parse_reference_members(&raw, params, "recover")?;

    let signed_data_jws = raw.signed_data.ok_or(StrandError::MalformedInput {
        context: "recover",
        detail: "signedData is required".into(),
    })?;
    let payload = jws::decode_unverified_payload(&signed_data_jws)?;
    let signed_data = RecoverSignedData::from_payload(&payload, params)?;
    let delta = parse_delta_member(raw.delta, params, source, "recover")?;

    Ok(ParsedOperation::Recover(RecoverOperation {
        did_suffix,
        reveal_value,
        signed_data_jws,
        signed_data,
        delta,
    }))
}

fn parse_deactivate(
    raw: RawOperation,
    params: &ProtocolParameters,
) -> Result<ParsedOperation, StrandError> {
    require_absent(raw.suffix_data.is_none(), "deactivate", "suffixData")?;
    require_absent(raw.delta.is_none(), "deactivate", "delta")?;
    let (did_suffix, reveal_value) = parse_reference_members(&raw, params, "deactivate")?;

    let signed_data_jws = raw.signed_data.ok_or(StrandError::MalformedInput {
        context: "deactivate",
        detail: "signedData is required".into(),
    })?;
    let payload = jws::decode_unverified_payload(&signed_data_jws)?;
    let signed_data = DeactivateSignedData::from_payload(&payload, params)?;

    // A deactivation proof is bound to its DID; a mismatch is a replay.
    if signed_data.did_suffix != did_suffix.as_str() {
        return Err(StrandError::MalformedInput {
            context: "deactivate",
            detail: "signedData.didSuffix does not match the operation's didSuffix".into(),
        });
    }

    Ok(ParsedOperation::Deactivate(DeactivateOperation {
        did_suffix,
        reveal_value,
        signed_data_jws,
        signed_data,
    }))
}

// ── Member helpers ───────────────────────────────────────────────────────────

fn require_absent(
    absent: bool,
    operation: &'static str,
    member: &str,
) -> Result<(), StrandError> {
    if absent {
        Ok(())
    } else {
        Err(StrandError::MalformedInput {
            context: operation,
            detail: format!("{member} is not a property of {operation} operations"),
        })
    }
}

fn parse_reference_members(
    raw: &RawOperation,
    params: &ProtocolParameters,
    operation: &'static str,
) -> Result<(DidSuffix, String), StrandError> {
    let did_suffix = raw.did_suffix.clone().ok_or(StrandError::MalformedInput {
        context: operation,
        detail: "didSuffix is required".into(),
    })?;
    let reveal_value = raw.reveal_value.clone().ok_or(StrandError::MalformedInput {
        context: operation,
        detail: "revealValue is required".into(),
    })?;

    // Both are multihash strings; a malformed one can never match anything,
    // so reject it up front.
    let suffix_bytes = encoder::decode(&did_suffix, "didSuffix")?;
    multihash::Multihash::parse(&suffix_bytes, &params.hash_algorithms_in_multihash_code)
        .map_err(|_| StrandError::InvalidDid(did_suffix.clone()))?;
    let reveal_bytes = encoder::decode(&reveal_value, "revealValue")?;
    multihash::Multihash::parse(&reveal_bytes, &params.hash_algorithms_in_multihash_code)?;

    Ok((DidSuffix::new(did_suffix), reveal_value))
}

fn parse_delta_member(
    encoded: Option<String>,
    params: &ProtocolParameters,
    source: OperationSource,
    operation: &'static str,
) -> Result<Option<Delta>, StrandError> {
    match (encoded, source) {
        (Some(encoded), OperationSource::Submission) => Ok(Some(Delta::decode(&encoded, params)?)),
        (Some(encoded), OperationSource::Anchored) => Ok(Delta::decode(&encoded, params).ok()),
        (None, OperationSource::Submission) => Err(StrandError::MalformedInput {
            context: operation,
            detail: "delta is required".into(),
        }),
        (None, OperationSource::Anchored) => Ok(None),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
