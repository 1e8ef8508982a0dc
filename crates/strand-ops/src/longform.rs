use serde::{Deserialize, Serialize};

use strand_core::constants::DID_METHOD_NAME;
use strand_core::{DidSuffix, ProtocolParameters, StrandError};
use strand_crypto::{canonicalize, encoder};

use crate::delta::Delta;
use crate::operation::SuffixData;

// ── LongFormSegment ──────────────────────────────────────────────────────────

/// The self-describing tail of a long-form DID: the create operation's suffix
/// data and delta, both in their encoded wire form, wrapped in canonical
/// JSON and base64url-encoded.
///
/// `did:strand:<suffix>:<segment>` resolves before any ledger anchoring by
/// treating the embedded create as operation zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LongFormSegment {
    pub suffix_data: String,
    pub delta: String,
}

impl LongFormSegment {
    /// Build the segment from the create request's encoded members.
    pub fn new(encoded_suffix_data: String, encoded_delta: String) -> Self {
        Self { suffix_data: encoded_suffix_data, delta: encoded_delta }
    }

    pub fn encode(&self) -> Result<String, StrandError> {
        Ok(encoder::encode(canonicalize(self)?))
    }

    pub fn decode(encoded: &str) -> Result<Self, StrandError> {
        let bytes = encoder::decode(encoded, "long-form segment")?;
        serde_json::from_slice(&bytes).map_err(|e| StrandError::MalformedInput {
            context: "long-form segment",
            detail: e.to_string(),
        })
    }

    /// Validate the embedded create against `params` and check that the
    /// suffix data hashes to `expected_suffix`. Returns the create's parts.
    pub fn open(
        &self,
        expected_suffix: &DidSuffix,
        params: &ProtocolParameters,
    ) -> Result<(SuffixData, Delta), StrandError> {
        let suffix_data = SuffixData::decode(&self.suffix_data, params)?;
        let actual = suffix_data.did_suffix()?;
        if actual != *expected_suffix {
            return Err(StrandError::InvalidDid(format!(
                "long-form segment does not match suffix {expected_suffix}"
            )));
        }
        let delta = Delta::decode(&self.delta, params)?;
        Ok((suffix_data, delta))
    }
}

// ── DID string parsing ───────────────────────────────────────────────────────

/// A parsed `did:strand:...` string: short form, or long form with its
/// embedded create segment.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedDid {
    pub suffix: DidSuffix,
    pub long_form: Option<LongFormSegment>,
}

/// Parse a DID string of this method. Accepts `did:strand:<suffix>` and
/// `did:strand:<suffix>:<segment>`.
pub fn parse_did(did: &str) -> Result<ParsedDid, StrandError> {
    let invalid = || StrandError::InvalidDid(did.to_string());
    let rest = did.strip_prefix("did:").ok_or_else(invalid)?;
    let rest = rest.strip_prefix(DID_METHOD_NAME).ok_or_else(invalid)?;
    let rest = rest.strip_prefix(':').ok_or_else(invalid)?;

    let (suffix, segment) = match rest.split_once(':') {
        Some((suffix, segment)) => (suffix, Some(segment)),
        None => (rest, None),
    };
    if suffix.is_empty() || !encoder::is_base64url(suffix) {
        return Err(invalid());
    }
    let long_form = match segment {
        Some(segment) => Some(LongFormSegment::decode(segment)?),
        None => None,
    };
    Ok(ParsedDid { suffix: DidSuffix::new(suffix), long_form })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
