use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use strand_core::constants::{MAX_ID_LENGTH, MAX_SERVICE_TYPE_LENGTH, PUBLIC_KEY_PURPOSES};
use strand_core::StrandError;
use strand_crypto::encoder;

// ── PublicKeyEntry ───────────────────────────────────────────────────────────

/// One verification key inside a DID document.
///
/// `public_key_jwk` is any JWK object; document keys are not restricted to
/// the protocol's signing curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub public_key_jwk: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purposes: Option<Vec<String>>,
}

impl PublicKeyEntry {
    pub fn validate(&self) -> Result<(), StrandError> {
        validate_fragment_id(&self.id, "public key id")?;
        if self.key_type.is_empty() {
            return Err(StrandError::InvalidPatch("public key type must be non-empty".into()));
        }
        if !self.public_key_jwk.is_object() {
            return Err(StrandError::InvalidPatch(format!(
                "publicKeyJwk for {} must be a JSON object",
                self.id
            )));
        }
        if let Some(purposes) = &self.purposes {
            let mut seen = HashSet::new();
            for purpose in purposes {
                if !PUBLIC_KEY_PURPOSES.contains(&purpose.as_str()) {
                    return Err(StrandError::InvalidPatch(format!(
                        "unknown public key purpose: {purpose}"
                    )));
                }
                if !seen.insert(purpose.as_str()) {
                    return Err(StrandError::InvalidPatch(format!(
                        "duplicate public key purpose: {purpose}"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── ServiceEntry ─────────────────────────────────────────────────────────────

/// One service inside a DID document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: Value,
}

impl ServiceEntry {
    pub fn validate(&self) -> Result<(), StrandError> {
        validate_fragment_id(&self.id, "service id")?;
        if self.service_type.is_empty() || self.service_type.len() > MAX_SERVICE_TYPE_LENGTH {
            return Err(StrandError::InvalidPatch(format!(
                "service type must be 1..={MAX_SERVICE_TYPE_LENGTH} characters"
            )));
        }
        match &self.service_endpoint {
            Value::String(uri) => validate_uri(uri)?,
            Value::Object(_) => {}
            _ => {
                return Err(StrandError::InvalidPatch(
                    "service endpoint must be a URI string or a JSON object".into(),
                ))
            }
        }
        Ok(())
    }
}

// ── DocumentContent ──────────────────────────────────────────────────────────

/// The document payload of a `replace` patch: the full key and service sets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_keys: Option<Vec<PublicKeyEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ServiceEntry>>,
}

impl DocumentContent {
    pub fn validate(&self) -> Result<(), StrandError> {
        if let Some(keys) = &self.public_keys {
            validate_unique_ids(keys.iter().map(|k| k.id.as_str()), "public key")?;
            for key in keys {
                key.validate()?;
            }
        }
        if let Some(services) = &self.services {
            validate_unique_ids(services.iter().map(|s| s.id.as_str()), "service")?;
            for service in services {
                service.validate()?;
            }
        }
        Ok(())
    }
}

// ── Shared validators ────────────────────────────────────────────────────────

/// Key and service ids become `#` fragments in the projected document:
/// base64url characters only, at most 50 of them.
pub fn validate_fragment_id(id: &str, what: &str) -> Result<(), StrandError> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH || !encoder::is_base64url(id) {
        return Err(StrandError::InvalidPatch(format!(
            "{what} must be 1..={MAX_ID_LENGTH} base64url characters: {id:?}"
        )));
    }
    Ok(())
}

pub fn validate_unique_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<(), StrandError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(StrandError::InvalidPatch(format!("duplicate {what} id: {id}")));
        }
    }
    Ok(())
}

/// Minimal absolute-URI check: `scheme ":" non-empty-remainder`, scheme
/// starting with a letter and continuing with `[A-Za-z0-9+.-]`, no
/// whitespace anywhere.
fn validate_uri(uri: &str) -> Result<(), StrandError> {
    let err = || StrandError::InvalidPatch(format!("service endpoint is not a valid URI: {uri}"));
    if uri.chars().any(char::is_whitespace) {
        return Err(err());
    }
    let (scheme, rest) = uri.split_once(':').ok_or_else(err)?;
    let mut chars = scheme.chars();
    let scheme_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok || rest.is_empty() {
        return Err(err());
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
