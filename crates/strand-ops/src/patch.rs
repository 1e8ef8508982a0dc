use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use strand_core::StrandError;

use crate::document::{validate_fragment_id, validate_unique_ids, DocumentContent, PublicKeyEntry, ServiceEntry};

// ── Patch ────────────────────────────────────────────────────────────────────

/// One document mutation. The action set is closed; each action carries
/// exactly one payload field.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch {
    Replace { document: DocumentContent },
    AddPublicKeys { public_keys: Vec<PublicKeyEntry> },
    RemovePublicKeys { ids: Vec<String> },
    AddServices { services: Vec<ServiceEntry> },
    RemoveServices { ids: Vec<String> },
}

impl Patch {
    pub fn action(&self) -> &'static str {
        match self {
            Patch::Replace { .. } => "replace",
            Patch::AddPublicKeys { .. } => "add-public-keys",
            Patch::RemovePublicKeys { .. } => "remove-public-keys",
            Patch::AddServices { .. } => "add-services",
            Patch::RemoveServices { .. } => "remove-services",
        }
    }

    /// Field-level validation of the payload (ids, purposes, endpoints).
    pub fn validate(&self) -> Result<(), StrandError> {
        match self {
            Patch::Replace { document } => document.validate(),
            Patch::AddPublicKeys { public_keys } => {
                validate_unique_ids(public_keys.iter().map(|k| k.id.as_str()), "public key")?;
                public_keys.iter().try_for_each(PublicKeyEntry::validate)
            }
            Patch::AddServices { services } => {
                validate_unique_ids(services.iter().map(|s| s.id.as_str()), "service")?;
                services.iter().try_for_each(ServiceEntry::validate)
            }
            Patch::RemovePublicKeys { ids } => {
                validate_unique_ids(ids.iter().map(String::as_str), "public key")?;
                ids.iter().try_for_each(|id| validate_fragment_id(id, "public key id"))
            }
            Patch::RemoveServices { ids } => {
                validate_unique_ids(ids.iter().map(String::as_str), "service")?;
                ids.iter().try_for_each(|id| validate_fragment_id(id, "service id"))
            }
        }
    }
}

// ── Wire codec ───────────────────────────────────────────────────────────────

// serde's internally-tagged enums cannot combine `tag = "action"` with
// `deny_unknown_fields`, so the wire form goes through an exhaustive raw
// struct: every known property is optional here, and the action decides
// which exact subset must be present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawPatch {
    action: String,
    #[serde(default)]
    document: Option<DocumentContent>,
    #[serde(default)]
    public_keys: Option<Vec<PublicKeyEntry>>,
    #[serde(default)]
    services: Option<Vec<ServiceEntry>>,
    #[serde(default)]
    ids: Option<Vec<String>>,
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = RawPatch::deserialize(deserializer)?;
        let RawPatch { action, document, public_keys, services, ids } = raw;

        let patch = match action.as_str() {
            "replace" => match (document, public_keys, services, ids) {
                (Some(document), None, None, None) => Patch::Replace { document },
                _ => return Err(D::Error::custom("replace patch carries exactly `document`")),
            },
            "add-public-keys" => match (document, public_keys, services, ids) {
                (None, Some(public_keys), None, None) => Patch::AddPublicKeys { public_keys },
                _ => {
                    return Err(D::Error::custom(
                        "add-public-keys patch carries exactly `publicKeys`",
                    ))
                }
            },
            "remove-public-keys" => match (document, public_keys, services, ids) {
                (None, None, None, Some(ids)) => Patch::RemovePublicKeys { ids },
                _ => return Err(D::Error::custom("remove-public-keys patch carries exactly `ids`")),
            },
            "add-services" => match (document, public_keys, services, ids) {
                (None, None, Some(services), None) => Patch::AddServices { services },
                _ => return Err(D::Error::custom("add-services patch carries exactly `services`")),
            },
            "remove-services" => match (document, public_keys, services, ids) {
                (None, None, None, Some(ids)) => Patch::RemoveServices { ids },
                _ => return Err(D::Error::custom("remove-services patch carries exactly `ids`")),
            },
            other => return Err(D::Error::custom(format!("unknown patch action: {other}"))),
        };
        Ok(patch)
    }
}

impl Serialize for Patch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("action", self.action())?;
        match self {
            Patch::Replace { document } => map.serialize_entry("document", document)?,
            Patch::AddPublicKeys { public_keys } => {
                map.serialize_entry("publicKeys", public_keys)?
            }
            Patch::AddServices { services } => map.serialize_entry("services", services)?,
            Patch::RemovePublicKeys { ids } | Patch::RemoveServices { ids } => {
                map.serialize_entry("ids", ids)?
            }
        }
        map.end()
    }
}

/// Parse a JSON value as a patch, running field-level validation.
pub fn parse_patch(value: &Value) -> Result<Patch, StrandError> {
    let patch: Patch = serde_json::from_value(value.clone()).map_err(|e| {
        StrandError::MalformedInput { context: "patch", detail: e.to_string() }
    })?;
    patch.validate()?;
    Ok(patch)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replace_round_trip() {
        let value = json!({
            "action": "replace",
            "document": {
                "publicKeys": [{
                    "id": "key1",
                    "type": "JsonWebKey2020",
                    "publicKeyJwk": {"kty": "EC"},
                    "purposes": ["authentication"]
                }],
                "services": [{
                    "id": "hub",
                    "type": "IdentityHub",
                    "serviceEndpoint": "https://hub.example.com"
                }]
            }
        });
        let patch = parse_patch(&value).unwrap();
        assert!(matches!(patch, Patch::Replace { .. }));
        let back = serde_json::to_value(&patch).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn add_remove_round_trip() {
        let add = json!({
            "action": "add-services",
            "services": [{"id": "s1", "type": "T", "serviceEndpoint": "urn:x"}]
        });
        let remove = json!({"action": "remove-public-keys", "ids": ["key1", "key2"]});
        assert_eq!(serde_json::to_value(parse_patch(&add).unwrap()).unwrap(), add);
        assert_eq!(serde_json::to_value(parse_patch(&remove).unwrap()).unwrap(), remove);
    }

    #[test]
    fn unknown_action_rejected() {
        let err = parse_patch(&json!({"action": "ietf-json-patch", "ids": []})).unwrap_err();
        assert!(matches!(err, StrandError::MalformedInput { .. }));
    }

    #[test]
    fn wrong_payload_field_rejected() {
        // `document` on an add-services action.
        let err = parse_patch(&json!({
            "action": "add-services",
            "document": {}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn extra_property_rejected() {
        let err = parse_patch(&json!({
            "action": "remove-services",
            "ids": ["s1"],
            "note": "also this"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn payload_validation_runs() {
        let err = parse_patch(&json!({
            "action": "remove-services",
            "ids": ["has space"]
        }));
        assert!(matches!(err, Err(StrandError::InvalidPatch(_))));
    }
}
