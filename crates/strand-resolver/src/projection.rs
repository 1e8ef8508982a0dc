use serde::Serialize;
use serde_json::{json, Value};

use strand_core::constants::PUBLIC_KEY_PURPOSES;

use crate::state::DidState;

// ── ResolutionResult ─────────────────────────────────────────────────────────

/// What a resolution request returns: the projected DID document (absent
/// once deactivated) plus method metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<Value>,
    pub did_document_metadata: DidDocumentMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocumentMetadata {
    pub canonical_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodMetadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_commitment: Option<String>,
}

// ── Projection ───────────────────────────────────────────────────────────────

/// Project internal DID state to the external resolution result.
///
/// Verification methods are emitted with `#` fragment ids and
/// `controller = did`; verification relationships are indexed by each key's
/// declared purposes. A deactivated DID is reported with the `deactivated`
/// marker and no document.
pub fn project(did: &str, state: &DidState) -> ResolutionResult {
    if state.is_deactivated() {
        return ResolutionResult {
            context: "https://w3id.org/did-resolution/v1".into(),
            did_document: None,
            did_document_metadata: DidDocumentMetadata {
                canonical_id: did.to_string(),
                deactivated: Some(true),
                method: None,
            },
        };
    }

    let verification_methods: Vec<Value> = state
        .document
        .public_keys
        .iter()
        .map(|key| {
            json!({
                "id": format!("#{}", key.id),
                "controller": did,
                "type": key.key_type,
                "publicKeyJwk": key.public_key_jwk,
            })
        })
        .collect();

    let mut document = json!({
        "id": did,
        "@context": ["https://www.w3.org/ns/did/v1", { "@base": did }],
    });
    let doc = document.as_object_mut().expect("document literal is an object");
    if !verification_methods.is_empty() {
        doc.insert("verificationMethod".into(), Value::Array(verification_methods));
    }

    // One relationship array per purpose, in the canonical purpose order,
    // listing fragment references in key insertion order.
    for purpose in PUBLIC_KEY_PURPOSES {
        let members: Vec<Value> = state
            .document
            .public_keys
            .iter()
            .filter(|key| {
                key.purposes
                    .as_ref()
                    .map_or(false, |purposes| purposes.iter().any(|p| p == purpose))
            })
            .map(|key| Value::String(format!("#{}", key.id)))
            .collect();
        if !members.is_empty() {
            doc.insert(purpose.to_string(), Value::Array(members));
        }
    }

    if !state.document.services.is_empty() {
        let services: Vec<Value> = state
            .document
            .services
            .iter()
            .map(|service| {
                json!({
                    "id": format!("#{}", service.id),
                    "type": service.service_type,
                    "serviceEndpoint": service.service_endpoint,
                })
            })
            .collect();
        doc.insert("service".into(), Value::Array(services));
    }

    ResolutionResult {
        context: "https://w3id.org/did-resolution/v1".into(),
        did_document: Some(document),
        did_document_metadata: DidDocumentMetadata {
            canonical_id: did.to_string(),
            deactivated: None,
            method: Some(MethodMetadata {
                update_commitment: state.next_update_commitment.clone(),
                recovery_commitment: state.next_recovery_commitment.clone(),
            }),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strand_ops::{PublicKeyEntry, ServiceEntry};

    use crate::state::DocumentState;

    fn state_with(keys: Vec<PublicKeyEntry>, services: Vec<ServiceEntry>) -> DidState {
        DidState {
            document: DocumentState { public_keys: keys, services },
            next_recovery_commitment: Some("rc".into()),
            next_update_commitment: Some("uc".into()),
            last_operation_transaction_number: 4,
        }
    }

    #[test]
    fn projects_keys_and_relationships() {
        let state = state_with(
            vec![
                PublicKeyEntry {
                    id: "signing".into(),
                    key_type: "JsonWebKey2020".into(),
                    public_key_jwk: json!({"kty": "EC"}),
                    purposes: Some(vec!["authentication".into(), "assertionMethod".into()]),
                },
                PublicKeyEntry {
                    id: "agreement".into(),
                    key_type: "JsonWebKey2020".into(),
                    public_key_jwk: json!({"kty": "OKP"}),
                    purposes: Some(vec!["keyAgreement".into()]),
                },
            ],
            vec![ServiceEntry {
                id: "hub".into(),
                service_type: "IdentityHub".into(),
                service_endpoint: json!("https://hub.example.com"),
            }],
        );

        let result = project("did:strand:EiAtest", &state);
        let doc = result.did_document.unwrap();
        assert_eq!(doc["id"], "did:strand:EiAtest");
        assert_eq!(doc["verificationMethod"][0]["id"], "#signing");
        assert_eq!(doc["verificationMethod"][0]["controller"], "did:strand:EiAtest");
        assert_eq!(doc["authentication"], json!(["#signing"]));
        assert_eq!(doc["assertionMethod"], json!(["#signing"]));
        assert_eq!(doc["keyAgreement"], json!(["#agreement"]));
        assert!(doc.get("capabilityInvocation").is_none());
        assert_eq!(doc["service"][0]["id"], "#hub");
        assert_eq!(result.did_document_metadata.method.unwrap().update_commitment.as_deref(), Some("uc"));
    }

    #[test]
    fn key_without_purposes_is_method_only() {
        let state = state_with(
            vec![PublicKeyEntry {
                id: "bare".into(),
                key_type: "JsonWebKey2020".into(),
                public_key_jwk: json!({"kty": "EC"}),
                purposes: None,
            }],
            vec![],
        );
        let doc = project("did:strand:EiAtest", &state).did_document.unwrap();
        assert_eq!(doc["verificationMethod"][0]["id"], "#bare");
        assert!(doc.get("authentication").is_none());
        assert!(doc.get("service").is_none());
    }

    #[test]
    fn deactivated_state_has_marker_and_no_document() {
        let state = DidState {
            document: DocumentState::default(),
            next_recovery_commitment: None,
            next_update_commitment: None,
            last_operation_transaction_number: 7,
        };
        let result = project("did:strand:EiAgone", &state);
        assert!(result.did_document.is_none());
        assert_eq!(result.did_document_metadata.deactivated, Some(true));
        let serialized = serde_json::to_value(&result).unwrap();
        assert!(serialized.get("didDocument").is_none());
        assert_eq!(serialized["didDocumentMetadata"]["deactivated"], json!(true));
    }
}
