use serde::{Deserialize, Serialize};

use strand_ops::{DocumentContent, PublicKeyEntry, ServiceEntry};

// ── DocumentState ────────────────────────────────────────────────────────────

/// The internal document: key and service records keyed by id, insertion
/// order preserved for projection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    pub public_keys: Vec<PublicKeyEntry>,
    pub services: Vec<ServiceEntry>,
}

impl DocumentState {
    /// Replace the whole document with the content of a `replace` patch.
    pub fn replace_with(&mut self, content: &DocumentContent) {
        self.public_keys = content.public_keys.clone().unwrap_or_default();
        self.services = content.services.clone().unwrap_or_default();
    }

    /// Insert keys; an existing id is overwritten in place, keeping its
    /// position.
    pub fn add_public_keys(&mut self, keys: &[PublicKeyEntry]) {
        for key in keys {
            match self.public_keys.iter_mut().find(|k| k.id == key.id) {
                Some(existing) => *existing = key.clone(),
                None => self.public_keys.push(key.clone()),
            }
        }
    }

    /// Remove keys by id; unknown ids are ignored.
    pub fn remove_public_keys(&mut self, ids: &[String]) {
        self.public_keys.retain(|k| !ids.contains(&k.id));
    }

    pub fn add_services(&mut self, services: &[ServiceEntry]) {
        for service in services {
            match self.services.iter_mut().find(|s| s.id == service.id) {
                Some(existing) => *existing = service.clone(),
                None => self.services.push(service.clone()),
            }
        }
    }

    pub fn remove_services(&mut self, ids: &[String]) {
        self.services.retain(|s| !ids.contains(&s.id));
    }

    pub fn is_empty(&self) -> bool {
        self.public_keys.is_empty() && self.services.is_empty()
    }
}

// ── DidState ─────────────────────────────────────────────────────────────────

/// The resolved state of one DID after folding its operation stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidState {
    pub document: DocumentState,
    /// Commitment the next recover or deactivate must reveal against.
    /// `None` once deactivated (the terminal state).
    pub next_recovery_commitment: Option<String>,
    /// Commitment the next update must reveal against. `None` while updates
    /// are blocked (create or recover without a usable delta, or after
    /// deactivation).
    pub next_update_commitment: Option<String>,
    pub last_operation_transaction_number: u64,
}

impl DidState {
    pub fn is_deactivated(&self) -> bool {
        self.next_recovery_commitment.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
