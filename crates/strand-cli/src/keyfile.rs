use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use strand_crypto::EcdsaKeyPair;

// ── Keyfile ──────────────────────────────────────────────────────────────────

/// Controller state for one DID: the current recovery and update secrets,
/// and the DID suffix once a create has been built.
///
/// Secret scalars are stored hex-encoded. Keep the file out of shared
/// directories.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyfile {
    pub recovery_secret_hex: String,
    pub update_secret_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_form_did: Option<String>,
}

impl Keyfile {
    /// Mint fresh recovery and update keys.
    pub fn generate() -> Self {
        Self {
            recovery_secret_hex: secret_hex(&EcdsaKeyPair::generate()),
            update_secret_hex: secret_hex(&EcdsaKeyPair::generate()),
            did_suffix: None,
            long_form_did: None,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading keyfile {}", path.display()))?;
        serde_json::from_str(&json).context("parsing keyfile JSON")
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing keyfile")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    pub fn recovery_keypair(&self) -> anyhow::Result<EcdsaKeyPair> {
        keypair_from_hex(&self.recovery_secret_hex).context("recovery key in keyfile")
    }

    pub fn update_keypair(&self) -> anyhow::Result<EcdsaKeyPair> {
        keypair_from_hex(&self.update_secret_hex).context("update key in keyfile")
    }

    /// The suffix recorded by a prior `create`, required by every later
    /// operation.
    pub fn require_suffix(&self) -> anyhow::Result<&str> {
        match &self.did_suffix {
            Some(suffix) => Ok(suffix),
            None => bail!("keyfile has no DID yet — run `strand-cli create` first"),
        }
    }
}

fn secret_hex(keypair: &EcdsaKeyPair) -> String {
    hex::encode(keypair.signing_key().to_bytes())
}

fn keypair_from_hex(secret_hex: &str) -> anyhow::Result<EcdsaKeyPair> {
    let bytes = hex::decode(secret_hex).context("decoding secret hex")?;
    EcdsaKeyPair::from_secret_bytes(&bytes).map_err(|e| anyhow::anyhow!("{e}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_keys() {
        let dir = std::env::temp_dir().join("strand_cli_keyfile_test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("did.json");

        let mut keyfile = Keyfile::generate();
        keyfile.did_suffix = Some("EiAexample".into());
        keyfile.save(&path).unwrap();

        let loaded = Keyfile::load(&path).unwrap();
        assert_eq!(loaded.recovery_secret_hex, keyfile.recovery_secret_hex);
        assert_eq!(
            loaded.update_keypair().unwrap().public_jwk(),
            keyfile.update_keypair().unwrap().public_jwk()
        );
        assert_eq!(loaded.require_suffix().unwrap(), "EiAexample");
    }

    #[test]
    fn missing_suffix_is_a_clear_error() {
        let keyfile = Keyfile::generate();
        assert!(keyfile.require_suffix().is_err());
    }
}
