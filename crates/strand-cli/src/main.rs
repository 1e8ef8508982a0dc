//! strand-cli
//!
//! Controller-side CLI for Strand DIDs. Manages the secp256k1 key chain,
//! builds and signs operations, and submits them to a running node via
//! JSON-RPC.
//!
//! Usage:
//!   strand-cli keygen      [--keyfile <path>]
//!   strand-cli create      [--service <id=url>] [--rpc <url>] [--keyfile <path>]
//!   strand-cli add-key     --id <key-id> [--purpose <p>...] [--rpc <url>]
//!   strand-cli remove-key  --id <key-id> [--rpc <url>]
//!   strand-cli recover     [--rpc <url>] [--keyfile <path>]
//!   strand-cli deactivate  [--rpc <url>] [--keyfile <path>]
//!   strand-cli resolve     --did <did> [--rpc <url>]
//!   strand-cli status      [--rpc <url>]

mod keyfile;
mod requests;
mod rpc_client;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use strand_crypto::EcdsaKeyPair;
use strand_ops::{DocumentContent, Patch, PublicKeyEntry, ServiceEntry};

use crate::keyfile::Keyfile;
use crate::rpc_client::NodeRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "strand-cli",
    version,
    about = "Strand controller CLI — build, sign, and submit DID operations"
)]
struct Args {
    /// Path to the controller keyfile (JSON).
    #[arg(long, global = true, default_value = "~/.strand/did.json")]
    keyfile: PathBuf,

    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:3000")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh recovery/update key chain and save it to the keyfile.
    Keygen,

    /// Build and submit a create operation from the keyfile's keys.
    Create {
        /// Initial signing key id placed in the document.
        #[arg(long, default_value = "key-1")]
        key_id: String,
        /// Optional services as `id=endpoint` pairs.
        #[arg(long, value_delimiter = ',')]
        service: Vec<String>,
    },

    /// Add a verification key to the document (rotates the update key).
    AddKey {
        #[arg(long)]
        id: String,
        /// Verification relationships for the key.
        #[arg(long, default_values_t = vec!["authentication".to_string()])]
        purpose: Vec<String>,
    },

    /// Remove a verification key from the document (rotates the update key).
    RemoveKey {
        #[arg(long)]
        id: String,
    },

    /// Recover the DID: replace the document and rotate both key chains.
    Recover {
        /// Signing key id placed in the replacement document.
        #[arg(long, default_value = "key-1")]
        key_id: String,
    },

    /// Deactivate the DID permanently.
    Deactivate,

    /// Resolve any DID through the node.
    Resolve {
        #[arg(long)]
        did: String,
    },

    /// Print the node's observer cursor and queue depth.
    Status,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let keyfile_path = expand_tilde(&args.keyfile);
    let client = NodeRpcClient::new(&args.rpc);

    match args.command {
        Command::Keygen => {
            if keyfile_path.exists() {
                bail!("refusing to overwrite existing keyfile {}", keyfile_path.display());
            }
            let keyfile = Keyfile::generate();
            keyfile.save(&keyfile_path)?;
            println!("wrote {}", keyfile_path.display());
        }

        Command::Create { key_id, service } => {
            let mut keyfile = Keyfile::load(&keyfile_path)?;
            if keyfile.did_suffix.is_some() {
                bail!("keyfile already holds a DID — use a fresh keyfile per DID");
            }
            let document = DocumentContent {
                public_keys: Some(vec![signing_key_entry(
                    &key_id,
                    &keyfile.update_keypair()?,
                )]),
                services: parse_services(&service)?,
            };
            let built = requests::build_create(
                document,
                &keyfile.recovery_keypair()?,
                &keyfile.update_keypair()?,
            )?;
            let receipt = client.submit_operation(built.body).await?;

            keyfile.did_suffix = Some(built.did_suffix);
            keyfile.long_form_did = Some(built.long_form_did.clone());
            keyfile.save(&keyfile_path)?;

            println!("{}", serde_json::to_string_pretty(&receipt)?);
            println!("long-form DID (usable immediately): {}", built.long_form_did);
        }

        Command::AddKey { id, purpose } => {
            let patch = Patch::AddPublicKeys {
                public_keys: vec![PublicKeyEntry {
                    id,
                    key_type: "EcdsaSecp256k1VerificationKey2019".into(),
                    public_key_jwk: serde_json::to_value(EcdsaKeyPair::generate().public_jwk())
                        .context("encoding fresh key")?,
                    purposes: Some(purpose),
                }],
            };
            submit_update(&client, &keyfile_path, patch).await?;
        }

        Command::RemoveKey { id } => {
            submit_update(&client, &keyfile_path, Patch::RemovePublicKeys { ids: vec![id] })
                .await?;
        }

        Command::Recover { key_id } => {
            let mut keyfile = Keyfile::load(&keyfile_path)?;
            let suffix = keyfile.require_suffix()?.to_string();

            let next_recovery = EcdsaKeyPair::generate();
            let next_update = EcdsaKeyPair::generate();
            let document = DocumentContent {
                public_keys: Some(vec![signing_key_entry(&key_id, &next_update)]),
                services: None,
            };
            let body = requests::build_recover(
                &suffix,
                document,
                &keyfile.recovery_keypair()?,
                &next_recovery,
                &next_update,
            )?;
            let receipt = client.submit_operation(body).await?;

            keyfile.recovery_secret_hex = hex::encode(next_recovery.signing_key().to_bytes());
            keyfile.update_secret_hex = hex::encode(next_update.signing_key().to_bytes());
            keyfile.save(&keyfile_path)?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Command::Deactivate => {
            let keyfile = Keyfile::load(&keyfile_path)?;
            let suffix = keyfile.require_suffix()?;
            let body = requests::build_deactivate(suffix, &keyfile.recovery_keypair()?)?;
            let receipt = client.submit_operation(body).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Command::Resolve { did } => match client.resolve(&did).await? {
            Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
            None => println!("not found"),
        },

        Command::Status => {
            let status = client.node_status().await?;
            let version = client.version().await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "status": status,
                "version": version,
            }))?);
        }
    }

    Ok(())
}

/// Build an update with one patch, rotating the update key and persisting
/// the new secret on success.
async fn submit_update(
    client: &NodeRpcClient,
    keyfile_path: &std::path::Path,
    patch: Patch,
) -> anyhow::Result<()> {
    let mut keyfile = Keyfile::load(keyfile_path)?;
    let suffix = keyfile.require_suffix()?.to_string();

    let next_update = EcdsaKeyPair::generate();
    let body = requests::build_update(
        &suffix,
        vec![patch],
        &keyfile.update_keypair()?,
        &next_update,
    )?;
    let receipt = client.submit_operation(body).await?;

    keyfile.update_secret_hex = hex::encode(next_update.signing_key().to_bytes());
    keyfile.save(keyfile_path)?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

/// The document entry for a signing key derived from an update keypair.
fn signing_key_entry(id: &str, keypair: &EcdsaKeyPair) -> PublicKeyEntry {
    PublicKeyEntry {
        id: id.to_string(),
        key_type: "EcdsaSecp256k1VerificationKey2019".into(),
        public_key_jwk: serde_json::to_value(keypair.public_jwk())
            .expect("jwk serializes"),
        purposes: Some(vec!["authentication".into(), "assertionMethod".into()]),
    }
}

/// Parse `id=endpoint` pairs into service entries.
fn parse_services(pairs: &[String]) -> anyhow::Result<Option<Vec<ServiceEntry>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut services = Vec::new();
    for pair in pairs {
        let Some((id, endpoint)) = pair.split_once('=') else {
            bail!("service must be id=endpoint, got {pair:?}");
        };
        services.push(ServiceEntry {
            id: id.to_string(),
            service_type: "LinkedDomains".into(),
            service_endpoint: serde_json::Value::String(endpoint.to_string()),
        });
    }
    Ok(Some(services))
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
