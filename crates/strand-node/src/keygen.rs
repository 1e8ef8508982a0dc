//! strand-keygen: mint the key material for a new DID.
//!
//! Prints a recovery keypair, an update keypair, and the commitments a
//! create operation needs, as JSON on stdout. Secret scalars are printed
//! hex-encoded; keep them offline.

use clap::Parser;
use k256::ecdsa::SigningKey;

use strand_crypto::{multihash, EcdsaKeyPair};

#[derive(Parser, Debug)]
#[command(name = "strand-keygen", version, about = "Generate DID controller keys")]
struct Args {
    /// Emit compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let recovery = EcdsaKeyPair::generate();
    let update = EcdsaKeyPair::generate();

    let output = serde_json::json!({
        "recovery": keypair_json(&recovery)?,
        "update": keypair_json(&update)?,
    });
    if args.compact {
        println!("{output}");
    } else {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn keypair_json(keypair: &EcdsaKeyPair) -> anyhow::Result<serde_json::Value> {
    let jwk = keypair.public_jwk();
    let secret: &SigningKey = keypair.signing_key();
    Ok(serde_json::json!({
        "publicKeyJwk": jwk,
        "commitment": multihash::commitment(&jwk)?,
        "secretKeyHex": hex::encode(secret.to_bytes()),
    }))
}
