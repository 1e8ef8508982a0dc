//! ─── Strand Protocol Constants ──────────────────────────────────────────────
//!
//! Values that are fixed for every protocol generation. Anything that may
//! change across generations lives in `params::ProtocolParameters` instead.

/// DID method name: DIDs render as `did:strand:<suffix>`.
pub const DID_METHOD_NAME: &str = "strand";

/// First byte of the on-ledger anchor payload (protocol generation marker).
pub const ANCHOR_PAYLOAD_PREFIX: u8 = 0x01;

/// Multihash code for SHA-256, the only algorithm new commitments may use.
pub const MULTIHASH_SHA256_CODE: u64 = 0x12;

/// Digest length for SHA-256 multihashes.
pub const MULTIHASH_SHA256_LENGTH: u8 = 0x20;

/// Maximum base64url length of a key or service id inside a patch.
pub const MAX_ID_LENGTH: usize = 50;

/// Maximum length of a service `type` string.
pub const MAX_SERVICE_TYPE_LENGTH: usize = 30;

/// The closed set of verification relationships a public key may declare.
pub const PUBLIC_KEY_PURPOSES: [&str; 5] = [
    "authentication",
    "assertionMethod",
    "keyAgreement",
    "capabilityInvocation",
    "capabilityDelegation",
];
