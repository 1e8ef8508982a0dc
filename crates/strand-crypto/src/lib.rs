pub mod canonicalizer;
pub mod encoder;
pub mod jws;
pub mod keypair;
pub mod multihash;

pub use canonicalizer::canonicalize;
pub use jws::{sign_compact_jws, verify_compact_jws, PublicKeyJwk};
pub use keypair::EcdsaKeyPair;
pub use multihash::{commitment, hash_then_encode, verify_reveal, Multihash};
