use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrandError {
    // ── Schema / validation errors ───────────────────────────────────────────
    #[error("malformed {context}: {detail}")]
    MalformedInput { context: &'static str, detail: String },

    #[error("unknown property in {context}")]
    UnknownProperty { context: &'static str },

    #[error("{context} exceeds maximum size: {size} > {max}")]
    SizeExceeded { context: &'static str, size: usize, max: usize },

    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),

    #[error("multihash algorithm {code:#x} not supported (allowed: {allowed:?})")]
    UnsupportedHashAlgorithm { code: u64, allowed: Vec<u64> },

    #[error("invalid base64url string in {0}")]
    InvalidBase64Url(&'static str),

    #[error("DID {0} referenced more than once in one file")]
    DuplicateDidReference(String),

    #[error("unknown patch action: {0}")]
    UnknownPatchAction(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("proof file entries do not match index file references: {0}")]
    ProofReferenceMismatch(String),

    // ── Cryptographic errors ─────────────────────────────────────────────────
    #[error("JWS signature verification failed")]
    SignatureInvalid,

    #[error("JWS protected header invalid: {0}")]
    JwsHeaderInvalid(String),

    #[error("reveal value does not hash to the stored commitment")]
    CommitmentMismatch,

    #[error("delta hash does not match the signed delta hash")]
    DeltaHashMismatch,

    #[error("new commitment must differ from the commitment it reveals")]
    CommitmentReused,

    // ── Resource errors ──────────────────────────────────────────────────────
    #[error("content not found: {0}")]
    ContentNotFound(String),

    #[error("content at {uri} exceeds maximum decompressed size {max}")]
    ContentTooLarge { uri: String, max: usize },

    #[error("ledger cursor (transaction number and time hash) is no longer valid")]
    CursorInvalid,

    // ── Operational errors ───────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("content store error: {0}")]
    ContentStore(String),

    #[error("request timed out: {0}")]
    Timeout(&'static str),

    #[error("batch writer has no operations eligible for anchoring")]
    NothingToAnchor,

    #[error("operation for DID {0} is already queued")]
    OperationAlreadyQueued(String),

    #[error("{0}")]
    Other(String),
}

impl StrandError {
    /// Schema-level failures make a whole transaction ineffective-but-processed
    /// rather than retried. Resource and transport failures are the
    /// retryable class.
    pub fn is_retryable_fetch_failure(&self) -> bool {
        matches!(
            self,
            StrandError::ContentNotFound(_)
                | StrandError::ContentStore(_)
                | StrandError::Ledger(_)
                | StrandError::Timeout(_)
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
