use serde::{Deserialize, Serialize};

use crate::constants::MULTIHASH_SHA256_CODE;
use crate::error::StrandError;
use crate::types::TransactionTime;

// ── ProtocolParameters ────────────────────────────────────────────────────────

/// All tunable protocol limits for one generation.
///
/// Every component that enforces a bound takes these by reference; there is
/// no global lookup. Sizes are decompressed byte counts unless stated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProtocolParameters {
    /// Multihash codes accepted when *verifying* a stored commitment.
    /// New commitments must always use SHA-256 regardless of this list.
    pub hash_algorithms_in_multihash_code: Vec<u64>,
    /// Maximum encoded size of one operation request.
    pub max_operation_size: usize,
    /// Maximum encoded size of one delta.
    pub max_delta_size: usize,
    /// Hard per-batch operation cap.
    pub max_operations_per_batch: usize,
    /// Per-batch cap for a writer with no value-time-lock.
    pub max_operations_per_batch_without_lock: usize,
    /// Maximum length of a writer lock id carried in the core index file.
    pub max_writer_lock_id_size: usize,
    pub max_core_index_file_size: usize,
    pub max_proof_file_size: usize,
    pub max_provisional_index_file_size: usize,
    pub max_chunk_file_size: usize,
    /// Download-manager concurrency bound.
    pub max_concurrent_downloads: usize,
    /// Fee multiplier applied to the normalized fee when sizing a lock.
    pub normalized_fee_multiplier: f64,
    /// Lock multiplier: how many fee-units one locked unit entitles per op.
    pub value_time_lock_amount_multiplier: f64,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            hash_algorithms_in_multihash_code: vec![MULTIHASH_SHA256_CODE],
            max_operation_size: 2_500,
            max_delta_size: 1_000,
            max_operations_per_batch: 10_000,
            max_operations_per_batch_without_lock: 100,
            max_writer_lock_id_size: 50,
            max_core_index_file_size: 1_000_000,
            max_proof_file_size: 2_500_000,
            max_provisional_index_file_size: 1_000_000,
            max_chunk_file_size: 10_000_000,
            max_concurrent_downloads: 20,
            normalized_fee_multiplier: 1.0,
            value_time_lock_amount_multiplier: 600.0,
        }
    }
}

// ── ProtocolVersioning ────────────────────────────────────────────────────────

/// One protocol generation: parameters active from a starting ledger time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProtocolVersion {
    pub starting_transaction_time: TransactionTime,
    pub parameters: ProtocolParameters,
}

/// The full generation table, selected by transaction time.
///
/// Loadable from JSON at node start; a single-generation table starting at
/// time 0 is the default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersioning {
    versions: Vec<ProtocolVersion>,
}

impl ProtocolVersioning {
    /// Build a table from explicit versions. Versions must be supplied in
    /// ascending `starting_transaction_time` order and must cover time 0.
    pub fn new(versions: Vec<ProtocolVersion>) -> Result<Self, StrandError> {
        if versions.first().map(|v| v.starting_transaction_time) != Some(0) {
            return Err(StrandError::MalformedInput {
                context: "protocol versioning",
                detail: "first version must start at transaction time 0".into(),
            });
        }
        let ascending = versions
            .windows(2)
            .all(|w| w[0].starting_transaction_time < w[1].starting_transaction_time);
        if !ascending {
            return Err(StrandError::MalformedInput {
                context: "protocol versioning",
                detail: "versions must be in ascending starting time order".into(),
            });
        }
        Ok(Self { versions })
    }

    /// A single default generation active from time 0.
    pub fn single(parameters: ProtocolParameters) -> Self {
        Self {
            versions: vec![ProtocolVersion { starting_transaction_time: 0, parameters }],
        }
    }

    /// The parameters in force at `transaction_time`.
    pub fn parameters_at(&self, transaction_time: TransactionTime) -> &ProtocolParameters {
        let idx = self
            .versions
            .partition_point(|v| v.starting_transaction_time <= transaction_time);
        // new() guarantees a version at time 0, so idx >= 1.
        &self.versions[idx - 1].parameters
    }
}

impl Default for ProtocolVersioning {
    fn default() -> Self {
        Self::single(ProtocolParameters::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
