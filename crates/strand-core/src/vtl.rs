use crate::error::StrandError;
use crate::params::ProtocolParameters;
use crate::types::{TransactionTime, ValueTimeLock};

// ── Value-time-lock arithmetic ───────────────────────────────────────────────

/// Batch capacity bought by a lock:
/// `floor(amountLocked / (normalizedFee × feeMultiplier × lockMultiplier))`,
/// clamped to the hard per-batch cap. No lock buys the lock-free cap.
pub fn max_operations_allowed(
    lock: Option<&ValueTimeLock>,
    normalized_fee: u64,
    params: &ProtocolParameters,
) -> usize {
    let Some(lock) = lock else {
        return params.max_operations_per_batch_without_lock;
    };
    let unit_price = normalized_fee as f64
        * params.normalized_fee_multiplier
        * params.value_time_lock_amount_multiplier;
    if unit_price <= 0.0 {
        return params.max_operations_per_batch;
    }
    let allowed = (lock.amount_locked as f64 / unit_price).floor() as usize;
    // A lock smaller than the lock-free allowance never penalizes a writer.
    allowed
        .max(params.max_operations_per_batch_without_lock)
        .min(params.max_operations_per_batch)
}

/// Verify a lock entitles `writer` to anchor `actual_operations` at
/// `transaction_time`. A violation voids the transaction's whole write
/// budget: every operation in it becomes ineffective.
pub fn verify_lock_for_transaction(
    lock: Option<&ValueTimeLock>,
    writer: &str,
    transaction_time: TransactionTime,
    normalized_fee: u64,
    actual_operations: usize,
    params: &ProtocolParameters,
) -> Result<(), StrandError> {
    if let Some(lock) = lock {
        if lock.owner != writer {
            return Err(StrandError::MalformedInput {
                context: "value time lock",
                detail: format!("lock owner {} is not transaction writer {writer}", lock.owner),
            });
        }
        if transaction_time < lock.lock_transaction_time
            || transaction_time >= lock.unlock_transaction_time
        {
            return Err(StrandError::MalformedInput {
                context: "value time lock",
                detail: format!(
                    "transaction time {transaction_time} outside lock window [{}, {})",
                    lock.lock_transaction_time, lock.unlock_transaction_time
                ),
            });
        }
    }
    let allowed = max_operations_allowed(lock, normalized_fee, params);
    if actual_operations > allowed {
        return Err(StrandError::SizeExceeded {
            context: "batch operations under value time lock",
            size: actual_operations,
            max: allowed,
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProtocolParameters {
        ProtocolParameters {
            max_operations_per_batch: 10_000,
            max_operations_per_batch_without_lock: 100,
            normalized_fee_multiplier: 1.0,
            value_time_lock_amount_multiplier: 600.0,
            ..Default::default()
        }
    }

    fn lock(amount: u64, from: u64, until: u64) -> ValueTimeLock {
        ValueTimeLock {
            identifier: "lock-1".into(),
            owner: "writer-1".into(),
            amount_locked: amount,
            lock_transaction_time: from,
            unlock_transaction_time: until,
            normalized_fee: 10,
        }
    }

    #[test]
    fn no_lock_means_lock_free_cap() {
        assert_eq!(max_operations_allowed(None, 10, &params()), 100);
    }

    #[test]
    fn lock_size_buys_capacity() {
        // 6_000_000 / (10 × 1.0 × 600) = 1000 operations.
        let l = lock(6_000_000, 0, 100);
        assert_eq!(max_operations_allowed(Some(&l), 10, &params()), 1_000);
    }

    #[test]
    fn capacity_clamped_to_protocol_cap() {
        let l = lock(u64::MAX, 0, 100);
        assert_eq!(max_operations_allowed(Some(&l), 10, &params()), 10_000);
    }

    #[test]
    fn tiny_lock_never_below_lock_free_cap() {
        let l = lock(6, 0, 100);
        assert_eq!(max_operations_allowed(Some(&l), 10, &params()), 100);
    }

    #[test]
    fn wrong_owner_rejected() {
        let l = lock(6_000_000, 0, 100);
        let err = verify_lock_for_transaction(Some(&l), "someone-else", 50, 10, 5, &params());
        assert!(err.is_err());
    }

    #[test]
    fn window_boundaries() {
        let l = lock(6_000_000, 10, 20);
        let check = |time| verify_lock_for_transaction(Some(&l), "writer-1", time, 10, 5, &params());
        assert!(check(9).is_err());
        assert!(check(10).is_ok());
        assert!(check(19).is_ok());
        assert!(check(20).is_err());
    }

    #[test]
    fn operation_count_over_budget_rejected() {
        let l = lock(6_000_000, 0, 100); // 1000 ops
        assert!(verify_lock_for_transaction(Some(&l), "writer-1", 50, 10, 1_000, &params()).is_ok());
        assert!(matches!(
            verify_lock_for_transaction(Some(&l), "writer-1", 50, 10, 1_001, &params()),
            Err(StrandError::SizeExceeded { .. })
        ));
    }

    #[test]
    fn no_lock_budget_enforced() {
        assert!(verify_lock_for_transaction(None, "writer-1", 50, 10, 100, &params()).is_ok());
        assert!(verify_lock_for_transaction(None, "writer-1", 50, 10, 101, &params()).is_err());
    }
}
