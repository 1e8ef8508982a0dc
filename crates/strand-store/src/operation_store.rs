use async_trait::async_trait;

use strand_core::traits::OperationStore;
use strand_core::{AnchoredOperation, DidSuffix, StrandError};

// ── SledOperationStore ───────────────────────────────────────────────────────

/// Anchored operations in one sled tree:
///
///   operations — (suffix ‖ 0x00 ‖ txn_be ‖ index_be) → bincode(AnchoredOperation)
///
/// The compound key makes `get` a prefix scan that yields operations already
/// in (transactionNumber, operationIndex) order; suffixes are base64url so
/// the 0x00 separator can never occur inside one.
pub struct SledOperationStore {
    operations: sled::Tree,
}

impl SledOperationStore {
    pub fn open(db: &sled::Db) -> Result<Self, StrandError> {
        let operations =
            db.open_tree("operations").map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(Self { operations })
    }

    fn key(suffix: &DidSuffix, transaction_number: u64, operation_index: u32) -> Vec<u8> {
        let suffix_bytes = suffix.as_str().as_bytes();
        let mut key = Vec::with_capacity(suffix_bytes.len() + 1 + 8 + 4);
        key.extend_from_slice(suffix_bytes);
        key.push(0);
        key.extend_from_slice(&transaction_number.to_be_bytes());
        key.extend_from_slice(&operation_index.to_be_bytes());
        key
    }

    fn prefix(suffix: &DidSuffix) -> Vec<u8> {
        let mut prefix = suffix.as_str().as_bytes().to_vec();
        prefix.push(0);
        prefix
    }

    pub fn count(&self) -> u64 {
        self.operations.len() as u64
    }
}

#[async_trait]
impl OperationStore for SledOperationStore {
    async fn insert_many(&self, operations: Vec<AnchoredOperation>) -> Result<(), StrandError> {
        let mut batch = sled::Batch::default();
        for op in &operations {
            let key = Self::key(&op.did_suffix, op.transaction_number, op.operation_index);
            let value =
                bincode::serialize(op).map_err(|e| StrandError::Serialization(e.to_string()))?;
            // Idempotent on the compound key: a re-processed transaction
            // writes identical values over identical keys.
            batch.insert(key, value);
        }
        self.operations.apply_batch(batch).map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, suffix: &DidSuffix) -> Result<Vec<AnchoredOperation>, StrandError> {
        let mut out = Vec::new();
        for item in self.operations.scan_prefix(Self::prefix(suffix)) {
            let (_, bytes) = item.map_err(|e| StrandError::Storage(e.to_string()))?;
            let op: AnchoredOperation = bincode::deserialize(&bytes)
                .map_err(|e| StrandError::Serialization(e.to_string()))?;
            out.push(op);
        }
        Ok(out)
    }

    async fn delete_greater_than(&self, transaction_number: u64) -> Result<(), StrandError> {
        let mut batch = sled::Batch::default();
        for item in self.operations.iter() {
            let (key, bytes) = item.map_err(|e| StrandError::Storage(e.to_string()))?;
            let op: AnchoredOperation = bincode::deserialize(&bytes)
                .map_err(|e| StrandError::Serialization(e.to_string()))?;
            if op.transaction_number > transaction_number {
                batch.remove(key);
            }
        }
        // One atomic batch: readers never observe a partial rewind.
        self.operations.apply_batch(batch).map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::OperationType;

    fn temp_db(name: &str) -> sled::Db {
        let dir = std::env::temp_dir().join(format!("strand_opstore_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        sled::open(&dir).expect("open temp db")
    }

    fn op(suffix: &str, txn: u64, index: u32) -> AnchoredOperation {
        AnchoredOperation {
            did_suffix: DidSuffix::new(suffix),
            operation_type: OperationType::Update,
            operation_buffer: format!("{{\"txn\":{txn}}}").into_bytes(),
            transaction_number: txn,
            transaction_time: txn,
            operation_index: index,
        }
    }

    #[tokio::test]
    async fn get_returns_ledger_order() {
        let db = temp_db("order");
        let store = SledOperationStore::open(&db).unwrap();
        store
            .insert_many(vec![op("EiA", 9, 0), op("EiA", 2, 5), op("EiA", 2, 1), op("EiB", 1, 0)])
            .await
            .unwrap();

        let ops = store.get(&DidSuffix::new("EiA")).await.unwrap();
        let keys: Vec<_> = ops.iter().map(|o| o.order_key()).collect();
        assert_eq!(keys, vec![(2, 1), (2, 5), (9, 0)]);
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let db = temp_db("idempotent");
        let store = SledOperationStore::open(&db).unwrap();
        let operation = op("EiA", 3, 0);
        store.insert_many(vec![operation.clone()]).await.unwrap();
        store.insert_many(vec![operation.clone()]).await.unwrap();
        assert_eq!(store.get(&DidSuffix::new("EiA")).await.unwrap(), vec![operation]);
    }

    #[tokio::test]
    async fn suffix_prefix_does_not_leak() {
        // "EiA" must not match operations of "EiAB".
        let db = temp_db("prefix");
        let store = SledOperationStore::open(&db).unwrap();
        store.insert_many(vec![op("EiA", 1, 0), op("EiAB", 2, 0)]).await.unwrap();
        let ops = store.get(&DidSuffix::new("EiA")).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].transaction_number, 1);
    }

    #[tokio::test]
    async fn delete_greater_than_rewinds() {
        let db = temp_db("rewind");
        let store = SledOperationStore::open(&db).unwrap();
        store
            .insert_many(vec![op("EiA", 40, 0), op("EiA", 50, 0), op("EiA", 51, 0), op("EiB", 60, 0)])
            .await
            .unwrap();

        store.delete_greater_than(50).await.unwrap();

        let a = store.get(&DidSuffix::new("EiA")).await.unwrap();
        assert_eq!(a.iter().map(|o| o.transaction_number).collect::<Vec<_>>(), vec![40, 50]);
        assert!(store.get(&DidSuffix::new("EiB")).await.unwrap().is_empty());
    }
}
