use async_trait::async_trait;

use strand_core::traits::{CasFetchResult, ContentAddressableStore};
use strand_core::StrandError;
use strand_crypto::multihash;

// ── SledContentStore ─────────────────────────────────────────────────────────

/// Content-addressable blob store in one sled tree:
///
///   content — uri utf8 bytes → raw bytes
///
/// URIs are the base64url SHA-256 multihash of the content, computed on
/// write, so a fetched blob can always be re-verified against its name.
pub struct SledContentStore {
    content: sled::Tree,
}

impl SledContentStore {
    pub fn open(db: &sled::Db) -> Result<Self, StrandError> {
        let content = db.open_tree("content").map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(Self { content })
    }

    pub fn count(&self) -> u64 {
        self.content.len() as u64
    }
}

#[async_trait]
impl ContentAddressableStore for SledContentStore {
    async fn read(&self, uri: &str, max_size: usize) -> Result<CasFetchResult, StrandError> {
        match self.content.get(uri.as_bytes()).map_err(|e| StrandError::Storage(e.to_string()))? {
            Some(bytes) if bytes.len() > max_size => Ok(CasFetchResult::TooLarge),
            Some(bytes) => Ok(CasFetchResult::Found(bytes.to_vec())),
            None => Ok(CasFetchResult::NotFound),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<String, StrandError> {
        let uri = multihash::hash_then_encode(bytes);
        self.content
            .insert(uri.as_bytes(), bytes)
            .map_err(|e| StrandError::Storage(e.to_string()))?;
        Ok(uri)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SledContentStore {
        let dir = std::env::temp_dir().join(format!("strand_cas_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = sled::open(&dir).expect("open temp db");
        SledContentStore::open(&db).unwrap()
    }

    #[tokio::test]
    async fn write_then_read_by_multihash_uri() {
        let store = temp_store("rw");
        let uri = store.write(b"file bytes").await.unwrap();
        assert_eq!(uri, multihash::hash_then_encode(b"file bytes"));
        assert_eq!(
            store.read(&uri, 1_024).await.unwrap(),
            CasFetchResult::Found(b"file bytes".to_vec())
        );
    }

    #[tokio::test]
    async fn missing_uri_is_not_found() {
        let store = temp_store("missing");
        let uri = multihash::hash_then_encode(b"never written");
        assert_eq!(store.read(&uri, 1_024).await.unwrap(), CasFetchResult::NotFound);
    }

    #[tokio::test]
    async fn oversized_content_reported_not_returned() {
        let store = temp_store("toolarge");
        let uri = store.write(&[0u8; 100]).await.unwrap();
        assert_eq!(store.read(&uri, 99).await.unwrap(), CasFetchResult::TooLarge);
        assert!(matches!(store.read(&uri, 100).await.unwrap(), CasFetchResult::Found(_)));
    }

    #[tokio::test]
    async fn write_is_idempotent() {
        let store = temp_store("idem");
        let a = store.write(b"same").await.unwrap();
        let b = store.write(b"same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.count(), 1);
    }
}
