//! A minimal in-memory [`CacheBackend`] for tests and examples.
//!
//! This is deliberately not a production backend: no TTL eviction loop, no
//! capacity bound, no tagging index. It stores exactly the bytes the
//! region's wire pipeline hands it and gives them back unchanged, which is
//! all any of the dogpile-lock test scenarios need. Reach for a real
//! backend (Redis, a file store, ...) in production.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use stampede_core::{CacheBackend, Result};

/// `Clone` creates a new handle to the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }
}
