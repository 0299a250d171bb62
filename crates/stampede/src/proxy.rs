//! Composable backend proxies: wrappers `CacheRegion::wrap` layers in
//! front of the region's current backend, intercepting some subset of its
//! operations.

use std::sync::Arc;

use async_trait::async_trait;
use stampede_core::{CacheBackend, ProxyBackend, RegionMutex, Result};

/// A proxy that forwards every operation to its inner backend unchanged.
///
/// Useful as a base to build other proxies on (override only the methods
/// you need to intercept) and as the trivial case exercised by tests.
pub struct PassthroughProxy<B: CacheBackend> {
    inner: Arc<B>,
}

impl<B: CacheBackend> PassthroughProxy<B> {
    pub fn wrapping(inner: Arc<B>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: CacheBackend> CacheBackend for PassthroughProxy<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn get_multi(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.inner.get_multi(keys).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn set_multi(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        self.inner.set_multi(entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn delete_multi(&self, keys: &[String]) -> Result<()> {
        self.inner.delete_multi(keys).await
    }

    async fn get_mutex(&self, key: &str) -> Option<Arc<dyn RegionMutex>> {
        self.inner.get_mutex(key).await
    }

    fn key_mangler(&self, key: &str) -> String {
        self.inner.key_mangler(key)
    }
}

impl<B: CacheBackend> ProxyBackend for PassthroughProxy<B> {
    type Inner = B;

    fn proxied(&self) -> &Arc<B> {
        &self.inner
    }
}
