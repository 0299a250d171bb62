//! Cache backend contract

use crate::error::Result;
use crate::traits::mutex::RegionMutex;
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait every storage backend implements.
///
/// A backend is treated as fully opaque byte storage: it knows nothing
/// about envelopes, schema versions, or invalidation. It stores whatever
/// bytes the region's serializer pipeline hands it and gives them back
/// unchanged. No assumption is made about durability, ordering, or
/// atomicity beyond each method signature; absence of a key is not an
/// error.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Fetch the raw bytes stored for `key`, or `None` if there are none.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch multiple keys at once. Default implementation calls
    /// [`get`](CacheBackend::get) sequentially; backends capable of a
    /// real batch round trip should override this.
    async fn get_multi(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    /// Store raw bytes for `key`, overwriting whatever was there.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Store multiple entries at once. Default implementation calls
    /// [`set`](CacheBackend::set) sequentially.
    async fn set_multi(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value.clone()).await?;
        }
        Ok(())
    }

    /// Remove `key`. Removing a key that isn't present is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove multiple keys at once. Default implementation calls
    /// [`delete`](CacheBackend::delete) sequentially.
    async fn delete_multi(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Return this backend's mutex for `key`, if it can supply one (for
    /// example a distributed lock backed by the same store). Returning
    /// `None` tells the region to fall back to a process-local mutex for
    /// this key.
    async fn get_mutex(&self, _key: &str) -> Option<Arc<dyn RegionMutex>> {
        None
    }

    /// Transform a logical key before it reaches storage (prefixing,
    /// hashing, length-limiting). The default is the identity function.
    fn key_mangler(&self, key: &str) -> String {
        key.to_string()
    }
}

/// A backend that wraps another backend, intercepting some subset of its
/// operations (logging, metrics, compression, retries...).
///
/// `CacheRegion::wrap` takes a constructor for a `ProxyBackend` and
/// layers it in front of the region's current backend. `proxied()` is
/// what lets a caller walk back down to the backend a particular proxy
/// wraps.
pub trait ProxyBackend: CacheBackend {
    type Inner: CacheBackend;

    fn proxied(&self) -> &Arc<Self::Inner>;
}
