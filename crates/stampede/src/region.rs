//! The cache region: the public surface wiring the mutex registry, the
//! dogpile lock, and the wire-format pipeline into a single facade over a
//! [`CacheBackend`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stampede_core::{
    decode as envelope_decode, encode as envelope_encode, CacheBackend, CacheError, CacheMetrics,
    CacheReturn, DefaultInvalidator, Envelope, JsonSerializer, NoopMetrics, ProxyBackend,
    RegionInvalidator, RegionMutex, Result, Serializer,
};

use crate::dogpile::{self, GetValueOutcome, Spawner, ValueGenerator, ValueSource};
use crate::registry::NameRegistry;

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Per-call override of a region's default expiration.
///
/// Replaces the Python original's `expiration_time = -1` sentinel (meaning
/// "no expiration for this call only") with an explicit enum — `-1` isn't
/// a meaningful `Duration` and doesn't need to be invented as one here.
#[derive(Debug, Clone, Copy, Default)]
pub enum ExpirationOverride {
    #[default]
    UseRegionDefault,
    Override(Duration),
    Disabled,
}

/// A region-supplied function consulted on every call instead of a fixed
/// expiration `Duration`.
pub type ExpirationTimeProvider = Arc<dyn Fn() -> Option<Duration> + Send + Sync>;

/// Key transform applied before a key reaches the backend.
pub type KeyMangler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Configuration applied at `configure` time.
#[derive(Clone, Default)]
pub struct RegionConfig {
    pub expiration_time: Option<Duration>,
    pub expiration_provider: Option<ExpirationTimeProvider>,
    pub key_mangler: Option<KeyMangler>,
    pub async_creation_runner: Option<Spawner>,
    pub invalidator: Option<Arc<dyn RegionInvalidator>>,
}

impl RegionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expiration_time(mut self, ttl: Duration) -> Self {
        self.expiration_time = Some(ttl);
        self
    }

    pub fn with_expiration_provider(mut self, provider: ExpirationTimeProvider) -> Self {
        self.expiration_provider = Some(provider);
        self
    }

    pub fn with_key_mangler(mut self, mangler: KeyMangler) -> Self {
        self.key_mangler = Some(mangler);
        self
    }

    pub fn with_async_creation_runner(mut self, runner: Spawner) -> Self {
        self.async_creation_runner = Some(runner);
        self
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn RegionInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    fn resolve_expiration(&self, override_: ExpirationOverride) -> Option<Duration> {
        match override_ {
            ExpirationOverride::Disabled => None,
            ExpirationOverride::Override(d) => Some(d),
            ExpirationOverride::UseRegionDefault => match &self.expiration_provider {
                Some(provider) => provider(),
                None => self.expiration_time,
            },
        }
    }
}

struct RegionState<B, S, M> {
    backend: Arc<B>,
    serializer: Arc<S>,
    metrics: Arc<M>,
    invalidator: Arc<dyn RegionInvalidator>,
    mutex_registry: Arc<NameRegistry>,
    config: RegionConfig,
}

/// Read the current state for `key` and classify it for the dogpile lock,
/// applying schema-version checks, the invalidation barrier, and
/// expiration. Drives `get_or_create`/`get_or_create_multi`, which may
/// serve a stale value while regenerating — see [`read_for_get`] for the
/// non-regenerating read path's classification.
async fn read_outcome<B, S, M, T>(
    state: &RegionState<B, S, M>,
    key: &str,
    expiration: Option<Duration>,
) -> Result<GetValueOutcome<T>>
where
    B: CacheBackend,
    S: Serializer,
    M: CacheMetrics,
    T: DeserializeOwned + Send + Sync + 'static,
{
    let raw = match state.backend.get(key).await? {
        Some(raw) => raw,
        None => {
            state.metrics.record_miss(key);
            return Ok(GetValueOutcome::Regenerate);
        }
    };

    let envelope: Envelope<T> = match envelope_decode(&*state.serializer, &raw)? {
        Some(env) => env,
        None => {
            state.metrics.record_miss(key);
            return Ok(GetValueOutcome::Regenerate);
        }
    };

    if state.invalidator.is_hard_invalidated(envelope.metadata.ct) {
        state.metrics.record_miss(key);
        return Ok(GetValueOutcome::Regenerate);
    }

    let soft_invalidated = state.invalidator.is_soft_invalidated(envelope.metadata.ct);
    if soft_invalidated && expiration.is_none() {
        return Err(CacheError::SoftInvalidationNeedsExpiration);
    }

    let now = now_unix();
    let is_expired = expiration
        .map(|ttl| envelope.age_secs(now) >= ttl.as_secs_f64())
        .unwrap_or(false);

    if is_expired || soft_invalidated {
        state.metrics.record_stale_serve(key);
        Ok(GetValueOutcome::Stale(envelope))
    } else {
        state.metrics.record_hit(key);
        Ok(GetValueOutcome::Fresh(envelope))
    }
}

fn outcome_into_return<T>(outcome: GetValueOutcome<T>) -> CacheReturn<T> {
    match outcome {
        GetValueOutcome::Fresh(env) | GetValueOutcome::Stale(env) => CacheReturn::Value(env),
        GetValueOutcome::Regenerate => CacheReturn::NoValue,
    }
}

/// Read a value for a non-regenerating call (`get`/`get_multi`/
/// `get_value_metadata`). Unlike [`read_outcome`] — which drives the
/// dogpile lock and so distinguishes "stale, serve while someone
/// regenerates" from "must regenerate" — a plain read never regenerates,
/// so staleness and invalidation both just mean "no value": there is no
/// refresh for a precondition like `SoftInvalidationNeedsExpiration` to
/// guard, and an expired value is not a hit.
async fn read_for_get<B, S, M, T>(
    state: &RegionState<B, S, M>,
    key: &str,
    expiration: Option<Duration>,
    ignore_expiration: bool,
) -> Result<Option<Envelope<T>>>
where
    B: CacheBackend,
    S: Serializer,
    M: CacheMetrics,
    T: DeserializeOwned + Send + Sync + 'static,
{
    let raw = match state.backend.get(key).await? {
        Some(raw) => raw,
        None => {
            state.metrics.record_miss(key);
            return Ok(None);
        }
    };

    let envelope: Envelope<T> = match envelope_decode(&*state.serializer, &raw)? {
        Some(env) => env,
        None => {
            state.metrics.record_miss(key);
            return Ok(None);
        }
    };

    if ignore_expiration {
        state.metrics.record_hit(key);
        return Ok(Some(envelope));
    }

    if state.invalidator.is_hard_invalidated(envelope.metadata.ct)
        || state.invalidator.is_soft_invalidated(envelope.metadata.ct)
    {
        state.metrics.record_miss(key);
        return Ok(None);
    }

    let now = now_unix();
    let is_expired = expiration
        .map(|ttl| envelope.age_secs(now) >= ttl.as_secs_f64())
        .unwrap_or(false);

    if is_expired {
        state.metrics.record_miss(key);
        Ok(None)
    } else {
        state.metrics.record_hit(key);
        Ok(Some(envelope))
    }
}

/// Wires [`read_outcome`] into the [`ValueSource`] shape the dogpile lock
/// expects.
struct BackendSource<B, S, M> {
    key: String,
    expiration: Option<Duration>,
    state: Arc<RegionState<B, S, M>>,
}

#[async_trait]
impl<B, S, M, T> ValueSource<T> for BackendSource<B, S, M>
where
    B: CacheBackend,
    S: Serializer,
    M: CacheMetrics,
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn get_value(&self) -> Result<GetValueOutcome<T>> {
        read_outcome(&self.state, &self.key, self.expiration).await
    }
}

/// Wires a user-supplied creator closure into the [`ValueGenerator`] shape
/// the dogpile lock expects, writing the result back through the wire
/// pipeline unless `should_cache` vetoes it.
struct BackendGenerator<B, S, M, T, F> {
    key: String,
    state: Arc<RegionState<B, S, M>>,
    creator: F,
    should_cache: Option<Box<dyn Fn(&T) -> bool + Send>>,
}

#[async_trait]
impl<B, S, M, T, F, Fut> ValueGenerator<T> for BackendGenerator<B, S, M, T, F>
where
    B: CacheBackend,
    S: Serializer,
    M: CacheMetrics,
    T: Serialize + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
{
    async fn generate(self: Box<Self>) -> Result<Envelope<T>> {
        let start = Instant::now();
        let result = (self.creator)().await;
        self.state
            .metrics
            .record_regenerate(&self.key, start.elapsed(), result.is_ok());
        let payload = result?;

        let envelope = Envelope::wrap(payload, now_unix());
        let should_write = self
            .should_cache
            .as_ref()
            .map(|f| f(&envelope.payload))
            .unwrap_or(true);

        if should_write {
            let bytes = envelope_encode(&*self.state.serializer, &envelope)?;
            self.state.backend.set(&self.key, bytes).await?;
        }

        Ok(envelope)
    }
}

/// Drop guard releasing any mutexes acquired by `get_or_create_multi` that
/// weren't explicitly released on the normal exit path — covers
/// panic-unwind and early-return-via-`?` without requiring `async Drop`.
struct MultiMutexGuard {
    mutexes: Vec<Arc<dyn RegionMutex>>,
}

impl MultiMutexGuard {
    fn new(mutexes: Vec<Arc<dyn RegionMutex>>) -> Self {
        Self { mutexes }
    }

    async fn release_all(mut self) {
        let mutexes = std::mem::take(&mut self.mutexes);
        for mutex in mutexes {
            mutex.release().await;
        }
    }
}

impl Drop for MultiMutexGuard {
    fn drop(&mut self) {
        if self.mutexes.is_empty() {
            return;
        }
        let mutexes = std::mem::take(&mut self.mutexes);
        tokio::spawn(async move {
            for mutex in mutexes {
                mutex.release().await;
            }
        });
    }
}

/// A cache region: the pluggable-backend facade coordinating value
/// regeneration via the dogpile lock.
///
/// `CacheRegion::new()` is inert — it holds no backend and every
/// operation on it returns [`CacheError::RegionNotConfigured`] — until
/// [`CacheRegion::configure`] (or
/// [`CacheRegion::configure_with_serializer_and_metrics`]) is called.
pub struct CacheRegion<B, S = JsonSerializer, M = NoopMetrics>
where
    B: CacheBackend,
    S: Serializer,
    M: CacheMetrics,
{
    state: RwLock<Option<Arc<RegionState<B, S, M>>>>,
    root_backend: RwLock<Option<Arc<dyn CacheBackend>>>,
}

impl<B: CacheBackend> CacheRegion<B, JsonSerializer, NoopMetrics> {
    /// An inert region using the default JSON serializer and no metrics.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            root_backend: RwLock::new(None),
        }
    }

    /// Configure with the default serializer/metrics.
    pub fn configure(&self, backend: B, config: RegionConfig) -> Result<()> {
        self.configure_impl(backend, JsonSerializer, NoopMetrics, config, false)
    }
}

impl<B: CacheBackend> Default for CacheRegion<B, JsonSerializer, NoopMetrics> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, S, M> CacheRegion<B, S, M>
where
    B: CacheBackend,
    S: Serializer,
    M: CacheMetrics,
{
    /// An inert region using a custom serializer and metrics collector.
    pub fn new_with_serializer_and_metrics() -> Self {
        Self {
            state: RwLock::new(None),
            root_backend: RwLock::new(None),
        }
    }

    pub fn configure_with_serializer_and_metrics(
        &self,
        backend: B,
        serializer: S,
        metrics: M,
        config: RegionConfig,
    ) -> Result<()> {
        self.configure_impl(backend, serializer, metrics, config, false)
    }

    /// Re-`configure` a region that already has a backend, replacing it.
    pub fn configure_replacing_backend(
        &self,
        backend: B,
        serializer: S,
        metrics: M,
        config: RegionConfig,
    ) -> Result<()> {
        self.configure_impl(backend, serializer, metrics, config, true)
    }

    fn configure_impl(
        &self,
        backend: B,
        serializer: S,
        metrics: M,
        config: RegionConfig,
        replace_existing_backend: bool,
    ) -> Result<()> {
        let mut guard = self.state.write();
        if guard.is_some() && !replace_existing_backend {
            return Err(CacheError::RegionAlreadyConfigured);
        }

        let backend = Arc::new(backend);
        let erased: Arc<dyn CacheBackend> = backend.clone();
        *self.root_backend.write() = Some(erased);

        let invalidator = config
            .invalidator
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultInvalidator::new()));

        *guard = Some(Arc::new(RegionState {
            backend,
            serializer: Arc::new(serializer),
            metrics: Arc::new(metrics),
            invalidator,
            mutex_registry: Arc::new(NameRegistry::new()),
            config,
        }));
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.state.read().is_some()
    }

    fn snapshot(&self) -> Result<Arc<RegionState<B, S, M>>> {
        self.state
            .read()
            .clone()
            .ok_or(CacheError::RegionNotConfigured)
    }

    fn full_key(&self, state: &RegionState<B, S, M>, key: &str) -> String {
        match &state.config.key_mangler {
            Some(mangler) => mangler(key),
            None => state.backend.key_mangler(key),
        }
    }

    /// Read a value without attempting regeneration. A key with no usable
    /// value — absent, schema-mismatched, hard- or soft-invalidated, or
    /// expired — reads as [`CacheReturn::NoValue`]; only
    /// [`CacheRegion::get_or_create`] regenerates.
    ///
    /// `expiration_time` overrides the region's configured expiration for
    /// this call only (`None` uses the region default). `ignore_expiration`
    /// bypasses the freshness and invalidation checks entirely, returning
    /// whatever is stored as long as it decodes.
    pub async fn get<T>(
        &self,
        key: &str,
        expiration_time: Option<Duration>,
        ignore_expiration: bool,
    ) -> Result<CacheReturn<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let state = self.snapshot()?;
        let mangled = self.full_key(&state, key);
        let expiration = expiration_time
            .or_else(|| state.config.resolve_expiration(ExpirationOverride::UseRegionDefault));
        let value = read_for_get(&state, &mangled, expiration, ignore_expiration).await?;
        Ok(match value {
            Some(env) => CacheReturn::Value(env),
            None => CacheReturn::NoValue,
        })
    }

    /// Like [`CacheRegion::get`] but returns the full envelope, so callers
    /// can inspect `ct`/age instead of just the payload.
    pub async fn get_value_metadata<T>(
        &self,
        key: &str,
        expiration_time: Option<Duration>,
        ignore_expiration: bool,
    ) -> Result<Option<Envelope<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        match self.get::<T>(key, expiration_time, ignore_expiration).await? {
            CacheReturn::Value(env) => Ok(Some(env)),
            CacheReturn::NoValue => Ok(None),
        }
    }

    pub async fn get_multi<T>(
        &self,
        keys: &[String],
        expiration_time: Option<Duration>,
        ignore_expiration: bool,
    ) -> Result<Vec<CacheReturn<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.snapshot()?;
        let expiration = expiration_time
            .or_else(|| state.config.resolve_expiration(ExpirationOverride::UseRegionDefault));

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let mangled = self.full_key(&state, key);
            let value = read_for_get(&state, &mangled, expiration, ignore_expiration).await?;
            out.push(match value {
                Some(env) => CacheReturn::Value(env),
                None => CacheReturn::NoValue,
            });
        }
        Ok(out)
    }

    pub async fn set<T>(&self, key: &str, value: T) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let state = self.snapshot()?;
        let mangled = self.full_key(&state, key);
        let envelope = Envelope::wrap(value, now_unix());
        let bytes = envelope_encode(&*state.serializer, &envelope)?;
        state.backend.set(&mangled, bytes).await
    }

    pub async fn set_multi<T>(&self, entries: &[(String, T)]) -> Result<()>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        if entries.is_empty() {
            return Ok(());
        }
        let state = self.snapshot()?;
        let now = now_unix();
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let mangled = self.full_key(&state, key);
            let envelope = Envelope::wrap(value.clone(), now);
            let bytes = envelope_encode(&*state.serializer, &envelope)?;
            encoded.push((mangled, bytes));
        }
        state.backend.set_multi(&encoded).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let state = self.snapshot()?;
        let mangled = self.full_key(&state, key);
        state.backend.delete(&mangled).await
    }

    pub async fn delete_multi(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let state = self.snapshot()?;
        let mangled: Vec<String> = keys.iter().map(|k| self.full_key(&state, k)).collect();
        state.backend.delete_multi(&mangled).await
    }

    /// Move the region's invalidation barrier to now, in `hard` or `soft`
    /// mode. See [`RegionInvalidator`] for the distinction.
    pub fn invalidate(&self, hard: bool) -> Result<()> {
        let state = self.snapshot()?;
        state.invalidator.invalidate(hard, now_unix());
        state.metrics.record_invalidate(hard);
        Ok(())
    }

    /// Whether this region believes `key`'s mutex is currently held.
    ///
    /// Reflects only what this region's own mutex registry has observed;
    /// a backend-supplied distributed mutex may be held by another
    /// process without this region knowing.
    pub fn key_is_locked(&self, key: &str) -> Result<bool> {
        let state = self.snapshot()?;
        let mangled = self.full_key(&state, key);
        Ok(state.mutex_registry.is_locked(&mangled))
    }

    /// The original backend passed to `configure`, independent of how many
    /// proxies [`CacheRegion::wrap`] has since layered in front of it.
    pub fn actual_backend(&self) -> Result<Arc<dyn CacheBackend>> {
        self.root_backend
            .read()
            .clone()
            .ok_or(CacheError::RegionNotConfigured)
    }

    /// Get a value, regenerating it via `creator` if it's missing or
    /// expired, coordinating concurrent callers through the dogpile lock.
    pub async fn get_or_create<T, F, Fut>(
        &self,
        key: &str,
        creator: F,
        expiration: ExpirationOverride,
        should_cache: Option<Box<dyn Fn(&T) -> bool + Send>>,
    ) -> Result<CacheReturn<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = self.snapshot()?;
        let mangled = self.full_key(&state, key);
        let expiration_dur = state.config.resolve_expiration(expiration);
        let spawner = state.config.async_creation_runner.clone();

        let backend_mutex = state.backend.get_mutex(&mangled).await;
        let mutex = state.mutex_registry.mutex_for(&mangled, backend_mutex);

        let source = BackendSource {
            key: mangled.clone(),
            expiration: expiration_dur,
            state: state.clone(),
        };

        let make_generator = move || -> Box<dyn ValueGenerator<T>> {
            Box::new(BackendGenerator {
                key: mangled,
                state,
                creator,
                should_cache,
            })
        };

        dogpile::get_or_create(mutex, &source, make_generator, spawner.as_ref()).await
    }

    /// Get several values at once, regenerating the missing/expired subset
    /// through a single batched `creator` call.
    ///
    /// Mutexes for keys needing regeneration are acquired in sorted-key
    /// order (never blocking — a key whose mutex is already held is
    /// served its stale value, or [`CacheReturn::NoValue`] if it has none)
    /// to avoid the cross-call deadlock a fixed acquisition order would
    /// otherwise risk; this is a deliberate simplification of the
    /// single-key protocol, which blocks, for the batched case (see
    /// `DESIGN.md`).
    pub async fn get_or_create_multi<T, F, Fut>(
        &self,
        keys: &[String],
        expiration: ExpirationOverride,
        creator: F,
    ) -> Result<Vec<CacheReturn<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(Vec<String>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<T>>> + Send,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.snapshot()?;
        let expiration_dur = state.config.resolve_expiration(expiration);
        let mangled: Vec<String> = keys.iter().map(|k| self.full_key(&state, k)).collect();

        let mut outcomes: Vec<GetValueOutcome<T>> = Vec::with_capacity(mangled.len());
        for key in &mangled {
            outcomes.push(read_outcome(&state, key, expiration_dur).await?);
        }

        let mut sorted_unique = mangled.clone();
        sorted_unique.sort();
        sorted_unique.dedup();

        let mut acquired: HashMap<String, Arc<dyn RegionMutex>> = HashMap::new();
        let mut winners_mangled: Vec<String> = Vec::new();
        for key in &sorted_unique {
            let idx = mangled.iter().position(|k| k == key).unwrap();
            if matches!(outcomes[idx], GetValueOutcome::Fresh(_)) {
                continue;
            }
            let backend_mutex = state.backend.get_mutex(key).await;
            let mutex = state.mutex_registry.mutex_for(key, backend_mutex);
            if mutex.try_acquire().await {
                acquired.insert(key.clone(), mutex);
                winners_mangled.push(key.clone());
            }
        }

        let guard = MultiMutexGuard::new(acquired.values().cloned().collect());

        if winners_mangled.is_empty() {
            guard.release_all().await;
            return Ok(outcomes.into_iter().map(outcome_into_return).collect());
        }

        let winners_original: Vec<String> = winners_mangled
            .iter()
            .map(|mk| {
                let idx = mangled.iter().position(|k| k == mk).unwrap();
                keys[idx].clone()
            })
            .collect();

        let start = Instant::now();
        let result = creator(winners_original).await;
        for mkey in &winners_mangled {
            state
                .metrics
                .record_regenerate(mkey, start.elapsed(), result.is_ok());
        }

        let values = match result {
            Ok(values) if values.len() == winners_mangled.len() => values,
            Ok(_) => {
                guard.release_all().await;
                return Err(CacheError::Creator(
                    "creator returned a different number of values than keys".into(),
                ));
            }
            Err(err) => {
                guard.release_all().await;
                return Err(err);
            }
        };

        let now = now_unix();
        for (mkey, value) in winners_mangled.iter().zip(values.into_iter()) {
            let envelope = Envelope::wrap(value, now);
            let bytes = envelope_encode(&*state.serializer, &envelope)?;
            state.backend.set(mkey, bytes).await?;
            let idx = mangled.iter().position(|k| k == mkey).unwrap();
            outcomes[idx] = GetValueOutcome::Fresh(envelope);
        }
        guard.release_all().await;

        Ok(outcomes.into_iter().map(outcome_into_return).collect())
    }

    /// Layer a proxy in front of the region's current backend.
    ///
    /// Returns a *new* region rather than mutating `self`: a generic
    /// struct can't change its own `B` type parameter in place the way
    /// the Python original reassigns `self.backend`. [`actual_backend`]
    /// on the returned region still resolves to the original bottom
    /// backend, not the proxy.
    pub fn wrap<P>(&self, make_proxy: impl FnOnce(Arc<B>) -> P) -> Result<CacheRegion<P, S, M>>
    where
        P: ProxyBackend<Inner = B>,
        S: Clone,
        M: Clone,
    {
        let state = self.snapshot()?;
        let proxy = make_proxy(state.backend.clone());

        let new_region = CacheRegion::<P, S, M>::new_with_serializer_and_metrics();
        new_region.configure_with_serializer_and_metrics(
            proxy,
            (*state.serializer).clone(),
            (*state.metrics).clone(),
            state.config.clone(),
        )?;
        *new_region.root_backend.write() = self.root_backend.read().clone();

        Ok(new_region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stampede_memory::MemoryBackend;

    #[tokio::test]
    async fn inert_region_errors_before_configure() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        assert!(!region.is_configured());
        let result = region.get::<i32>("key", None, false).await;
        assert!(matches!(result, Err(CacheError::RegionNotConfigured)));
    }

    #[tokio::test]
    async fn reconfigure_without_replace_flag_errors() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        region
            .configure(MemoryBackend::new(), RegionConfig::new())
            .unwrap();

        let result = region.configure(MemoryBackend::new(), RegionConfig::new());
        assert!(matches!(result, Err(CacheError::RegionAlreadyConfigured)));
    }

    #[tokio::test]
    async fn cold_miss_then_get_or_create_populates_and_hits() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        region
            .configure(MemoryBackend::new(), RegionConfig::new())
            .unwrap();

        assert!(region
            .get::<i32>("key", None, false)
            .await
            .unwrap()
            .is_no_value());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = region
            .get_or_create(
                "key",
                move || {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(42i32)
                    }
                },
                ExpirationOverride::UseRegionDefault,
                None,
            )
            .await
            .unwrap();

        assert!(matches!(result, CacheReturn::Value(env) if env.payload == 42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let warm = region.get::<i32>("key", None, false).await.unwrap();
        assert!(matches!(warm, CacheReturn::Value(env) if env.payload == 42));
    }

    #[tokio::test]
    async fn hard_invalidate_forces_regeneration() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        region
            .configure(MemoryBackend::new(), RegionConfig::new())
            .unwrap();

        region
            .get_or_create(
                "key",
                || async { Ok(1i32) },
                ExpirationOverride::UseRegionDefault,
                None,
            )
            .await
            .unwrap();

        region.invalidate(true).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = region
            .get_or_create(
                "key",
                move || {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(2i32)
                    }
                },
                ExpirationOverride::UseRegionDefault,
                None,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, CacheReturn::Value(env) if env.payload == 2));
    }

    #[tokio::test]
    async fn multi_empty_input_short_circuits() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        region
            .configure(MemoryBackend::new(), RegionConfig::new())
            .unwrap();

        let result: Vec<CacheReturn<i32>> = region.get_multi(&[], None, false).await.unwrap();
        assert!(result.is_empty());

        let created: Vec<CacheReturn<i32>> = region
            .get_or_create_multi(&[], ExpirationOverride::UseRegionDefault, |_keys| async {
                Ok(Vec::new())
            })
            .await
            .unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn get_or_create_multi_batches_missing_keys() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        region
            .configure(MemoryBackend::new(), RegionConfig::new())
            .unwrap();

        region.set("a", 1i32).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let batch_calls = Arc::new(AtomicUsize::new(0));
        let batch_calls_clone = batch_calls.clone();

        let results = region
            .get_or_create_multi(&keys, ExpirationOverride::UseRegionDefault, move |missing| {
                let batch_calls = batch_calls_clone.clone();
                async move {
                    batch_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(missing.into_iter().map(|_| 99i32).collect())
                }
            })
            .await
            .unwrap();

        assert_eq!(batch_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(&results[0], CacheReturn::Value(env) if env.payload == 1));
        assert!(matches!(&results[1], CacheReturn::Value(env) if env.payload == 99));
        assert!(matches!(&results[2], CacheReturn::Value(env) if env.payload == 99));
    }

    #[tokio::test]
    async fn actual_backend_survives_wrap() {
        let region: CacheRegion<MemoryBackend> = CacheRegion::new();
        region
            .configure(MemoryBackend::new(), RegionConfig::new())
            .unwrap();

        let root = region.actual_backend().unwrap();

        let wrapped = region
            .wrap(crate::proxy::PassthroughProxy::wrapping)
            .unwrap();

        wrapped.set("key", 1i32).await.unwrap();
        let read = wrapped.get::<i32>("key", None, false).await.unwrap();
        assert!(matches!(read, CacheReturn::Value(env) if env.payload == 1));

        let wrapped_root = wrapped.actual_backend().unwrap();
        assert!(Arc::ptr_eq(&root, &wrapped_root));
    }
}
