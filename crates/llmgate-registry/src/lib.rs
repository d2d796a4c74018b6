//! Caches resolved Model handles by `provider/model` key with TTL expiry and
//! LRU eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use llmgate_adapter::{Adapter, ProviderConfig};
use llmgate_credential::CredentialStore;
use llmgate_types::{ErrorKind, GatewayError, GenerationConfig, ModelId};

/// A resolved, ready-to-use model: owns its ProviderConfig, a reference to
/// its Credential Store, an Adapter, and the merged default GenerationConfig.
pub struct ModelHandle {
    pub id: ModelId,
    pub adapter: Arc<dyn Adapter>,
    pub credential_store: Arc<CredentialStore>,
    pub provider_cfg: Arc<ProviderConfig>,
    pub default_config: GenerationConfig,
}

/// Resolves a `ModelId` into its components on a cache miss. Supplied by the
/// caller, who owns provider-config loading (out of scope here).
pub trait ModelFactory: Send + Sync {
    fn create(&self, id: &ModelId) -> Result<ModelHandle, GatewayError>;
}

struct CacheEntry {
    handle: Arc<ModelHandle>,
    created_at: Instant,
    last_used: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    pub ttl: Duration,
    pub max_cache_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_cache_size: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub size: usize,
    pub max_cache_size: usize,
    pub ttl: Duration,
    pub keys: Vec<String>,
}

pub struct ModelRegistry<F: ModelFactory> {
    factory: F,
    config: RegistryConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl<F: ModelFactory> ModelRegistry<F> {
    pub fn new(factory: F, config: RegistryConfig) -> Self {
        Self {
            factory,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `raw` (a `provider/model` string) to a cached or freshly
    /// built handle.
    pub async fn lookup(&self, raw: &str) -> Result<Arc<ModelHandle>, GatewayError> {
        let id = ModelId::parse(raw)
            .map_err(|e| GatewayError::new(ErrorKind::ModelNotFound, e.to_string()))?;
        let key = id.to_string();

        let mut cache = self.cache.lock().await;
        let now = Instant::now();

        if let Some(entry) = cache.get_mut(&key)
            && now.duration_since(entry.created_at) < self.config.ttl
        {
            entry.last_used = now;
            return Ok(entry.handle.clone());
        }

        // Miss or expired: rebuild.
        cache.remove(&key);
        let handle = Arc::new(self.factory.create(&id)?);
        self.evict_if_needed(&mut cache);
        cache.insert(
            key,
            CacheEntry {
                handle: handle.clone(),
                created_at: now,
                last_used: now,
            },
        );
        Ok(handle)
    }

    fn evict_if_needed(&self, cache: &mut HashMap<String, CacheEntry>) {
        if cache.len() < self.config.max_cache_size {
            return;
        }
        if let Some(oldest_key) = cache
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(k, _)| k.clone())
        {
            debug!(key = %oldest_key, "evicting least-recently-used model handle");
            cache.remove(&oldest_key);
        }
    }

    /// Drops every cached entry. In-flight requests already holding a
    /// cloned `Arc<ModelHandle>` are unaffected and run to completion.
    pub async fn flush(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn stats(&self) -> RegistryStats {
        let cache = self.cache.lock().await;
        RegistryStats {
            size: cache.len(),
            max_cache_size: self.config.max_cache_size,
            ttl: self.config.ttl,
            keys: cache.keys().cloned().collect(),
        }
    }
}
