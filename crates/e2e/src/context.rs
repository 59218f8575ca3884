//! Per-worker runtime context shared by fixtures and page objects

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use blogsuite_common::{open_store, CacheStore, SuiteConfig};

use crate::error::E2eResult;
use crate::page_cache::UrlCache;

/// Everything a test run shares: configuration, the persistent fixture
/// cache store, and this worker's page URL cache.
pub struct SuiteContext {
    config: SuiteConfig,
    use_cache: AtomicBool,
    store: Arc<dyn CacheStore>,
    urls: Arc<UrlCache>,
}

impl SuiteContext {
    pub fn new(config: SuiteConfig, store: Arc<dyn CacheStore>) -> Arc<Self> {
        let use_cache = AtomicBool::new(config.use_cache);
        Arc::new(Self {
            config,
            use_cache,
            store,
            urls: Arc::new(UrlCache::new()),
        })
    }

    /// Build a context with the store selected by the configuration
    pub fn open(config: SuiteConfig) -> E2eResult<Arc<Self>> {
        let store = open_store(&config)?;
        info!(
            "Suite context ready (worker: {}, fixture cache: {})",
            config.worker_id,
            if config.use_cache { "on" } else { "off" }
        );
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Current value of the caching flag
    pub fn use_cache(&self) -> bool {
        self.use_cache.load(Ordering::SeqCst)
    }

    pub fn set_use_cache(&self, enabled: bool) {
        self.use_cache.store(enabled, Ordering::SeqCst);
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn urls(&self) -> &Arc<UrlCache> {
        &self.urls
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }
}
