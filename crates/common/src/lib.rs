//! Blogsuite Common Library
//!
//! Shared pieces of the blog UI test suite: API models and their registry,
//! fixture cache keys, persistent cache stores, and suite configuration.

pub mod config;
pub mod error;
pub mod key;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::{BrowserConfig, BrowserName, CacheBackend, SuiteConfig};
pub use error::{CacheError, Error, Result};
pub use key::{slugify, CacheKey, FixtureId};
pub use models::{ApiModel, DynModel, Field, Mapping, ModelRegistry};
pub use store::{open_store, CacheStore, FileCacheStore, MemoryCacheStore, SqliteCacheStore};

/// Blogsuite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default config file path
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("blogsuite.toml")
}
