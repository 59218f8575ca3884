//! Fixture cache commands

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use blogsuite_common::{open_store, CacheKey, CacheStore, SuiteConfig};
use blogsuite_e2e::{CacheEntry, OpenApiCodec};

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached entries
    List(EntryFilter),

    /// Print one cached value
    Show {
        /// Full cache key
        key: String,
    },

    /// Remove one cached value
    Remove {
        /// Full cache key
        key: String,
    },

    /// Remove cached values, optionally only those matching a filter
    Clear(EntryFilter),

    /// Decode every tagged entry and report the ones that no longer load
    Verify(EntryFilter),

    /// Print the key a fixture result is stored under for this configuration
    Key {
        /// Qualified fixture name (`module.name`)
        #[arg(long)]
        fixture: String,

        /// Fixture parameter
        #[arg(long)]
        param: Option<String>,
    },
}

/// Restrict a command to one environment and/or worker
#[derive(Args, Debug, Clone, Default)]
pub struct EntryFilter {
    /// Slugified environment address
    #[arg(long)]
    pub environment: Option<String>,

    /// Worker id (`master`, `gw0`, ...)
    #[arg(long)]
    pub worker: Option<String>,
}

impl EntryFilter {
    fn matches(&self, key: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        let Ok(key) = CacheKey::parse(key) else {
            return false;
        };
        self.environment.as_deref().map_or(true, |e| e == key.environment)
            && self.worker.as_deref().map_or(true, |w| w == key.worker_id)
    }

    fn is_empty(&self) -> bool {
        self.environment.is_none() && self.worker.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct EntryDisplay {
    pub key: String,
    pub environment: String,
    pub worker: String,
    pub name: String,
    pub response_type: Option<String>,
    pub size: usize,
}

impl TableDisplay for EntryDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Key", "Environment", "Worker", "Name", "Type", "Size"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.environment.clone(),
            self.worker.clone(),
            self.name.clone(),
            self.response_type.clone().unwrap_or_else(|| "-".to_string()),
            format_size(self.size),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyFailure {
    pub key: String,
    pub error: String,
}

impl TableDisplay for VerifyFailure {
    fn headers() -> Vec<&'static str> {
        vec!["Key", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.key.clone(), self.error.clone()]
    }
}

/// Run a cache command. Returns `false` when the command found problems.
pub fn execute(cmd: CacheCommands, config: &SuiteConfig, format: OutputFormat) -> Result<bool> {
    match cmd {
        CacheCommands::List(filter) => {
            let entries = list_entries(open(config)?.as_ref(), &filter)?;
            output::print_list(&entries, format);
        }
        CacheCommands::Show { key } => {
            let value = open(config)?
                .get(&key)?
                .with_context(|| format!("No cached value under {}", key))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        CacheCommands::Remove { key } => {
            if open(config)?.remove(&key)? {
                output::print_success(&format!("Removed {}", key));
            } else {
                output::print_warning(&format!("No cached value under {}", key));
            }
        }
        CacheCommands::Clear(filter) => {
            let removed = clear_entries(open(config)?.as_ref(), &filter)?;
            output::print_success(&format!("Removed {} cached value(s)", removed));
        }
        CacheCommands::Verify(filter) => {
            let failures = verify_entries(open(config)?.as_ref(), &OpenApiCodec::blog(), &filter)?;
            if !failures.is_empty() {
                output::print_list(&failures, format);
                output::print_error(&format!("{} cached entries failed to decode", failures.len()));
                return Ok(false);
            }
            output::print_success("All cached entries decode");
        }
        CacheCommands::Key { fixture, param } => {
            println!("{}", fixture_key(config, &fixture, param.as_deref())?);
        }
    }

    Ok(true)
}

fn open(config: &SuiteConfig) -> Result<Arc<dyn CacheStore>> {
    debug!(backend = ?config.cache_backend, dir = %config.cache_dir.display(), "Opening fixture cache");
    open_store(config)
        .with_context(|| format!("Failed to open cache at {}", config.cache_dir.display()))
}

/// Key of a fixture result under the configured environment and worker
pub fn fixture_key(config: &SuiteConfig, fixture: &str, param: Option<&str>) -> Result<CacheKey> {
    match fixture.rsplit_once('.') {
        Some((module, name)) if !module.is_empty() && !name.is_empty() => {}
        _ => bail!("Fixture must be given as module.name, got '{}'", fixture),
    }
    let name = match param {
        Some(param) => format!("{}.{}", fixture, param),
        None => fixture.to_string(),
    };
    Ok(CacheKey::named(&config.api_url, &config.worker_id, &name))
}

pub fn list_entries(store: &dyn CacheStore, filter: &EntryFilter) -> Result<Vec<EntryDisplay>> {
    let mut entries = Vec::new();
    for key in store.keys()?.into_iter().filter(|k| filter.matches(k)) {
        let Some(value) = store.get(&key)? else {
            continue;
        };
        let parsed = CacheKey::parse(&key).ok();
        entries.push(EntryDisplay {
            environment: parsed.as_ref().map_or_else(|| "-".to_string(), |k| k.environment.clone()),
            worker: parsed.as_ref().map_or_else(|| "-".to_string(), |k| k.worker_id.clone()),
            name: parsed.map_or_else(|| key.clone(), |k| k.name),
            response_type: response_type(&value),
            size: value.to_string().len(),
            key,
        });
    }
    Ok(entries)
}

pub fn clear_entries(store: &dyn CacheStore, filter: &EntryFilter) -> Result<usize> {
    if filter.is_empty() {
        return Ok(store.clear()?);
    }
    let mut removed = 0;
    for key in store.keys()?.into_iter().filter(|k| filter.matches(k)) {
        if store.remove(&key)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Decode every tagged entry with `codec`. Untagged values (such as the
/// auth token) are skipped.
pub fn verify_entries(
    store: &dyn CacheStore,
    codec: &OpenApiCodec,
    filter: &EntryFilter,
) -> Result<Vec<VerifyFailure>> {
    let mut failures = Vec::new();
    for key in store.keys()?.into_iter().filter(|k| filter.matches(k)) {
        let Some(value) = store.get(&key)? else {
            continue;
        };
        if response_type(&value).is_none() {
            continue;
        }
        let result = serde_json::from_value::<CacheEntry>(value)
            .map_err(|e| e.to_string())
            .and_then(|entry| codec.decode_dynamic(entry).map_err(|e| e.to_string()));
        if let Err(error) = result {
            failures.push(VerifyFailure { key, error });
        }
    }
    Ok(failures)
}

fn response_type(value: &Value) -> Option<String> {
    value
        .get("response_type")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsuite_common::{FileCacheStore, MemoryCacheStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> MemoryCacheStore {
        let store = MemoryCacheStore::new();
        store
            .set(
                "https-blog-example-com/master/tests.posts.published_post",
                &json!({"response_type": "Post", "data": {"id": 7, "title": "Hello"}}),
            )
            .unwrap();
        store
            .set(
                "https-blog-example-com/gw0/tests.posts.posts",
                &json!({"response_type": "list[Post]", "data": [{"id": 1}, {"id": 2}]}),
            )
            .unwrap();
        store
            .set("https-blog-example-com/master/token", &json!("abc123"))
            .unwrap();
        store
    }

    fn worker(name: &str) -> EntryFilter {
        EntryFilter {
            worker: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_list_entries_splits_keys() {
        let entries = list_entries(&store(), &EntryFilter::default()).unwrap();
        assert_eq!(entries.len(), 3);

        let posts = &entries[0];
        assert_eq!(posts.worker, "gw0");
        assert_eq!(posts.environment, "https-blog-example-com");
        assert_eq!(posts.name, "tests.posts.posts");
        assert_eq!(posts.response_type.as_deref(), Some("list[Post]"));

        let token = entries.iter().find(|e| e.name == "token").unwrap();
        assert_eq!(token.response_type, None);
        assert_eq!(token.row()[4], "-");
    }

    #[test]
    fn test_list_entries_by_worker() {
        let entries = list_entries(&store(), &worker("master")).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.worker == "master"));
    }

    #[test]
    fn test_clear_only_matching_worker() {
        let store = store();
        assert_eq!(clear_entries(&store, &worker("gw0")).unwrap(), 1);
        assert_eq!(store.keys().unwrap().len(), 2);

        assert_eq!(clear_entries(&store, &EntryFilter::default()).unwrap(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_verify_reports_broken_entries() {
        let store = store();
        let codec = OpenApiCodec::blog();
        assert!(verify_entries(&store, &codec, &EntryFilter::default())
            .unwrap()
            .is_empty());

        store
            .set(
                "https-blog-example-com/master/tests.users.users",
                &json!({"response_type": "list[Comment]", "data": []}),
            )
            .unwrap();
        store
            .set(
                "https-blog-example-com/master/tests.posts.broken",
                &json!({"response_type": "tuple[Post", "data": []}),
            )
            .unwrap();

        let failures = verify_entries(&store, &codec, &EntryFilter::default()).unwrap();
        let keys: Vec<_> = failures.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "https-blog-example-com/master/tests.posts.broken",
                "https-blog-example-com/master/tests.users.users",
            ]
        );
    }

    #[test]
    fn test_file_store_entries() {
        let tmp = TempDir::new().unwrap();
        let store = FileCacheStore::new(tmp.path()).unwrap();
        let url_param = "https-blog-example-com/gw0/tests.posts.by_url.https://staging.example.com/";
        store
            .set(url_param, &json!({"response_type": "Post", "data": {"id": 3}}))
            .unwrap();
        store
            .set("https-blog-example-com/master/token", &json!("abc123"))
            .unwrap();

        let entries = list_entries(&store, &worker("gw0")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, url_param);
        assert_eq!(entries[0].name, "tests.posts.by_url.https://staging.example.com/");
        assert!(verify_entries(&store, &OpenApiCodec::blog(), &EntryFilter::default())
            .unwrap()
            .is_empty());

        assert_eq!(clear_entries(&store, &worker("gw0")).unwrap(), 1);
        assert_eq!(
            store.keys().unwrap(),
            vec!["https-blog-example-com/master/token".to_string()]
        );
    }

    #[test]
    fn test_fixture_key_matches_runtime_key() {
        let config = SuiteConfig {
            api_url: "https://staging.blog.example.com".to_string(),
            worker_id: "gw1".to_string(),
            ..Default::default()
        };
        let key = fixture_key(&config, "tests.posts.conftest.published_posts", Some("draft")).unwrap();
        let expected = CacheKey::for_fixture(
            &config.api_url,
            "gw1",
            &blogsuite_common::FixtureId::new("tests.posts.conftest", "published_posts"),
            Some("draft"),
        );
        assert_eq!(key, expected);

        assert!(fixture_key(&config, "published_posts", None).is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(2048), "2.0 KiB");
    }
}
