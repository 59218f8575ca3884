//! Suite configuration
//!
//! Values come from an optional TOML file, then environment variables, then
//! command-line flags (applied by the binaries).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

/// Worker id used when tests are not split across processes
pub const DEFAULT_WORKER_ID: &str = "master";

/// Suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Environment base address; part of every fixture cache key
    pub api_url: String,

    /// Root URL of the blog UI
    pub app_root: String,

    /// Base URL of the REST API (defaults to `api_url`)
    pub app_base_url: Option<String>,

    /// Reuse cached fixture results across runs
    pub use_cache: bool,

    /// Directory of the persistent fixture cache
    pub cache_dir: PathBuf,

    /// Backend of the persistent fixture cache
    pub cache_backend: CacheBackend,

    /// Identifier of this worker process
    pub worker_id: String,

    /// Super user credentials
    pub credentials: Credentials,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Failure screenshot settings
    pub screenshots: ScreenshotConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            app_root: String::new(),
            app_base_url: None,
            use_cache: false,
            cache_dir: PathBuf::from(".blogsuite_cache"),
            cache_backend: CacheBackend::File,
            worker_id: DEFAULT_WORKER_ID.to_string(),
            credentials: Credentials::default(),
            browser: BrowserConfig::default(),
            screenshots: ScreenshotConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    File,
    Sqlite,
}

impl FromStr for CacheBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(CacheBackend::File),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(Error::InvalidConfig(format!("unknown cache backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Supported browsers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserName {
    #[default]
    Chrome,
    Firefox,
    #[serde(alias = "MicrosoftEdge")]
    Edge,
}

impl BrowserName {
    /// Name sent as the `browserName` capability
    pub fn capability_name(&self) -> &'static str {
        match self {
            BrowserName::Chrome => "chrome",
            BrowserName::Firefox => "firefox",
            BrowserName::Edge => "MicrosoftEdge",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserName::Chrome => "chrome",
            BrowserName::Firefox => "firefox",
            BrowserName::Edge => "edge",
        }
    }
}

impl FromStr for BrowserName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chrome" => Ok(BrowserName::Chrome),
            "firefox" => Ok(BrowserName::Firefox),
            "edge" | "MicrosoftEdge" => Ok(BrowserName::Edge),
            other => Err(Error::InvalidConfig(format!("unsupported browser: {}", other))),
        }
    }
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub name: BrowserName,

    /// WebDriver endpoint (local driver or remote hub)
    pub remote_url: String,

    pub headless: bool,

    /// `"width,height"` in pixels
    pub window_size: String,

    /// Implicit element wait applied to the session
    pub implicit_wait_secs: u64,

    /// Explicit wait used by page objects
    pub wait_timeout_secs: f64,

    pub poll_frequency_secs: f64,

    /// Attempts for retried browser actions
    pub max_retry_attempts: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            name: BrowserName::Chrome,
            remote_url: "http://127.0.0.1:4444".to_string(),
            headless: false,
            window_size: "1920,1080".to_string(),
            implicit_wait_secs: 2,
            wait_timeout_secs: 5.0,
            poll_frequency_secs: 0.01,
            max_retry_attempts: 3,
        }
    }
}

impl BrowserConfig {
    /// Parse `window_size` into `(width, height)`
    pub fn window_dimensions(&self) -> Result<(u32, u32)> {
        let invalid = || Error::InvalidConfig(format!("invalid window size: {}", self.window_size));
        let (width, height) = self.window_size.split_once(',').ok_or_else(invalid)?;
        let width = width.trim().parse().map_err(|_| invalid())?;
        let height = height.trim().parse().map_err(|_| invalid())?;
        Ok((width, height))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Capture a screenshot when a test fails
    pub enabled: bool,

    /// Where screenshots are written
    pub dir: PathBuf,

    /// Environment label used in screenshot paths
    pub environment: String,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("test-results/screenshots"),
            environment: "local".to_string(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{}={} is not valid", name, raw))),
        None => Ok(None),
    }
}

fn parse_flag(name: &str) -> Result<Option<bool>> {
    match env_var(name).as_deref() {
        Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some("0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(other) => Err(Error::InvalidConfig(format!("{}={} is not a boolean", name, other))),
        None => Ok(None),
    }
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay environment variables on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_var("API_URL") {
            self.api_url = v;
        }
        if let Some(v) = env_var("APP_ROOT") {
            self.app_root = v;
        }
        if let Some(v) = env_var("APP_BASE_URL") {
            self.app_base_url = Some(v);
        }
        if let Some(v) = parse_flag("BLOGSUITE_USE_CACHE")? {
            self.use_cache = v;
        }
        if let Some(v) = env_var("BLOGSUITE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_env("BLOGSUITE_CACHE_BACKEND")? {
            self.cache_backend = v;
        }
        if let Some(v) = env_var("BLOGSUITE_WORKER_ID") {
            self.worker_id = v;
        }
        if let Some(v) = env_var("SUPER_USER_USERNAME") {
            self.credentials.username = Some(v);
        }
        if let Some(v) = env_var("SUPER_USER_EMAIL") {
            self.credentials.email = Some(v);
        }
        if let Some(v) = env_var("SUPER_USER_PASSWORD") {
            self.credentials.password = Some(v);
        }
        if let Some(v) = env_var("REMOTE_BROWSER_ADDR") {
            self.browser.remote_url = v;
        }
        if let Some(v) = parse_env("BROWSER_WAIT")? {
            self.browser.wait_timeout_secs = v;
        }
        if let Some(v) = parse_env("BROWSER_POLL_FREQUENCY")? {
            self.browser.poll_frequency_secs = v;
        }
        if let Some(v) = parse_env("MAX_RETRY_ATTEMPTS")? {
            self.browser.max_retry_attempts = v;
        }
        if let Some(v) = env_var("ENVIRONMENT") {
            self.screenshots.environment = v;
        }
        Ok(())
    }

    /// Load from file and environment in one go
    pub fn from_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env()?;
        Ok(config)
    }

    /// REST API base URL
    pub fn api_base_url(&self) -> &str {
        self.app_base_url.as_deref().unwrap_or(&self.api_url)
    }
}
