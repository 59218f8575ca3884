//! Command-line options of the suite
//!
//! Flags override the configuration file and environment variables.

use clap::Args;
use std::path::PathBuf;

use blogsuite_common::{default_config_path, BrowserName, SuiteConfig};

use crate::error::E2eResult;

#[derive(Args, Debug, Clone, Default)]
pub struct SuiteArgs {
    /// Configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reuse cached fixture results between runs
    #[arg(long = "use-cache", visible_alias = "uc")]
    pub use_cache: bool,

    /// Browser to run (chrome, firefox, edge)
    #[arg(long)]
    pub webdriver: Option<BrowserName>,

    /// Address of the remote WebDriver hub
    #[arg(long)]
    pub webdriver_remote_url: Option<String>,

    /// Run the browser without a window
    #[arg(long)]
    pub webdriver_headless: bool,

    /// Browser window size as `width,height`
    #[arg(long)]
    pub webdriver_window_size: Option<String>,

    /// Implicit element wait in seconds
    #[arg(long)]
    pub webdriver_implicitly_wait: Option<u64>,

    /// Save a browser screenshot for every failed test
    #[arg(long)]
    pub collect_screenshots: bool,

    /// Worker id used in cache keys
    #[arg(long)]
    pub worker_id: Option<String>,
}

impl SuiteArgs {
    /// Configuration from file, then environment, then these flags
    pub fn load_config(&self) -> E2eResult<SuiteConfig> {
        let path = self.config.clone().unwrap_or_else(default_config_path);
        let mut config = SuiteConfig::from_env(&path)?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Overlay the flags that were given on `config`
    pub fn apply(&self, config: &mut SuiteConfig) {
        if self.use_cache {
            config.use_cache = true;
        }
        if let Some(name) = self.webdriver {
            config.browser.name = name;
        }
        if let Some(url) = &self.webdriver_remote_url {
            config.browser.remote_url = url.clone();
        }
        if self.webdriver_headless {
            config.browser.headless = true;
        }
        if let Some(size) = &self.webdriver_window_size {
            config.browser.window_size = size.clone();
        }
        if let Some(secs) = self.webdriver_implicitly_wait {
            config.browser.implicit_wait_secs = secs;
        }
        if self.collect_screenshots {
            config.screenshots.enabled = true;
        }
        if let Some(worker_id) = &self.worker_id {
            config.worker_id = worker_id.clone();
        }
    }
}
