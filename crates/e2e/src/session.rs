//! Browser session boundary
//!
//! Page objects talk to the browser only through [`BrowserSession`]. The
//! WebDriver client in [`crate::webdriver`] is the real implementation;
//! tests plug in an in-memory fake.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

use blogsuite_common::BrowserConfig;

use crate::error::{E2eError, E2eResult};
use crate::page_cache::UrlCache;

/// How to find an element. Every variant renders to an XPath query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Element by `id` attribute
    Id(String),
    /// Elements carrying a CSS class
    Class(String),
    /// Raw XPath
    XPath(String),
    /// `element` whose text contains (or equals, if `exact`) `text`
    Text {
        element: String,
        text: String,
        exact: bool,
    },
    /// Button with the given text
    Button(String),
    /// First `<input>` after the element labelled `label`
    InputLabel(String),
    /// First `<textarea>` after the element labelled `label`
    TextAreaLabel(String),
    /// Another locator narrowed by an XPath predicate, e.g. `[last()]`
    Extended(Box<Locator>, String),
}

/// Quote a string for use inside an XPath expression
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value.split('\'').map(|part| format!("'{}'", part)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn class(class: impl Into<String>) -> Self {
        Locator::Class(class.into())
    }

    pub fn link(text: impl Into<String>) -> Self {
        Locator::Text {
            element: "a".to_string(),
            text: text.into(),
            exact: false,
        }
    }

    pub fn exact_link(text: impl Into<String>) -> Self {
        Locator::Text {
            element: "a".to_string(),
            text: text.into(),
            exact: true,
        }
    }

    pub fn button(text: impl Into<String>) -> Self {
        Locator::Button(text.into())
    }

    /// Narrow this locator with an XPath predicate
    pub fn extend(self, predicate: impl Into<String>) -> Self {
        Locator::Extended(Box::new(self), predicate.into())
    }

    pub fn to_xpath(&self) -> String {
        match self {
            Locator::Id(id) => format!("//*[@id={}]", xpath_literal(id)),
            Locator::Class(class) => format!(
                "//*[contains(concat(' ', normalize-space(@class), ' '), {})]",
                xpath_literal(&format!(" {} ", class))
            ),
            Locator::XPath(xpath) => xpath.clone(),
            Locator::Text { element, text, exact: true } => {
                format!("//{}[normalize-space(.)={}]", element, xpath_literal(text))
            }
            Locator::Text { element, text, exact: false } => {
                format!("//{}[contains(., {})]", element, xpath_literal(text))
            }
            Locator::Button(text) => format!("//button[contains(., {})]", xpath_literal(text)),
            Locator::InputLabel(label) => {
                format!("//*[contains(., {})]/following::input[1]", xpath_literal(label))
            }
            Locator::TextAreaLabel(label) => {
                format!("//*[contains(., {})]/following::textarea[1]", xpath_literal(label))
            }
            Locator::Extended(base, predicate) => format!("({}){}", base.to_xpath(), predicate),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xpath())
    }
}

/// A live browser-automation connection
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Identifier of this session; addresses cached under one session are
    /// never reused by another.
    fn session_id(&self) -> &str;

    async fn current_url(&self) -> E2eResult<String>;

    async fn navigate_to(&self, url: &str) -> E2eResult<()>;

    /// Whether an element matching the locator exists right now
    async fn exists(&self, locator: &Locator) -> E2eResult<bool>;

    async fn is_displayed(&self, locator: &Locator) -> E2eResult<bool>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn clear(&self, locator: &Locator) -> E2eResult<()>;

    async fn send_keys(&self, locator: &Locator, text: &str) -> E2eResult<()>;

    /// Visible text of the element
    async fn text(&self, locator: &Locator) -> E2eResult<String>;

    /// `value` property of a form element
    async fn value(&self, locator: &Locator) -> E2eResult<String>;

    /// PNG screenshot of the viewport
    async fn screenshot_png(&self) -> E2eResult<Vec<u8>>;

    async fn quit(&self) -> E2eResult<()>;
}

/// Shared handle to a browser session
pub type SessionHandle = Arc<dyn BrowserSession>;

/// Explicit waits and retries used by page objects
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

impl WaitSettings {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            timeout: Duration::from_secs_f64(config.wait_timeout_secs.max(0.0)),
            poll_interval: Duration::from_secs_f64(config.poll_frequency_secs.max(0.001)),
            max_attempts: config.max_retry_attempts.max(1),
        }
    }
}

/// What a page object holds: the session, where the app lives, and the
/// worker's page URL cache.
#[derive(Clone)]
pub struct Driver {
    session: SessionHandle,
    app_root: String,
    urls: Arc<UrlCache>,
    wait: WaitSettings,
}

impl Driver {
    pub fn new(session: SessionHandle, app_root: impl Into<String>, urls: Arc<UrlCache>) -> Self {
        Self {
            session,
            app_root: app_root.into(),
            urls,
            wait: WaitSettings::default(),
        }
    }

    pub fn with_wait(mut self, wait: WaitSettings) -> Self {
        self.wait = wait;
        self
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn app_root(&self) -> &str {
        &self.app_root
    }

    pub fn urls(&self) -> &UrlCache {
        &self.urls
    }

    pub fn wait(&self) -> &WaitSettings {
        &self.wait
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.session.current_url().await
    }

    /// Poll `condition` until it holds or the wait timeout runs out
    pub async fn wait_until<F, Fut>(&self, what: &str, mut condition: F) -> E2eResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        let start = Instant::now();
        loop {
            if condition().await? {
                return Ok(());
            }
            if start.elapsed() >= self.wait.timeout {
                return Err(E2eError::Timeout(what.to_string()));
            }
            sleep(self.wait.poll_interval).await;
        }
    }

    /// Wait until the element is displayed
    pub async fn wait_until_visible(&self, locator: &Locator) -> E2eResult<()> {
        let session = &self.session;
        self.wait_until(&format!("visibility of {}", locator), move || async move {
            match session.is_displayed(locator).await {
                Ok(displayed) => Ok(displayed),
                Err(e) if e.is_webdriver() => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Wait until the address differs from `old_url`
    pub async fn wait_until_url_changes(&self, old_url: &str) -> E2eResult<()> {
        let session = &self.session;
        self.wait_until(&format!("url change from {}", old_url), move || async move {
            Ok(session.current_url().await? != old_url)
        })
        .await
    }

    /// Run `action` and wait for it to move the browser to another address
    pub async fn wait_for_url_change<F, Fut, T>(&self, action: F) -> E2eResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        let old_url = self.current_url().await?;
        let result = action().await?;
        self.wait_until_url_changes(&old_url).await?;
        Ok(result)
    }

    /// Retry a browser action on WebDriver errors with exponential backoff
    pub async fn retry<F, Fut, T>(&self, what: &str, mut action: F) -> E2eResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 1;
        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_webdriver() && attempt < self.wait.max_attempts => {
                    warn!("{} failed (attempt {}): {}", what, attempt, e);
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn click(&self, locator: &Locator) -> E2eResult<()> {
        debug!("click {}", locator);
        self.wait_until_visible(locator).await?;
        self.retry("click", || self.session.click(locator)).await
    }

    /// Replace the content of an input
    pub async fn fill(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        debug!("fill {}", locator);
        self.wait_until_visible(locator).await?;
        self.retry("fill", move || async move {
            self.session.clear(locator).await?;
            self.session.send_keys(locator, text).await
        })
        .await
    }

    pub async fn text(&self, locator: &Locator) -> E2eResult<String> {
        self.wait_until_visible(locator).await?;
        self.session.text(locator).await
    }

    pub async fn value(&self, locator: &Locator) -> E2eResult<String> {
        self.wait_until_visible(locator).await?;
        self.session.value(locator).await
    }

    /// Displayed right now, without waiting
    pub async fn is_displayed(&self, locator: &Locator) -> E2eResult<bool> {
        if !self.session.exists(locator).await? {
            return Ok(false);
        }
        self.session.is_displayed(locator).await
    }
}
