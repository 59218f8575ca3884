//! In-memory browser used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use blogsuite_e2e::session::{SessionHandle, WaitSettings};
use blogsuite_e2e::{BrowserSession, Driver, E2eError, E2eResult, Locator, UrlCache};

pub const APP_ROOT: &str = "http://blog.test/";

#[derive(Default)]
struct State {
    url: String,
    navigations: Vec<String>,
    clicks: Vec<String>,
    links: HashMap<String, String>,
    visible: HashSet<String>,
    values: HashMap<String, String>,
}

/// A fake browser: links change the address, inputs keep their values
pub struct FakeSession {
    id: String,
    state: Mutex<State>,
}

impl FakeSession {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            state: Mutex::new(State::default()),
        })
    }

    /// The blog's navigation bar for a visitor that is not signed in
    pub fn blog(id: &str) -> Arc<Self> {
        let session = Self::new(id);
        session.link(&Locator::link("Login"), "http://blog.test/login/");
        session.link(&Locator::link("Create Post"), "http://blog.test/post/new/");
        session
    }

    pub fn link(&self, locator: &Locator, target: &str) {
        let xpath = locator.to_xpath();
        let mut state = self.state.lock();
        state.visible.insert(xpath.clone());
        state.links.insert(xpath, target.to_string());
    }

    pub fn show(&self, locator: &Locator) {
        self.state.lock().visible.insert(locator.to_xpath());
    }

    pub fn set_value(&self, locator: &Locator, value: &str) {
        let xpath = locator.to_xpath();
        let mut state = self.state.lock();
        state.visible.insert(xpath.clone());
        state.values.insert(xpath, value.to_string());
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().clicks.len()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.url())
    }

    async fn navigate_to(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn exists(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.state.lock().visible.contains(&locator.to_xpath()))
    }

    async fn is_displayed(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.state.lock().visible.contains(&locator.to_xpath()))
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let xpath = locator.to_xpath();
        let mut state = self.state.lock();
        state.clicks.push(xpath.clone());
        if let Some(target) = state.links.get(&xpath).cloned() {
            state.url = target;
        }
        Ok(())
    }

    async fn clear(&self, locator: &Locator) -> E2eResult<()> {
        self.state.lock().values.remove(&locator.to_xpath());
        Ok(())
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        self.state
            .lock()
            .values
            .entry(locator.to_xpath())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> E2eResult<String> {
        self.value(locator).await
    }

    async fn value(&self, locator: &Locator) -> E2eResult<String> {
        self.state
            .lock()
            .values
            .get(&locator.to_xpath())
            .cloned()
            .ok_or_else(|| E2eError::ElementNotFound(locator.to_xpath()))
    }

    async fn screenshot_png(&self) -> E2eResult<Vec<u8>> {
        Ok(b"\x89PNG\r\n".to_vec())
    }

    async fn quit(&self) -> E2eResult<()> {
        Ok(())
    }
}

pub fn fast_wait() -> WaitSettings {
    WaitSettings {
        timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        max_attempts: 1,
    }
}

/// Driver over a fake session sharing `urls`
pub fn driver(session: &Arc<FakeSession>, urls: &Arc<UrlCache>) -> Driver {
    let handle: SessionHandle = session.clone();
    Driver::new(handle, APP_ROOT, urls.clone()).with_wait(fast_wait())
}
