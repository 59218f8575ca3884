//! Page-open memoization
//!
//! Opening a page through the UI (clicking through menus) is slow and flaky.
//! The first time a page is opened in a browser session its resulting
//! address is remembered; later opens with the same arguments in the same
//! session navigate straight to that address.
//!
//! Only the address is cached, never the page object: a page is bound to a
//! live session and may hold stale state. Arguments are keyed by their
//! `Debug` rendering, so two distinct values that render identically share
//! an entry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::future::Future;
use tracing::debug;

use crate::error::E2eResult;
use crate::session::Driver;

/// Identity of one memoized page open
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCacheKey {
    pub page: String,
    pub session_id: String,
    pub args: String,
}

impl PageCacheKey {
    pub fn new(page: &str, session_id: &str, args: &impl Debug) -> Self {
        Self {
            page: page.to_string(),
            session_id: session_id.to_string(),
            args: format!("{:?}", args),
        }
    }
}

impl fmt::Display for PageCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}{}", self.page, self.session_id, self.args)
    }
}

/// Page addresses for one worker. Entries live as long as the cache; there
/// is no eviction.
#[derive(Debug, Default)]
pub struct UrlCache {
    entries: Mutex<HashMap<PageCacheKey, String>>,
}

impl UrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PageCacheKey) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: PageCacheKey, url: String) {
        self.entries.lock().insert(key, url);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A page object bound to a browser session
pub trait Page: Sized {
    /// Name used in cache keys
    const NAME: &'static str;

    /// Arguments the page is opened with
    type Args: Debug + Clone + Send + Sync;

    /// Bind a page to the session's current document
    fn from_driver(driver: Driver, args: Self::Args) -> Self;

    fn driver(&self) -> &Driver;
}

/// Open a page, reusing the address from an earlier open in this session.
///
/// On a miss `open` performs the real navigation and the address it ends on
/// is remembered. If `open` fails nothing is stored.
pub async fn memoize_open<P, F, Fut>(driver: &Driver, args: P::Args, open: F) -> E2eResult<P>
where
    P: Page,
    F: FnOnce(Driver, P::Args) -> Fut,
    Fut: Future<Output = E2eResult<P>>,
{
    let key = PageCacheKey::new(P::NAME, driver.session_id(), &args);

    if let Some(url) = driver.urls().get(&key) {
        debug!("Page cache hit: {} -> {}", key, url);
        driver.session().navigate_to(&url).await?;
        return Ok(P::from_driver(driver.clone(), args));
    }

    debug!("Page cache miss: {}", key);
    let page = open(driver.clone(), args).await?;
    let url = page.driver().current_url().await?;
    driver.urls().insert(key, url);
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_uses_debug_form_of_args() {
        let a = PageCacheKey::new("PostDetailsPage", "s1", &("hello", 1));
        assert_eq!(a.args, "(\"hello\", 1)");
        assert_eq!(a.to_string(), "PostDetailsPage@s1(\"hello\", 1)");
    }

    #[test]
    fn test_key_sensitivity() {
        let base = PageCacheKey::new("SignInPage", "s1", &());
        assert_ne!(base, PageCacheKey::new("ProfilePage", "s1", &()));
        assert_ne!(base, PageCacheKey::new("SignInPage", "s2", &()));
        assert_ne!(base, PageCacheKey::new("SignInPage", "s1", &1));
        assert_eq!(base, PageCacheKey::new("SignInPage", "s1", &()));
    }

    #[test]
    fn test_url_cache() {
        let cache = UrlCache::new();
        assert!(cache.is_empty());

        let key = PageCacheKey::new("SignInPage", "s1", &());
        assert_eq!(cache.get(&key), None);

        cache.insert(key.clone(), "http://app/login/".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("http://app/login/"));
        assert_eq!(cache.len(), 1);

        cache.insert(key.clone(), "http://app/login/?next=/".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("http://app/login/?next=/"));
        assert_eq!(cache.len(), 1);
    }
}
