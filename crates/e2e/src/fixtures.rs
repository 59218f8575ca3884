//! Suite fixtures: API client, browsers and test data
//!
//! Per-test fixtures take the test's [`FixtureRequest`]. Fixtures shared by
//! the whole run live in [`SuiteFixtures`] and are created on first use.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use blogsuite_common::models::{AuthTokenRequest, Post};
use blogsuite_common::{fixture_id, Field, FixtureId};

use crate::api::{self, generate_name_with_uuid, ApiClient, MAX_NAME_LENGTH};
use crate::error::{E2eError, E2eResult};
use crate::fixture::{api_factory, openapi_fixture_cache, FixtureRequest};
use crate::page_cache::Page;
use crate::pages::{BlogPage, SignInPage};
use crate::session::{Driver, SessionHandle, WaitSettings};
use crate::webdriver::WebDriverSession;

/// Identity of the cached published post
pub const PUBLISHED_POST: FixtureId = fixture_id!("published_post");

/// Store key holding the API token
const TOKEN_CACHE_NAME: &str = "token";

fn required(value: &Option<String>, name: &str) -> E2eResult<String> {
    value
        .clone()
        .ok_or_else(|| E2eError::MissingConfig(name.to_string()))
}

/// Authenticated API client.
///
/// The token is reused from the store when caching is on; otherwise the
/// client logs in. The token is written back either way.
pub async fn api_client(request: &FixtureRequest) -> E2eResult<ApiClient> {
    let context = request.context();
    let config = context.config();
    let base_url = config.api_base_url().to_string();
    let key = request.named_key(TOKEN_CACHE_NAME).to_string();

    let stored = match context.store().get(&key) {
        Ok(Some(Value::String(token))) if !token.is_empty() => Some(token),
        Ok(_) => None,
        Err(e) => {
            warn!("Token cache read failed for {}: {}", key, e);
            None
        }
    };

    let token = match stored {
        Some(token) if request.use_cache() => {
            debug!("Reusing cached API token");
            token
        }
        _ => {
            let credentials = AuthTokenRequest {
                email: required(&config.credentials.email, "SUPER_USER_EMAIL")?,
                password: required(&config.credentials.password, "SUPER_USER_PASSWORD")?,
            };
            api::login(&base_url, &credentials).await?.token
        }
    };

    if let Err(e) = context.store().set(&key, &Value::String(token.clone())) {
        warn!("Token cache write failed for {}: {}", key, e);
    }

    ApiClient::new(base_url, token)
}

/// Start a browser for this request; it quits when the request finalizes
pub async fn webdriver(request: &FixtureRequest) -> E2eResult<Driver> {
    let context = request.context();
    let config = context.config();
    if config.app_root.is_empty() {
        return Err(E2eError::MissingConfig("APP_ROOT".to_string()));
    }

    let session: SessionHandle = Arc::new(WebDriverSession::start(&config.browser).await?);
    request.attach_session(session.clone());

    let quit = session.clone();
    request.add_finalizer(move || async move { quit.quit().await });

    Ok(Driver::new(session, config.app_root.clone(), context.urls().clone())
        .with_wait(WaitSettings::from_config(&config.browser)))
}

/// Browser signed in as the superuser
pub async fn superuser_driver(request: &FixtureRequest) -> E2eResult<Driver> {
    let driver = webdriver(request).await?;
    let credentials = &request.context().config().credentials;
    let username = required(&credentials.username, "SUPER_USER_USERNAME")?;
    let password = required(&credentials.password, "SUPER_USER_PASSWORD")?;

    let sign_in = SignInPage::open(&driver).await?;
    let profile = sign_in.sign_in(&username, &password).await?;
    info!("Signed in as {}", username);
    Ok(profile.driver().clone())
}

/// Blog front page in the superuser's browser
pub async fn blog_page(driver: &Driver) -> E2eResult<BlogPage> {
    BlogPage::open(driver).await
}

/// Unsaved sample post with a unique title
pub fn sample_post() -> Post {
    Post::new(
        generate_name_with_uuid("Blog Post", MAX_NAME_LENGTH),
        "Blog post description.",
        "Blog post content.",
    )
}

/// Create a post through the API and delete it when the request finalizes.
///
/// `description` distinguishes "use the default" ([`Field::Unset`]) from
/// "send no description" (`Field::Set(None)`).
pub async fn post_factory(
    request: &FixtureRequest,
    owner: FixtureId,
    api: &ApiClient,
    title: Field<String>,
    description: Field<Option<String>>,
    content: Field<String>,
) -> E2eResult<Post> {
    let post = Post {
        title: Some(title.unwrap_or_else(|| generate_name_with_uuid("Blog Post", MAX_NAME_LENGTH))),
        description: description.unwrap_or_else(|| Some("Blog post description.".to_string())),
        content: Some(content.unwrap_or_else(|| "Blog post content.".to_string())),
        ..Default::default()
    };

    let cleanup_api = api.clone();
    api_factory(request, owner, api.create_post(&post), move |created: Post| async move {
        cleanup_api.delete_post(created.id).await
    })
    .await
}

/// A published post, reused across runs when caching is on
pub async fn published_post(request: &FixtureRequest, api: &ApiClient) -> E2eResult<Post> {
    let api = api.clone();
    openapi_fixture_cache()
        .call(request, PUBLISHED_POST, |request| async move {
            post_factory(
                &request,
                PUBLISHED_POST,
                &api,
                Field::Unset,
                Field::Unset,
                Field::Unset,
            )
            .await
        })
        .await
}

/// Fixtures created once per run and shared by every scenario
pub struct SuiteFixtures {
    request: FixtureRequest,
    api: OnceCell<ApiClient>,
    superuser: OnceCell<Driver>,
}

impl SuiteFixtures {
    pub fn new(request: FixtureRequest) -> Self {
        Self {
            request,
            api: OnceCell::new(),
            superuser: OnceCell::new(),
        }
    }

    pub fn request(&self) -> &FixtureRequest {
        &self.request
    }

    pub async fn api_client(&self) -> E2eResult<&ApiClient> {
        self.api.get_or_try_init(|| api_client(&self.request)).await
    }

    pub async fn superuser_driver(&self) -> E2eResult<&Driver> {
        self.superuser
            .get_or_try_init(|| superuser_driver(&self.request))
            .await
    }

    /// Tear down everything created for the run
    pub async fn finalize(&self) -> E2eResult<()> {
        self.request.finalize().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SuiteContext;
    use blogsuite_common::{CacheStore, MemoryCacheStore, SuiteConfig};

    fn request(use_cache: bool) -> (FixtureRequest, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::new());
        let config = SuiteConfig {
            api_url: "https://blog.example.com".to_string(),
            app_base_url: Some("http://127.0.0.1:9".to_string()),
            use_cache,
            ..Default::default()
        };
        (FixtureRequest::new(SuiteContext::new(config, store.clone())), store)
    }

    #[test]
    fn test_sample_post_has_unique_title() {
        let a = sample_post();
        let b = sample_post();
        assert!(a.title().starts_with("Blog Post "));
        assert_eq!(a.title().chars().count(), MAX_NAME_LENGTH);
        assert_ne!(a.title(), b.title());
        assert_eq!(a.description(), "Blog post description.");
    }

    #[tokio::test]
    async fn test_cached_token_skips_login() {
        let (request, store) = request(true);
        let key = request.named_key(TOKEN_CACHE_NAME).to_string();
        store.set(&key, &Value::String("abc".to_string())).unwrap();

        let client = api_client(&request).await.unwrap();
        assert_eq!(client.token(), "abc");
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let (request, _store) = request(false);
        let err = api_client(&request).await.err().unwrap();
        assert!(matches!(err, E2eError::MissingConfig(name) if name == "SUPER_USER_EMAIL"));
    }

    #[tokio::test]
    async fn test_webdriver_requires_app_root() {
        let (request, _store) = request(false);
        let err = webdriver(&request).await.err().unwrap();
        assert!(matches!(err, E2eError::MissingConfig(name) if name == "APP_ROOT"));
    }
}
