//! Fixture requests and the fixture result cache
//!
//! Expensive setup (logging in, creating posts through the API) can be
//! reused across test runs: a cached fixture looks its result up in the
//! persistent store first and only runs the real setup on a miss.
//!
//! ```ignore
//! let posts: Vec<Post> = openapi_fixture_cache()
//!     .call(&request, fixture_id!("published_posts"), |request| async move {
//!         create_published_posts(&request).await
//!     })
//!     .await?;
//! ```

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use blogsuite_common::{CacheKey, FixtureId};

use crate::context::SuiteContext;
use crate::error::{E2eError, E2eResult};
use crate::openapi::OpenApiCodec;
use crate::session::SessionHandle;

type Finalizer = Box<dyn FnOnce() -> BoxFuture<'static, E2eResult<()>> + Send>;

/// Handle passed to every fixture: shared context, optional parameter and
/// the teardown callbacks registered so far.
#[derive(Clone)]
pub struct FixtureRequest {
    context: Arc<SuiteContext>,
    param: Option<String>,
    finalizers: Arc<Mutex<Vec<Finalizer>>>,
    session: Arc<Mutex<Option<SessionHandle>>>,
}

impl FixtureRequest {
    pub fn new(context: Arc<SuiteContext>) -> Self {
        Self {
            context,
            param: None,
            finalizers: Arc::new(Mutex::new(Vec::new())),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Same request for a parameterized fixture. Finalizers stay shared.
    pub fn with_param(&self, param: impl ToString) -> Self {
        Self {
            param: Some(param.to_string()),
            ..self.clone()
        }
    }

    pub fn context(&self) -> &Arc<SuiteContext> {
        &self.context
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    pub fn worker_id(&self) -> &str {
        self.context.worker_id()
    }

    pub fn use_cache(&self) -> bool {
        self.context.use_cache()
    }

    /// Key under which `fixture` is cached for this request
    pub fn cache_key(&self, fixture: &FixtureId) -> CacheKey {
        fixture_key(&self.context, self.param.as_deref(), fixture)
    }

    /// Key for a value that is not a fixture result
    pub fn named_key(&self, name: &str) -> CacheKey {
        CacheKey::named(&self.context.config().api_url, self.worker_id(), name)
    }

    /// Remember the browser session the test is driving
    pub fn attach_session(&self, session: SessionHandle) {
        *self.session.lock() = Some(session);
    }

    /// Browser session attached by a webdriver fixture, if any
    pub fn session(&self) -> Option<SessionHandle> {
        self.session.lock().clone()
    }

    /// Register teardown to run when the request is finalized
    pub fn add_finalizer<F, Fut>(&self, finalizer: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = E2eResult<()>> + Send + 'static,
    {
        self.finalizers
            .lock()
            .push(Box::new(move || -> BoxFuture<'static, E2eResult<()>> {
                Box::pin(finalizer())
            }));
    }

    /// Run finalizers, last registered first. Every finalizer runs even if
    /// an earlier one fails; the first failure is returned.
    pub async fn finalize(&self) -> E2eResult<()> {
        let finalizers: Vec<Finalizer> = std::mem::take(&mut *self.finalizers.lock());
        let mut first_error = None;

        for finalizer in finalizers.into_iter().rev() {
            if let Err(e) = finalizer().await {
                warn!("Fixture finalizer failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn fixture_key(context: &SuiteContext, param: Option<&str>, fixture: &FixtureId) -> CacheKey {
    CacheKey::for_fixture(&context.config().api_url, context.worker_id(), fixture, param)
}

/// Stored value for `fixture`, honoring the caching flag. Read failures and
/// `null` values count as "nothing cached".
fn cached_value(context: &SuiteContext, param: Option<&str>, fixture: &FixtureId) -> Option<Value> {
    if !context.use_cache() {
        return None;
    }
    let key = fixture_key(context, param, fixture).to_string();
    match context.store().get(&key) {
        Ok(Some(Value::Null)) | Ok(None) => None,
        Ok(Some(value)) => Some(value),
        Err(e) => {
            warn!("Fixture cache read failed for {}: {}", key, e);
            None
        }
    }
}

/// Cached data of a fixture, or `None` when caching is off or nothing is stored
pub fn get_cache(request: &FixtureRequest, fixture: &FixtureId) -> Option<Value> {
    cached_value(&request.context, request.param(), fixture)
}

/// How a fixture result is turned into storable JSON and back
pub trait CacheCodec<T>: Send + Sync {
    fn serialize(&self, value: &T) -> blogsuite_common::Result<Value>;

    fn deserialize(&self, data: Value) -> blogsuite_common::Result<T>;
}

/// Plain serde encoding, for results that are already JSON-friendly
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> CacheCodec<T> for JsonCodec {
    fn serialize(&self, value: &T) -> blogsuite_common::Result<Value> {
        Ok(serde_json::to_value(value)?)
    }

    fn deserialize(&self, data: Value) -> blogsuite_common::Result<T> {
        Ok(serde_json::from_value(data)?)
    }
}

/// Caches fixture results with a given codec
#[derive(Debug, Clone)]
pub struct FixtureCache<C> {
    codec: Arc<C>,
}

/// Build a fixture cache around a serializer/deserializer pair
pub fn fixture_cache<C>(codec: C) -> FixtureCache<C> {
    FixtureCache {
        codec: Arc::new(codec),
    }
}

/// Fixture cache for blog API models
pub fn openapi_fixture_cache() -> FixtureCache<OpenApiCodec> {
    fixture_cache(OpenApiCodec::blog())
}

impl<C> FixtureCache<C> {
    /// Wrap a fixture function; the result has the same call contract
    pub fn wrap<T, F, Fut>(&self, fixture: FixtureId, f: F) -> CachedFixture<C, F>
    where
        F: Fn(FixtureRequest) -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        CachedFixture {
            codec: self.codec.clone(),
            fixture,
            f,
        }
    }

    /// Run `f` through the cache once
    pub async fn call<T, F, Fut>(&self, request: &FixtureRequest, fixture: FixtureId, f: F) -> E2eResult<T>
    where
        C: CacheCodec<T>,
        F: FnOnce(FixtureRequest) -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        cached_call(self.codec.as_ref(), request, &fixture, f).await
    }
}

/// A fixture function wrapped by [`FixtureCache::wrap`]
pub struct CachedFixture<C, F> {
    codec: Arc<C>,
    fixture: FixtureId,
    f: F,
}

impl<C, F> CachedFixture<C, F> {
    pub async fn call<T, Fut>(&self, request: &FixtureRequest) -> E2eResult<T>
    where
        C: CacheCodec<T>,
        F: Fn(FixtureRequest) -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        cached_call(self.codec.as_ref(), request, &self.fixture, &self.f).await
    }
}

async fn cached_call<T, C, F, Fut>(
    codec: &C,
    request: &FixtureRequest,
    fixture: &FixtureId,
    f: F,
) -> E2eResult<T>
where
    C: CacheCodec<T> + ?Sized,
    F: FnOnce(FixtureRequest) -> Fut,
    Fut: Future<Output = E2eResult<T>>,
{
    if !request.use_cache() {
        return f(request.clone()).await;
    }

    let key = request.cache_key(fixture).to_string();

    if let Some(data) = get_cache(request, fixture) {
        debug!("Fixture cache hit: {}", key);
        return codec.deserialize(data).map_err(E2eError::from);
    }

    debug!("Fixture cache miss: {}", key);
    let result = f(request.clone()).await?;

    let data = codec.serialize(&result)?;
    match request.context.store().set(&key, &data) {
        Ok(()) => debug!("Fixture cache stored: {}", key),
        Err(e) => warn!("Fixture cache write failed for {}: {}", key, e),
    }

    Ok(result)
}

/// Create an object for a test and schedule its cleanup.
///
/// `fixture` is the fixture that owns the object. When caching is on and
/// that fixture has a cached result, cleanup is skipped: the object has to
/// outlive the run so the next one can reuse it.
pub async fn api_factory<T, Create, Cleanup, CleanupFut>(
    request: &FixtureRequest,
    fixture: FixtureId,
    create: Create,
    cleanup: Cleanup,
) -> E2eResult<T>
where
    T: Clone + Send + 'static,
    Create: Future<Output = E2eResult<T>>,
    Cleanup: FnOnce(T) -> CleanupFut + Send + 'static,
    CleanupFut: Future<Output = E2eResult<()>> + Send + 'static,
{
    let object = create.await?;

    let created = object.clone();
    let context = request.context.clone();
    let param = request.param.clone();
    request.add_finalizer(move || async move {
        if cached_value(&context, param.as_deref(), &fixture).is_some() {
            debug!("Keeping object of cached fixture {}", fixture);
            return Ok(());
        }
        cleanup(created).await
    });

    Ok(object)
}
