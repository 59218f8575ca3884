//! Blog E2E Test Suite
//!
//! This crate drives the blog web application through a real browser and
//! its REST API. Two caches keep repeated runs fast:
//! - The fixture result cache stores fixture results (API objects, tokens)
//!   in a persistent store and replays them on later runs
//! - The page-open cache remembers where UI navigation ended up and jumps
//!   straight there the next time in the same browser session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Scenario Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner                                                │
//! │    ├── Scenario(SuiteFixtures, FixtureRequest)              │
//! │    ├── finalize() -> teardown in reverse order              │
//! │    └── ScreenshotCollector on failure                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fixture cache                 │  Page-open cache           │
//! │    FixtureCache<C: CacheCodec> │    memoize_open::<P: Page> │
//! │    OpenApiCodec (tagged JSON)  │    UrlCache (per worker)   │
//! │    CacheStore (file/sqlite)    │    Driver -> BrowserSession│
//! ├─────────────────────────────────────────────────────────────┤
//! │  ApiClient (reqwest)           │  WebDriverSession (W3C)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod args;
pub mod context;
pub mod error;
pub mod fixture;
pub mod fixtures;
pub mod openapi;
pub mod page_cache;
pub mod pages;
pub mod runner;
pub mod screenshots;
pub mod session;
pub mod webdriver;

pub use args::SuiteArgs;
pub use context::SuiteContext;
pub use error::{E2eError, E2eResult};
pub use fixture::{fixture_cache, get_cache, openapi_fixture_cache, FixtureCache, FixtureRequest};
pub use openapi::{CacheEntry, OpenApiCodec};
pub use page_cache::{memoize_open, Page, PageCacheKey, UrlCache};
pub use runner::{Scenario, SuiteRunner, TestSuiteResult};
pub use session::{BrowserSession, Driver, Locator};
