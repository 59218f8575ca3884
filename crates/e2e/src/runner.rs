//! Scenario runner
//!
//! Runs each scenario with a fresh [`FixtureRequest`], finalizes its
//! fixtures, screenshots failures and collects the results.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use blogsuite_common::slugify;

use crate::context::SuiteContext;
use crate::error::{E2eError, E2eResult};
use crate::fixture::FixtureRequest;
use crate::fixtures::{blog_page, sample_post, webdriver, SuiteFixtures};
use crate::page_cache::Page;
use crate::pages::{FormField, PostCreatePage, SignInPage};
use crate::screenshots::{LocalArtifactStorage, ScreenshotCollector};

/// Scenario body: shared fixtures plus the scenario's own request
pub type ScenarioFn = for<'a> fn(&'a SuiteFixtures, FixtureRequest) -> BoxFuture<'a, E2eResult<()>>;

/// A named end-to-end test
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub body: ScenarioFn,
}

impl Scenario {
    pub const fn new(name: &'static str, body: ScenarioFn) -> Self {
        Self { name, body }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

pub struct SuiteRunner {
    context: Arc<SuiteContext>,
    screenshots: Option<ScreenshotCollector>,
    output_dir: PathBuf,
}

impl SuiteRunner {
    pub fn new(context: Arc<SuiteContext>, output_dir: impl Into<PathBuf>) -> Self {
        let config = context.config();
        let screenshots = config.screenshots.enabled.then(|| {
            ScreenshotCollector::new(
                Arc::new(LocalArtifactStorage::new(config.screenshots.dir.clone())),
                config.screenshots.environment.clone(),
                config.browser.name.as_str(),
            )
        });
        Self {
            context,
            screenshots,
            output_dir: output_dir.into(),
        }
    }

    pub fn context(&self) -> &Arc<SuiteContext> {
        &self.context
    }

    /// Run scenarios in order. Run-scoped fixtures are torn down at the end.
    pub async fn run(&self, scenarios: &[Scenario]) -> TestSuiteResult {
        let start = Instant::now();
        let fixtures = SuiteFixtures::new(FixtureRequest::new(self.context.clone()));
        let mut results = Vec::new();

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = self.run_scenario(&fixtures, scenario).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        if let Err(e) = fixtures.finalize().await {
            warn!("Suite teardown failed: {}", e);
        }

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed, 0 skipped ({} ms)",
            passed, failed, duration_ms
        );

        if let Some(collector) = &self.screenshots {
            let lines = collector.summary();
            if !lines.is_empty() {
                info!("Browser screenshot links:");
                for line in lines {
                    info!("  {}", line);
                }
            }
        }

        TestSuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            skipped: 0,
            duration_ms,
            results,
        }
    }

    async fn run_scenario(&self, fixtures: &SuiteFixtures, scenario: &Scenario) -> TestResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let request = FixtureRequest::new(self.context.clone());
        let outcome = (scenario.body)(fixtures, request.clone()).await;

        let mut screenshot = None;
        if outcome.is_err() {
            if let (Some(collector), Some(session)) = (&self.screenshots, request.session()) {
                screenshot = collector.capture(session.as_ref(), scenario.name).await;
            }
        }

        let teardown = request.finalize().await;
        let error = match (outcome, teardown) {
            (Err(e), _) => Some(e.to_string()),
            (Ok(()), Err(e)) => Some(format!("teardown failed: {}", e)),
            (Ok(()), Ok(())) => None,
        };

        TestResult {
            name: scenario.name.to_string(),
            success: error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            error,
            screenshot,
        }
    }

    /// Write results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.output_dir, results)
    }
}

pub fn write_results(output_dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn check(condition: bool, message: impl FnOnce() -> String) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message()))
    }
}

fn check_eq(what: &str, actual: &str, expected: &str) -> E2eResult<()> {
    check(actual == expected, || {
        format!("{}: expected {:?}, got {:?}", what, expected, actual)
    })
}

/// Sign in through the UI and check the profile shows the superuser
pub fn successful_login(_fixtures: &SuiteFixtures, request: FixtureRequest) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let credentials = request.context().config().credentials.clone();
        let username = credentials
            .username
            .ok_or_else(|| E2eError::MissingConfig("SUPER_USER_USERNAME".to_string()))?;
        let email = credentials
            .email
            .ok_or_else(|| E2eError::MissingConfig("SUPER_USER_EMAIL".to_string()))?;
        let password = credentials
            .password
            .ok_or_else(|| E2eError::MissingConfig("SUPER_USER_PASSWORD".to_string()))?;

        let driver = webdriver(&request).await?;
        let sign_in_page = SignInPage::open(&driver).await?;
        let profile_page = sign_in_page.sign_in(&username, &password).await?;

        check_eq("username", &profile_page.username_input().value().await?, &username)?;
        check_eq("email", &profile_page.email_input().value().await?, &email)?;
        Ok(())
    })
}

/// Publish a post through the UI and check it through the API and the page
pub fn create_post(fixtures: &SuiteFixtures, request: FixtureRequest) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let api = fixtures.api_client().await?.clone();
        let driver = fixtures.superuser_driver().await?;
        request.attach_session(driver.session().clone());

        let post = sample_post();
        check(!api.is_post_exists(post.title()).await?, || {
            format!("post {:?} exists before it was created", post.title())
        })?;

        let blog = blog_page(driver).await?;
        blog.click_create_post().await?;
        let create_page = PostCreatePage::from_driver(driver.clone(), ());
        let details_page = create_page.create(&post).await?;

        let created = api.get_post_by_name(post.title()).await?;
        let cleanup_api = api.clone();
        request.add_finalizer(move || async move { cleanup_api.delete_post(created.id).await });

        check_eq("title", &details_page.title_text().await?, post.title())?;
        check_eq("description", &details_page.description_text().await?, post.description())?;
        check_eq("content", &details_page.content_text().await?, post.content())?;

        let url = details_page.current_url().await?;
        let slug = slugify(post.title());
        check(url.contains(&slug), || format!("{} does not contain slug {}", url, slug))
    })
}

/// The suite's UI scenarios
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("successful_login", successful_login),
        Scenario::new("create_post", create_post),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsuite_common::{MemoryCacheStore, SuiteConfig};
    use tempfile::TempDir;

    fn runner(output: &Path) -> SuiteRunner {
        let context = SuiteContext::new(SuiteConfig::default(), Arc::new(MemoryCacheStore::new()));
        SuiteRunner::new(context, output)
    }

    fn passing(_: &SuiteFixtures, _: FixtureRequest) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn failing(_: &SuiteFixtures, _: FixtureRequest) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async { Err(E2eError::AssertionFailed("boom".to_string())) })
    }

    fn failing_teardown(_: &SuiteFixtures, request: FixtureRequest) -> BoxFuture<'_, E2eResult<()>> {
        Box::pin(async move {
            request.add_finalizer(|| async { Err(E2eError::Timeout("cleanup".to_string())) });
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_run_collects_results() {
        let temp = TempDir::new().unwrap();
        let runner = runner(temp.path());
        let results = runner
            .run(&[
                Scenario::new("passing", passing),
                Scenario::new("failing", failing),
                Scenario::new("failing_teardown", failing_teardown),
            ])
            .await;

        assert_eq!(results.total, 3);
        assert_eq!(results.passed, 1);
        assert_eq!(results.failed, 2);
        assert!(!results.success());
        assert_eq!(results.results[1].error.as_deref(), Some("Assertion failed: boom"));
        assert!(results.results[2]
            .error
            .as_deref()
            .unwrap()
            .starts_with("teardown failed"));
        assert!(results.results.iter().all(|r| r.screenshot.is_none()));
    }

    #[tokio::test]
    async fn test_write_results() {
        let temp = TempDir::new().unwrap();
        let runner = runner(temp.path());
        let results = runner.run(&[Scenario::new("passing", passing)]).await;

        let path = runner.write_results(&results).unwrap();
        assert_eq!(path, temp.path().join("test-results.json"));
        let loaded: TestSuiteResult = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.passed, 1);
        assert_eq!(loaded.results[0].name, "passing");
    }

    #[test]
    fn test_builtin_scenarios() {
        let names: Vec<_> = builtin_scenarios().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["successful_login", "create_post"]);
    }
}
