//! Failure screenshots
//!
//! When a browser test fails the collector grabs the viewport, stores it
//! and remembers the link so the run summary can point at it. Failures here
//! are logged and never mask the test failure itself.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{E2eError, E2eResult};
use crate::session::BrowserSession;

/// Somewhere to keep run artifacts
pub trait ArtifactStorage: Send + Sync {
    /// Store `content` under the relative `name`, returning a link to it
    fn save(&self, content: &[u8], name: &str) -> E2eResult<String>;
}

/// Artifacts on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalArtifactStorage {
    root: PathBuf,
}

impl LocalArtifactStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStorage for LocalArtifactStorage {
    fn save(&self, content: &[u8], name: &str) -> E2eResult<String> {
        if name.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(E2eError::AssertionFailed(format!("invalid artifact name: {}", name)));
        }
        let path = self.root.join(name);
        let parent = path
            .parent()
            .ok_or_else(|| E2eError::AssertionFailed(format!("invalid artifact name: {}", name)))?;
        fs::create_dir_all(parent)?;

        // Write to temp file then rename for atomicity
        let tmp_path = path.with_extension("png.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        let digest = hex::encode(Sha256::digest(content));
        info!("Saved artifact {} ({} bytes, sha256 {})", path.display(), content.len(), digest);
        Ok(path.display().to_string())
    }
}

/// Relative screenshot path for a failed test
pub fn screenshot_name(environment: &str, browser: &str, test_name: &str, at: DateTime<Local>) -> String {
    format!(
        "runs/{}/{}/{}/failed_{}.png",
        environment,
        browser,
        test_name,
        at.format("%d-%m-%Y_%H:%M")
    )
}

/// Captures screenshots of failed tests and remembers their links
pub struct ScreenshotCollector {
    storage: Arc<dyn ArtifactStorage>,
    environment: String,
    browser: String,
    links: Mutex<Vec<(String, String)>>,
}

impl ScreenshotCollector {
    pub fn new(storage: Arc<dyn ArtifactStorage>, environment: impl Into<String>, browser: impl Into<String>) -> Self {
        Self {
            storage,
            environment: environment.into(),
            browser: browser.into(),
            links: Mutex::new(Vec::new()),
        }
    }

    /// Screenshot the session for `test_name`. Returns the link, or `None`
    /// when the screenshot could not be taken or stored.
    pub async fn capture(&self, session: &dyn BrowserSession, test_name: &str) -> Option<String> {
        let png = match session.screenshot_png().await {
            Ok(png) => png,
            Err(e) => {
                error!("Can't get browser screenshot: {}", e);
                return None;
            }
        };

        let name = screenshot_name(&self.environment, &self.browser, test_name, Local::now());
        match self.storage.save(&png, &name) {
            Ok(link) => {
                self.links.lock().push((test_name.to_string(), link.clone()));
                Some(link)
            }
            Err(e) => {
                error!("Can't save screenshot {}: {}", name, e);
                None
            }
        }
    }

    /// `test -> link` lines for every captured screenshot
    pub fn summary(&self) -> Vec<String> {
        self.links
            .lock()
            .iter()
            .map(|(test, link)| format!("{} -> {}", test, link))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_screenshot_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(
            screenshot_name("staging", "chrome", "successful_login", at),
            "runs/staging/chrome/successful_login/failed_07-03-2024_09:05.png"
        );
    }

    #[test]
    fn test_local_storage_writes_file() {
        let temp = TempDir::new().unwrap();
        let storage = LocalArtifactStorage::new(temp.path());

        let link = storage.save(b"\x89PNG", "runs/local/chrome/t/failed.png").unwrap();
        let path = temp.path().join("runs/local/chrome/t/failed.png");
        assert_eq!(link, path.display().to_string());
        assert_eq!(fs::read(&path).unwrap(), b"\x89PNG");
        assert!(!path.with_extension("png.tmp").exists());
    }

    #[test]
    fn test_local_storage_rejects_escaping_names() {
        let temp = TempDir::new().unwrap();
        let storage = LocalArtifactStorage::new(temp.path());
        assert!(storage.save(b"x", "../outside.png").is_err());
        assert!(storage.save(b"x", "").is_err());
    }
}
