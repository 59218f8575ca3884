//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Common(#[from] blogsuite_common::Error),

    #[error("WebDriver error: {error} - {message}")]
    WebDriver { error: String, message: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("API request failed: {status} {body}")]
    Api { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User is not signed in. Please sign in first.")]
    NotSignedIn,

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid screenshot payload: {0}")]
    Screenshot(#[from] base64::DecodeError),
}

impl E2eError {
    /// Errors worth retrying: transient browser failures
    pub fn is_webdriver(&self) -> bool {
        matches!(self, E2eError::WebDriver { .. } | E2eError::ElementNotFound(_))
    }
}

impl From<blogsuite_common::CacheError> for E2eError {
    fn from(e: blogsuite_common::CacheError) -> Self {
        E2eError::Common(e.into())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
