//! W3C WebDriver client
//!
//! Talks to a remote WebDriver endpoint (Selenium Grid, chromedriver,
//! geckodriver) over its JSON protocol.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use blogsuite_common::{BrowserConfig, BrowserName};

use crate::error::{E2eError, E2eResult};
use crate::session::{BrowserSession, Locator};

/// Key under which W3C element references are returned
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Browser locale requested from every browser
const LOCALE: &str = "en, en_US";

/// A live WebDriver session
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
}

/// Capabilities for a new session
pub fn capabilities(config: &BrowserConfig) -> E2eResult<Value> {
    let (width, height) = config.window_dimensions()?;
    let window_arg = format!("--window-size={},{}", width, height);

    let mut always_match = json!({
        "browserName": config.name.capability_name(),
        "timeouts": { "implicit": config.implicit_wait_secs * 1000 },
    });

    match config.name {
        BrowserName::Chrome | BrowserName::Edge => {
            let mut args = vec![window_arg];
            if config.headless {
                args.push("--headless=new".to_string());
            }
            let (options_key, logging_key) = match config.name {
                BrowserName::Edge => ("ms:edgeOptions", "ms:loggingPrefs"),
                _ => ("goog:chromeOptions", "goog:loggingPrefs"),
            };
            always_match[logging_key] = json!({ "browser": "ALL", "driver": "ALL" });
            always_match[options_key] = json!({
                "args": args,
                "prefs": { "intl.accept_languages": LOCALE },
            });
        }
        BrowserName::Firefox => {
            let mut args = vec![format!("--width={}", width), format!("--height={}", height)];
            if config.headless {
                args.push("--headless".to_string());
            }
            always_match["moz:firefoxOptions"] = json!({
                "args": args,
                "prefs": { "intl.accept_languages": LOCALE },
            });
        }
    }

    Ok(json!({ "capabilities": { "alwaysMatch": always_match } }))
}

/// Turn a WebDriver response into its `value`, or an error
fn unwrap_value(status: reqwest::StatusCode, body: Value) -> E2eResult<Value> {
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if error == "no such element" {
        return Err(E2eError::ElementNotFound(message));
    }
    Err(E2eError::WebDriver { error, message })
}

fn element_ids(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str).map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> E2eResult<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    unwrap_value(status, body)
}

impl WebDriverSession {
    /// Start a new browser session on the configured remote
    pub async fn start(config: &BrowserConfig) -> E2eResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        let base_url = config.remote_url.trim_end_matches('/').to_string();
        let caps = capabilities(config)?;

        let value = send(&client, Method::POST, &format!("{}/session", base_url), Some(caps)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::WebDriver {
                error: "session not created".to_string(),
                message: "response carried no sessionId".to_string(),
            })?
            .to_string();

        info!("Started {} session {} on {}", config.name.as_str(), session_id, base_url);

        let session = Self {
            client,
            base_url,
            session_id,
        };

        // Firefox ignores window size arguments under some drivers
        let (width, height) = config.window_dimensions()?;
        if let Err(e) = session
            .command(Method::POST, "/window/rect", Some(json!({"width": width, "height": height})))
            .await
        {
            warn!("Could not resize browser window: {}", e);
        }

        Ok(session)
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        send(&self.client, method, &url, body).await
    }

    async fn find_all(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let value = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({"using": "xpath", "value": locator.to_xpath()})),
            )
            .await?;
        Ok(element_ids(value))
    }

    async fn find(&self, locator: &Locator) -> E2eResult<String> {
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::ElementNotFound(locator.to_xpath()))
    }

    async fn element_command(
        &self,
        locator: &Locator,
        method: Method,
        action: &str,
        body: Option<Value>,
    ) -> E2eResult<Value> {
        let element = self.find(locator).await?;
        self.command(method, &format!("/element/{}/{}", element, action), body)
            .await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn navigate_to(&self, url: &str) -> E2eResult<()> {
        debug!("Navigate to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn exists(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(!self.find_all(locator).await?.is_empty())
    }

    async fn is_displayed(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self
            .element_command(locator, Method::GET, "displayed", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.element_command(locator, Method::POST, "click", Some(json!({})))
            .await?;
        Ok(())
    }

    async fn clear(&self, locator: &Locator) -> E2eResult<()> {
        self.element_command(locator, Method::POST, "clear", Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        self.element_command(locator, Method::POST, "value", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> E2eResult<String> {
        let value = self.element_command(locator, Method::GET, "text", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn value(&self, locator: &Locator) -> E2eResult<String> {
        let value = self
            .element_command(locator, Method::GET, "property/value", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot_png(&self) -> E2eResult<Vec<u8>> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value.as_str().unwrap_or_default();
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn quit(&self) -> E2eResult<()> {
        info!("Closing session {}", self.session_id);
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_chrome_capabilities() {
        let config = BrowserConfig {
            headless: true,
            ..Default::default()
        };
        let caps = capabilities(&config).unwrap();
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "chrome");
        assert_eq!(always["timeouts"]["implicit"], 2000);
        let args = always["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--window-size=1920,1080")));
        assert!(args.contains(&json!("--headless=new")));
        assert_eq!(always["goog:loggingPrefs"]["browser"], "ALL");
    }

    #[test]
    fn test_firefox_capabilities() {
        let config = BrowserConfig {
            name: BrowserName::Firefox,
            window_size: "800,600".to_string(),
            ..Default::default()
        };
        let caps = capabilities(&config).unwrap();
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "firefox");
        assert_eq!(always["moz:firefoxOptions"]["args"], json!(["--width=800", "--height=600"]));
        assert_eq!(always["moz:firefoxOptions"]["prefs"]["intl.accept_languages"], LOCALE);
    }

    #[test]
    fn test_invalid_window_size() {
        let config = BrowserConfig {
            window_size: "wide".to_string(),
            ..Default::default()
        };
        assert!(capabilities(&config).is_err());
    }

    #[test]
    fn test_error_responses() {
        let missing = unwrap_value(
            StatusCode::NOT_FOUND,
            json!({"value": {"error": "no such element", "message": "//a"}}),
        );
        assert!(matches!(missing, Err(E2eError::ElementNotFound(m)) if m == "//a"));

        let stale = unwrap_value(
            StatusCode::NOT_FOUND,
            json!({"value": {"error": "stale element reference", "message": "gone"}}),
        )
        .unwrap_err();
        assert!(stale.is_webdriver());

        let ok = unwrap_value(StatusCode::OK, json!({"value": "http://app/"})).unwrap();
        assert_eq!(ok, "http://app/");
    }

    #[test]
    fn test_element_ids() {
        let value = json!([{(ELEMENT_KEY): "a"}, {"other": "x"}, {(ELEMENT_KEY): "b"}]);
        assert_eq!(element_ids(value), vec!["a", "b"]);
        assert!(element_ids(Value::Null).is_empty());
    }
}
