use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::errors::TransportError;

/// Key under which W3C WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a5cbcd0e966";

/// WebDriver code points for special keys.
pub mod keys {
    pub const NULL: char = '\u{E000}';
    pub const ENTER: char = '\u{E007}';
    pub const SHIFT: char = '\u{E008}';
}

/// Handle of a browser window or tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabHandle(pub String);

impl TabHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reference to an element inside the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

/// An explicit browser session driven over the W3C WebDriver HTTP API.
///
/// Every operation goes through the session handle; there is no global
/// driver.
#[derive(Debug, Clone)]
pub struct WebDriverSession {
    base_url: String,
    session_id: String,
    client: reqwest::Client,
}

impl WebDriverSession {
    /// Starts a new session on a running driver (chromedriver, geckodriver).
    pub async fn start(endpoint: &str, capabilities: Value) -> Result<Self, TransportError> {
        let base_url = endpoint.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{base_url}/session"))
            .json(&json!({ "capabilities": capabilities }))
            .send()
            .await
            .map_err(|e| TransportError::Session(format!("Failed to reach {base_url}: {e}")))?;
        let value = Self::unwrap_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Protocol("New session response lacks sessionId".to_string()))?
            .to_string();

        info!("Started WebDriver session {} on {}", session_id, base_url);
        Ok(Self {
            base_url,
            session_id,
            client,
        })
    }

    /// Attaches to a session that is already open.
    pub fn attach(endpoint: &str, session_id: impl Into<String>) -> Self {
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Chrome capabilities keeping the login in a persistent profile directory.
    pub fn chrome_capabilities(user_data_dir: &str, headless: bool) -> Value {
        let mut args = vec![format!("--user-data-dir={user_data_dir}")];
        if headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args }
            }
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn unwrap_value(response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("Failed to parse response: {e}")))?;
        let value = body.get("value").cloned().unwrap_or(Value::Null);

        if let Ok(error) = ErrorValue::deserialize(&value) {
            return Err(match error.error.as_str() {
                "no such element" => TransportError::ElementNotFound(error.message),
                "invalid session id" | "session not created" | "no such window" => {
                    TransportError::Session(format!("{}: {}", error.error, error.message))
                }
                _ => TransportError::Protocol(format!("{}: {}", error.error, error.message)),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Http(format!("Unexpected status {status}")));
        }
        Ok(value)
    }

    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        debug!("{} {}", method, url);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Self::unwrap_value(response).await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), TransportError> {
        self.command(reqwest::Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn current_window(&self) -> Result<TabHandle, TransportError> {
        let value = self.command(reqwest::Method::GET, "/window", None).await?;
        value
            .as_str()
            .map(|handle| TabHandle(handle.to_string()))
            .ok_or_else(|| TransportError::Protocol("Window handle is not a string".to_string()))
    }

    /// Opens a new tab without switching to it.
    pub async fn new_tab(&self) -> Result<TabHandle, TransportError> {
        let value = self
            .command(reqwest::Method::POST, "/window/new", Some(json!({ "type": "tab" })))
            .await?;
        value
            .get("handle")
            .and_then(Value::as_str)
            .map(|handle| TabHandle(handle.to_string()))
            .ok_or_else(|| TransportError::Protocol("New window response lacks handle".to_string()))
    }

    pub async fn switch_to(&self, tab: &TabHandle) -> Result<(), TransportError> {
        self.command(
            reqwest::Method::POST,
            "/window",
            Some(json!({ "handle": tab.as_str() })),
        )
        .await?;
        Ok(())
    }

    /// Closes the current window.
    pub async fn close_window(&self) -> Result<(), TransportError> {
        self.command(reqwest::Method::DELETE, "/window", None).await?;
        Ok(())
    }

    pub async fn set_implicit_wait(&self, millis: u64) -> Result<(), TransportError> {
        self.command(
            reqwest::Method::POST,
            "/timeouts",
            Some(json!({ "implicit": millis })),
        )
        .await?;
        Ok(())
    }

    /// Finds the first element matching `xpath`, `None` if nothing matches.
    pub async fn find_element(&self, xpath: &str) -> Result<Option<ElementRef>, TransportError> {
        let result = self
            .command(
                reqwest::Method::POST,
                "/element",
                Some(json!({ "using": "xpath", "value": xpath })),
            )
            .await;

        match result {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(ElementRef(id.to_string())))
                .ok_or_else(|| TransportError::Protocol("Element reference missing".to_string())),
            Err(TransportError::ElementNotFound(_)) => {
                debug!("No element matches {}", xpath);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`find_element`](Self::find_element) but a miss is an error.
    pub async fn require_element(&self, xpath: &str) -> Result<ElementRef, TransportError> {
        self.find_element(xpath)
            .await?
            .ok_or_else(|| TransportError::ElementNotFound(xpath.to_string()))
    }

    pub async fn click(&self, element: &ElementRef) -> Result<(), TransportError> {
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/click", element.id()),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), TransportError> {
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// Ends the session and closes the browser.
    pub async fn quit(self) -> Result<(), TransportError> {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        match self.client.delete(&url).send().await {
            Ok(response) => {
                Self::unwrap_value(response).await?;
                info!("Closed WebDriver session {}", self.session_id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to close session {}: {}", self.session_id, e);
                Err(e.into())
            }
        }
    }
}
