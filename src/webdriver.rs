//! W3C WebDriver client over plain JSON/HTTP, plus session acquisition.
//!
//! Talks to a chromedriver endpoint with the blocking reqwest client; the
//! rest of the crate only sees the [`Session`] trait.

use std::thread;
use std::time::Duration;

use log::{info, warn};
use serde_json::{json, Value};

use crate::browser::{Element, Locator, Session};
use crate::error::{ScrapeError, SessionError};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub page_load_timeout: Duration,
    pub script_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
            max_attempts: 3,
            backoff: Duration::from_secs(5),
            page_load_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(30),
        }
    }
}

/// Acquires and releases the one browser session a run owns.
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        SessionManager { config }
    }

    /// Retry session creation with a fixed backoff between attempts.
    pub fn acquire(&self) -> Result<WebDriverSession, ScrapeError> {
        let mut last = String::new();
        for attempt in 1..=self.config.max_attempts {
            match WebDriverSession::create(&self.config) {
                Ok(session) => {
                    info!("browser session acquired (attempt {attempt})");
                    return Ok(session);
                }
                Err(e) => {
                    warn!(
                        "session init attempt {attempt}/{} failed: {e}",
                        self.config.max_attempts
                    );
                    last = e.to_string();
                    if attempt < self.config.max_attempts {
                        thread::sleep(self.config.backoff);
                    }
                }
            }
        }
        Err(ScrapeError::SessionInit {
            attempts: self.config.max_attempts,
            last,
        })
    }
}

/// Is the WebDriver endpoint up? Used by the preflight check.
pub fn endpoint_ready(webdriver_url: &str) -> Result<bool, SessionError> {
    let http = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let body: Value = http
        .get(format!("{webdriver_url}/status"))
        .send()?
        .json()?;
    Ok(body["value"]["ready"].as_bool().unwrap_or(false))
}

pub struct WebDriverSession {
    http: reqwest::blocking::Client,
    session_url: String,
    released: bool,
}

impl WebDriverSession {
    fn create(config: &SessionConfig) -> Result<Self, SessionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;

        let mut args = vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--window-size=1920,1080".to_string(),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }

        let payload = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "excludeSwitches": ["enable-automation"],
                    },
                    "timeouts": {
                        "pageLoad": config.page_load_timeout.as_millis() as u64,
                        "script": config.script_timeout.as_millis() as u64,
                    },
                }
            }
        });

        let body: Value = http
            .post(format!("{}/session", config.webdriver_url))
            .json(&payload)
            .send()?
            .json()?;
        let value = unwrap_value(body)?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| SessionError::Wire("missing sessionId".into()))?;

        Ok(WebDriverSession {
            http,
            session_url: format!("{}/session/{}", config.webdriver_url, session_id),
            released: false,
        })
    }

    fn post(&self, path: &str, body: Value) -> Result<Value, SessionError> {
        let response: Value = self
            .http
            .post(format!("{}/{path}", self.session_url))
            .json(&body)
            .send()?
            .json()?;
        unwrap_value(response)
    }

    fn get(&self, path: &str) -> Result<Value, SessionError> {
        let response: Value = self
            .http
            .get(format!("{}/{path}", self.session_url))
            .send()?
            .json()?;
        unwrap_value(response)
    }

    fn execute(&self, script: &str, args: Value) -> Result<Value, SessionError> {
        self.post("execute/sync", json!({ "script": script, "args": args }))
    }

    fn find_in(&self, path: &str, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        let (using, value) = locator.wire();
        let body = self.post(path, json!({ "using": using, "value": value }))?;
        let list = body
            .as_array()
            .ok_or_else(|| SessionError::Wire("expected element array".into()))?;
        list.iter().map(element_from_value).collect()
    }
}

fn unwrap_value(mut response: Value) -> Result<Value, SessionError> {
    let value = response["value"].take();
    if let Some(error) = value["error"].as_str() {
        return Err(SessionError::Protocol {
            error: error.to_string(),
            message: value["message"].as_str().unwrap_or("").to_string(),
        });
    }
    Ok(value)
}

fn element_from_value(value: &Value) -> Result<Element, SessionError> {
    value[ELEMENT_KEY]
        .as_str()
        .map(|id| Element(id.to_string()))
        .ok_or_else(|| SessionError::Wire("missing element reference".into()))
}

fn element_arg(element: &Element) -> Value {
    json!({ ELEMENT_KEY: element.0 })
}

fn is_missing(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::Protocol { error, .. }
            if error == "no such element" || error == "stale element reference"
    )
}

impl Session for WebDriverSession {
    fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.post("url", json!({ "url": url })).map(|_| ())
    }

    fn find(&self, locator: &Locator) -> Result<Option<Element>, SessionError> {
        let (using, value) = locator.wire();
        match self.post("element", json!({ "using": using, "value": value })) {
            Ok(v) => Ok(Some(element_from_value(&v)?)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        self.find_in("elements", locator)
    }

    fn find_within(
        &self,
        parent: &Element,
        locator: &Locator,
    ) -> Result<Vec<Element>, SessionError> {
        match self.find_in(&format!("element/{}/elements", parent.0), locator) {
            Ok(els) => Ok(els),
            Err(e) if is_missing(&e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn click(&self, element: &Element) -> Result<(), SessionError> {
        self.post(&format!("element/{}/click", element.0), json!({}))
            .map(|_| ())
    }

    fn type_text(&self, element: &Element, text: &str) -> Result<(), SessionError> {
        self.post(
            &format!("element/{}/value", element.0),
            json!({ "text": text }),
        )
        .map(|_| ())
    }

    fn clear(&self, element: &Element) -> Result<(), SessionError> {
        self.post(&format!("element/{}/clear", element.0), json!({}))
            .map(|_| ())
    }

    fn text(&self, element: &Element) -> Result<String, SessionError> {
        let value = self.get(&format!("element/{}/text", element.0))?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    fn attribute(
        &self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let value = self.get(&format!("element/{}/attribute/{name}", element.0))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn value(&self, element: &Element) -> Result<Option<String>, SessionError> {
        let value = self.get(&format!("element/{}/property/value", element.0))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn inject_value(&self, element: &Element, value: &str) -> Result<(), SessionError> {
        self.execute(
            "arguments[0].value = arguments[1]; \
             arguments[0].dispatchEvent(new Event('input', { bubbles: true })); \
             arguments[0].dispatchEvent(new Event('change', { bubbles: true }));",
            json!([element_arg(element), value]),
        )
        .map(|_| ())
    }

    fn is_displayed(&self, element: &Element) -> Result<bool, SessionError> {
        let value = self.execute(
            "const el = arguments[0]; \
             if (!(el.offsetWidth || el.offsetHeight || el.getClientRects().length)) return false; \
             return window.getComputedStyle(el).visibility !== 'hidden';",
            json!([element_arg(element)]),
        )?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn is_enabled(&self, element: &Element) -> Result<bool, SessionError> {
        let value = self.get(&format!("element/{}/enabled", element.0))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn scroll_to_bottom(&self, element: Option<&Element>) -> Result<(), SessionError> {
        match element {
            Some(el) => self
                .execute(
                    "arguments[0].scrollTop = arguments[0].scrollHeight;",
                    json!([element_arg(el)]),
                )
                .map(|_| ()),
            None => self
                .execute(
                    "window.scrollTo(0, document.body.scrollHeight);",
                    json!([]),
                )
                .map(|_| ()),
        }
    }

    fn window_handles(&self) -> Result<Vec<String>, SessionError> {
        let value = self.get("window/handles")?;
        Ok(value
            .as_array()
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|h| h.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn switch_window(&self, handle: &str) -> Result<(), SessionError> {
        self.post("window", json!({ "handle": handle })).map(|_| ())
    }

    fn document_ready(&self) -> Result<bool, SessionError> {
        let value = self.execute("return document.readyState;", json!([]))?;
        Ok(value.as_str() == Some("complete"))
    }

    fn quit(&mut self) -> Result<(), SessionError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if let Err(e) = self.http.delete(&self.session_url).send() {
            warn!("browser session teardown failed: {e}");
        } else {
            info!("browser session released");
        }
        Ok(())
    }
}

// Backstop for panic and early-return paths; normal runs release
// explicitly through the controller.
impl Drop for WebDriverSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}
