use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverErrorKind};
use crate::storage::{Cookie, LocalStorageEntry, OriginState, StorageState};
use crate::transport::{CdpTransport, CommandTarget};

/// A visible element located on the page, addressed by the centre of its
/// bounding box in viewport coordinates.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Element {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Page-level operations the sweep logic needs. `ChromeDriver` is the real
/// implementation; tests substitute scripted ones.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates and waits for `Page.domContentEventFired` on this page,
    /// bounded by the navigation deadline. A quiet deadline is not an
    /// error; a navigation the browser refuses to start is.
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Evaluates a script in the page, returning its value by JSON.
    async fn eval(&self, expression: &str) -> Result<Value, DriverError>;

    /// Dispatches a left-button press/release pair at viewport coordinates.
    async fn click(&self, x: f64, y: f64) -> Result<(), DriverError>;

    /// First visible element matching `selector` whose trimmed inner text
    /// contains `text`, case-insensitively.
    async fn find_control(&self, selector: &str, text: &str)
        -> Result<Option<Element>, DriverError>;

    /// Like [`find_control`](Self::find_control) but the trimmed inner text
    /// must equal `text` exactly.
    async fn find_control_exact(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Option<Element>, DriverError>;

    /// Finds a control and clicks it. Returns whether one was found.
    async fn click_control(&self, selector: &str, text: &str) -> Result<bool, DriverError> {
        match self.find_control(selector, text).await? {
            Some(element) => {
                debug!(target: "cdp-driver", text = %element.text, "clicking control");
                self.click(element.x, element.y).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scroll_by(&self, pixels: f64) -> Result<(), DriverError> {
        self.eval(&format!("window.scrollBy(0, {pixels})")).await?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<(), DriverError> {
        self.eval("window.scrollTo(0, 0)").await?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.eval("window.scrollTo(0, document.body ? document.body.scrollHeight : 0)")
            .await?;
        Ok(())
    }

    async fn page_height(&self) -> Result<f64, DriverError> {
        let value = self
            .eval("document.body ? document.body.scrollHeight : 0")
            .await?;
        Ok(value.as_f64().unwrap_or(0.0))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let value = self.eval("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

/// Drives a single page in a launched Chrome over raw CDP.
pub struct ChromeDriver {
    transport: CdpTransport,
    session_id: String,
    cfg: DriverConfig,
}

impl ChromeDriver {
    /// Launches Chrome (or attaches to `websocket_url`), opens a blank page
    /// and attaches to it with a flat session.
    pub async fn launch(cfg: DriverConfig) -> Result<Self, DriverError> {
        let transport = CdpTransport::connect(cfg.clone()).await?;

        let created = transport
            .send(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("Target.createTarget returned no targetId")
            })?
            .to_string();

        let attached = transport
            .send(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("Target.attachToTarget returned no sessionId")
            })?
            .to_string();

        let driver = Self {
            transport,
            session_id,
            cfg,
        };

        driver
            .transport
            .send(driver.session(), "Page.enable", json!({}))
            .await?;

        info!(target: "cdp-driver", target_id = %target_id, "page session attached");
        Ok(driver)
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    fn session(&self) -> CommandTarget {
        CommandTarget::Session(self.session_id.clone())
    }

    /// Installs the cookies from a saved session into the browser.
    pub async fn restore_cookies(&self, state: &StorageState) -> Result<(), DriverError> {
        let cookies = state.cookie_params();
        if cookies.is_empty() {
            debug!(target: "cdp-driver", "no cookies to restore");
            return Ok(());
        }

        let count = cookies.len();
        self.transport
            .send(
                self.session(),
                "Network.setCookies",
                json!({ "cookies": cookies }),
            )
            .await?;
        info!(target: "cdp-driver", count, "cookies restored");
        Ok(())
    }

    /// Writes saved localStorage entries into the current origin. The page
    /// must already be on that origin for the values to land where the app
    /// reads them.
    pub async fn seed_local_storage(
        &self,
        entries: &[LocalStorageEntry],
    ) -> Result<(), DriverError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.eval(&seed_local_storage_js(entries)).await?;
        debug!(target: "cdp-driver", count = entries.len(), "localStorage seeded");
        Ok(())
    }

    /// Snapshots cookies and the current origin's localStorage in the saved
    /// session format.
    pub async fn capture_session(&self) -> Result<StorageState, DriverError> {
        let resp = self
            .transport
            .send(self.session(), "Network.getAllCookies", json!({}))
            .await?;
        let cookies: Vec<Cookie> = match resp.get("cookies") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|err| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint(format!("unexpected cookie payload: {err}"))
            })?,
            None => Vec::new(),
        };

        let origin = self
            .eval("location.origin")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();

        let origins = if origin.is_empty() || origin == "null" {
            Vec::new()
        } else {
            let raw = self.eval(LOCAL_STORAGE_DUMP_JS).await?;
            let local_storage: Vec<LocalStorageEntry> =
                serde_json::from_value(raw).map_err(|err| {
                    DriverError::new(DriverErrorKind::Internal)
                        .with_hint(format!("unexpected localStorage payload: {err}"))
                })?;
            vec![OriginState {
                origin,
                local_storage,
            }]
        };

        Ok(StorageState { cookies, origins })
    }

    /// Asks the browser to shut down. Best effort: the connection dropping
    /// mid-command is the expected outcome.
    pub async fn close(self) {
        let result = self
            .transport
            .send_with_deadline(
                CommandTarget::Browser,
                "Browser.close",
                json!({}),
                Duration::from_secs(5),
            )
            .await;
        if let Err(err) = result {
            debug!(target: "cdp-driver", ?err, "browser close raced connection teardown");
        }
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut events = self.transport.subscribe();
        let nav_deadline = Duration::from_millis(self.cfg.nav_deadline_ms);

        let resp = self
            .transport
            .send_with_deadline(
                self.session(),
                "Page.navigate",
                json!({ "url": url }),
                nav_deadline,
            )
            .await?;

        if let Some(error_text) = resp.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(DriverError::new(DriverErrorKind::NavTimeout)
                    .with_hint(format!("navigation failed: {error_text}"))
                    .retriable(true));
            }
        }

        let deadline = tokio::time::Instant::now() + nav_deadline;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, events.recv()).await {
                Ok(Ok(event)) => {
                    if event.method == "Page.domContentEventFired"
                        && event.session_id.as_deref() == Some(self.session_id.as_str())
                    {
                        debug!(target: "cdp-driver", url, "dom content fired");
                        return Ok(());
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(target: "cdp-driver", skipped, "event stream lagged during navigation");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(DriverError::new(DriverErrorKind::SessionClosed)
                        .with_hint("event stream closed during navigation"));
                }
                Err(_) => {
                    // SPAs rarely fire the event on soft navigations; the
                    // page is usually usable anyway, so carry on.
                    warn!(
                        target: "cdp-driver",
                        url,
                        deadline_ms = self.cfg.nav_deadline_ms,
                        "no domContentEventFired before the deadline, proceeding"
                    );
                    return Ok(());
                }
            }
        }
    }

    async fn eval(&self, expression: &str) -> Result<Value, DriverError> {
        let params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        let resp = self
            .transport
            .send(self.session(), "Runtime.evaluate", params)
            .await?;

        if let Some(details) = resp.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unspecified javascript exception");
            return Err(DriverError::new(DriverErrorKind::EvalFailed).with_hint(text.to_string()));
        }

        Ok(resp
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn click(&self, x: f64, y: f64) -> Result<(), DriverError> {
        for phase in ["mousePressed", "mouseReleased"] {
            self.transport
                .send(
                    self.session(),
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": phase,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn find_control(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Option<Element>, DriverError> {
        let value = self.eval(&find_control_js(selector, text, false)).await?;
        parse_element(value)
    }

    async fn find_control_exact(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Option<Element>, DriverError> {
        let value = self.eval(&find_control_js(selector, text, true)).await?;
        parse_element(value)
    }
}

const LOCAL_STORAGE_DUMP_JS: &str = r#"(() => {
    const out = [];
    for (let i = 0; i < localStorage.length; i++) {
        const key = localStorage.key(i);
        out.push({ name: key, value: localStorage.getItem(key) });
    }
    return out;
})()"#;

fn parse_element(value: Value) -> Result<Option<Element>, DriverError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("unexpected element payload: {err}"))
        })
}

fn find_control_js(selector: &str, text: &str, exact: bool) -> String {
    let selector = Value::String(selector.to_string()).to_string();
    let needle = Value::String(text.to_string()).to_string();
    let matcher = if exact {
        "t === needle"
    } else {
        "t.toLowerCase().includes(needle.toLowerCase())"
    };
    format!(
        r#"(() => {{
    const needle = {needle};
    for (const el of document.querySelectorAll({selector})) {{
        const r = el.getBoundingClientRect();
        if (r.width <= 0 || r.height <= 0) continue;
        const t = (el.innerText || '').trim();
        if ({matcher}) {{
            return {{ x: r.x + r.width / 2, y: r.y + r.height / 2, text: t }};
        }}
    }}
    return null;
}})()"#
    )
}

fn seed_local_storage_js(entries: &[LocalStorageEntry]) -> String {
    let mut body = String::new();
    for entry in entries {
        let key = Value::String(entry.name.clone()).to_string();
        let value = Value::String(entry.value.clone()).to_string();
        body.push_str(&format!("    localStorage.setItem({key}, {value});\n"));
    }
    format!("(() => {{\n{body}    return true;\n}})()")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_script_escapes_quotes_in_needle() {
        let js = find_control_js("button", r#"he said "hi""#, false);
        assert!(js.contains(r#"he said \"hi\""#));
        assert!(js.contains(".includes("));
    }

    #[test]
    fn exact_control_script_compares_strictly() {
        let js = find_control_js("a[role='tab']", "All", true);
        assert!(js.contains("t === needle"));
        assert!(!js.contains(".includes("));
    }

    #[test]
    fn seed_script_inlines_every_entry() {
        let entries = vec![
            LocalStorageEntry {
                name: "token".into(),
                value: "abc123".into(),
            },
            LocalStorageEntry {
                name: "flags".into(),
                value: r#"{"beta":true}"#.into(),
            },
        ];
        let js = seed_local_storage_js(&entries);
        assert_eq!(js.matches("localStorage.setItem(").count(), 2);
        assert!(js.contains(r#"localStorage.setItem("token", "abc123");"#));
        assert!(js.contains(r#"\"beta\""#));
    }

    #[test]
    fn element_payload_round_trips() {
        let parsed = parse_element(json!({ "x": 10.5, "y": 42.0, "text": "Delete" }))
            .expect("valid payload");
        assert_eq!(
            parsed,
            Some(Element {
                x: 10.5,
                y: 42.0,
                text: "Delete".into()
            })
        );
    }

    #[test]
    fn null_payload_means_no_match() {
        assert_eq!(parse_element(Value::Null).expect("null is fine"), None);
    }

    #[test]
    fn malformed_payload_is_an_internal_error() {
        let err = parse_element(json!({ "x": "oops" })).expect_err("missing fields");
        assert_eq!(err.kind, DriverErrorKind::Internal);
    }
}
