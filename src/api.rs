//! Xtream Codes API client with retry and response validation.

use std::io::Read;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::error::{Result, ScoutError};

/// Delay between retry attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct XtreamClient {
    agent: ureq::Agent,
    creds: Credentials,
    base_url: String,
}

impl XtreamClient {
    pub fn new(creds: &Credentials) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_global(Some(READ_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .new_agent();

        Self {
            agent,
            base_url: creds.base_url(),
            creds: creds.clone(),
        }
    }

    fn api_url(&self, action: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}/player_api.php?username={}&password={}&action={}",
            self.base_url, self.creds.username, self.creds.password, action
        );
        for (name, value) in params {
            url.push_str(&format!("&{name}={value}"));
        }
        url
    }

    /// Account/server info from the bare endpoint. Doubles as the
    /// authentication check: the provider answers `user_info.auth = 0` for
    /// bad credentials instead of an HTTP error.
    pub fn account_info(&self) -> Result<Value> {
        let url = format!(
            "{}/player_api.php?username={}&password={}",
            self.base_url, self.creds.username, self.creds.password
        );
        let body = self.fetch_text(&url, "user_info")?;
        let account: Value =
            serde_json::from_str(&body).map_err(|e| ScoutError::InvalidResponse {
                what: "user_info".to_string(),
                reason: e.to_string(),
            })?;
        if auth_rejected(&account) {
            return Err(ScoutError::AuthenticationFailed {
                server: self.creds.server.clone(),
            });
        }
        Ok(account)
    }

    /// Fetch a listing endpoint, returning the raw body after validating
    /// that it is well-formed JSON and not an auth-rejection payload.
    pub fn fetch_listing(&self, action: &str, params: &[(&str, String)]) -> Result<String> {
        let url = self.api_url(action, params);
        let body = self.fetch_text(&url, action)?;
        let value: Value = serde_json::from_str(&body).map_err(|e| ScoutError::InvalidResponse {
            what: action.to_string(),
            reason: e.to_string(),
        })?;
        if auth_rejected(&value) {
            return Err(ScoutError::AuthenticationFailed {
                server: self.creds.server.clone(),
            });
        }
        Ok(body)
    }

    /// Per-channel guide lookup. Cheap and volatile, never cached.
    pub fn short_epg(&self, stream_id: i64) -> Result<Value> {
        let url = self.api_url("get_short_epg", &[("stream_id", stream_id.to_string())]);
        let body = self.fetch_text(&url, "get_short_epg")?;
        serde_json::from_str(&body).map_err(|e| ScoutError::InvalidResponse {
            what: "get_short_epg".to_string(),
            reason: e.to_string(),
        })
    }

    /// Full XMLTV guide, as raw bytes. Some providers answer gzip-compressed
    /// regardless of request headers; decompression lives in [`crate::epg`].
    pub fn xmltv(&self) -> Result<Vec<u8>> {
        let url = format!(
            "{}/xmltv.php?username={}&password={}",
            self.base_url, self.creds.username, self.creds.password
        );
        let body = self.fetch_bytes(&url, "xmltv")?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ScoutError::InvalidResponse {
                what: "xmltv".to_string(),
                reason: "empty guide body".to_string(),
            });
        }
        Ok(body)
    }

    fn fetch_text(&self, url: &str, what: &str) -> Result<String> {
        let body = self.fetch_bytes(url, what)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// GET `url`, retrying transport failures and non-success statuses.
    /// HTTP 401/403 abort immediately: the provider is reachable and is
    /// rejecting the credentials.
    fn fetch_bytes(&self, url: &str, what: &str) -> Result<Vec<u8>> {
        with_retries(self.creds.retries.max(1), RETRY_DELAY, what, |_| {
            let response = match self
                .agent
                .get(url)
                .header("User-Agent", self.creds.user_agent.as_str())
                .call()
            {
                Ok(response) => response,
                Err(e) => return Attempt::Transient(e.to_string()),
            };

            let status = response.status();
            if status == 401 || status == 403 {
                return Attempt::Fatal(ScoutError::AuthenticationFailed {
                    server: self.creds.server.clone(),
                });
            }
            if !status.is_success() {
                return Attempt::Transient(format!("HTTP {status}"));
            }

            let mut body = Vec::new();
            match response.into_body().into_reader().read_to_end(&mut body) {
                Ok(_) => {
                    debug!("{what}: received {} bytes", body.len());
                    Attempt::Ok(body)
                }
                Err(e) => Attempt::Transient(format!("read failed: {e}")),
            }
        })
    }
}

/// Outcome of one request attempt.
enum Attempt<T> {
    Ok(T),
    /// Abort immediately, no further attempts.
    Fatal(ScoutError),
    /// Worth another attempt.
    Transient(String),
}

/// Run `try_once` up to `attempts` times with `delay` between tries.
/// `attempts = 3` means exactly three calls, not four.
fn with_retries<T>(
    attempts: u32,
    delay: Duration,
    what: &str,
    mut try_once: impl FnMut(u32) -> Attempt<T>,
) -> Result<T> {
    let mut last_reason = String::from("no attempts made");
    for attempt in 1..=attempts {
        if attempt > 1 {
            thread::sleep(delay);
        }
        match try_once(attempt) {
            Attempt::Ok(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Transient(reason) => {
                warn!("{what}: attempt {attempt}/{attempts} failed: {reason}");
                last_reason = reason;
            }
        }
    }
    Err(ScoutError::ProviderUnreachable {
        attempts,
        reason: last_reason,
    })
}

/// Detect the provider's explicit invalid-credentials payload.
fn auth_rejected(payload: &Value) -> bool {
    match payload.pointer("/user_info/auth") {
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s == "0" || s.eq_ignore_ascii_case("false"),
        _ => false,
    }
}
