//! Reading results straight from the site's own API responses.

use super::retry::RetryPolicy;
use crate::error::{Result, ScrapeError};
use crate::session::{BrowsingSession, NetworkEntry};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Picks JSON API responses out of a session's captured traffic
#[derive(Debug, Clone)]
pub struct TrafficCapture {
    /// Fragment of the request URL that marks the data API
    pub api_path: String,
    /// How long to keep polling an empty network log
    pub polling: RetryPolicy,
}

impl TrafficCapture {
    pub fn new(api_path: impl Into<String>, polling: RetryPolicy) -> Self {
        Self {
            api_path: api_path.into(),
            polling,
        }
    }

    pub fn matches(&self, entry: &NetworkEntry) -> bool {
        entry.url.contains(&self.api_path) && entry.mime_type.contains("json")
    }

    /// Poll until the log has entries, up to the polling bound
    pub fn wait_for_log(&self, session: &mut dyn BrowsingSession) -> Result<Vec<NetworkEntry>> {
        self.polling.run("network log capture", |attempt| {
            let entries = session.capture_network_log()?;
            if entries.is_empty() {
                Err(ScrapeError::TrafficCaptureEmpty { attempts: attempt })
            } else {
                Ok(entries)
            }
        })
    }

    /// Parsed bodies of every matching API response.
    ///
    /// Fails with `TrafficCaptureEmpty` when nothing usable was captured.
    pub fn payloads(&self, session: &mut dyn BrowsingSession) -> Result<Vec<Value>> {
        let entries = self.wait_for_log(session)?;
        debug!("Captured {} network responses", entries.len());

        let mut payloads = Vec::new();
        for entry in entries.iter().filter(|e| self.matches(e)) {
            match fetch_json_body(session, entry) {
                Ok(payload) => payloads.push(payload),
                Err(e) => debug!("Skipping response {}: {}", entry.url, e),
            }
        }

        if payloads.is_empty() {
            return Err(ScrapeError::TrafficCaptureEmpty {
                attempts: self.polling.max_attempts,
            });
        }
        info!("Read {} '{}' payloads", payloads.len(), self.api_path);
        Ok(payloads)
    }
}

/// Fetch a captured response's body over the debug protocol and parse it as JSON
pub fn fetch_json_body(session: &mut dyn BrowsingSession, entry: &NetworkEntry) -> Result<Value> {
    let response = session.run_debug_command(
        "Network.getResponseBody",
        json!({ "requestId": entry.request_id }),
    )?;

    let body = response
        .get("body")
        .and_then(Value::as_str)
        .ok_or_else(|| ScrapeError::parse("body", format!("response {}", entry.request_id)))?;

    if response.get("base64Encoded").and_then(Value::as_bool).unwrap_or(false) {
        let bytes = STANDARD
            .decode(body)
            .map_err(|_| ScrapeError::parse("base64 body", entry.url.clone()))?;
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        Ok(serde_json::from_str(body)?)
    }
}
