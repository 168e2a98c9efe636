//! The browser capability extractors drive.
//!
//! Extraction code only sees [`BrowsingSession`]; the `headless_chrome`
//! implementation lives in [`chrome`].

pub mod chrome;

use anyhow::Result;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use chrome::{ChromeSession, ChromeSessionFactory};

/// How to find an element on the rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) | Locator::XPath(s) => f.write_str(s),
        }
    }
}

/// Opaque identifier of an open tab
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabHandle(pub String);

/// A response observed on the wire while the session was browsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub request_id: String,
    pub url: String,
    pub mime_type: String,
}

/// A rendering browser the extractors can steer.
///
/// Waits are bounded by the timeout passed in and report absence as `false`
/// rather than an error.
pub trait BrowsingSession {
    /// Load `url` in the current tab
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// HTML of the current tab after rendering
    fn page_source(&mut self) -> Result<String>;

    /// Block until `locator` matches or `timeout` passes
    fn wait_for_selector(&mut self, locator: &Locator, timeout: Duration) -> bool;

    fn click(&mut self, locator: &Locator) -> Result<()>;

    /// Open `url` in a new tab without switching to it
    fn open_background_tab(&mut self, url: &str) -> Result<TabHandle>;

    fn switch_to(&mut self, handle: &TabHandle) -> Result<()>;

    /// Close the current tab and fall back to the first one
    fn close_current_tab(&mut self) -> Result<()>;

    /// Open tabs, the primary tab first
    fn list_open_handles(&self) -> Vec<TabHandle>;

    /// Drain the responses captured since the last call
    fn capture_network_log(&mut self) -> Result<Vec<NetworkEntry>>;

    /// Send a raw DevTools protocol command
    fn run_debug_command(&mut self, method: &str, params: serde_json::Value) -> Result<serde_json::Value>;

    fn run_script(&mut self, code: &str) -> Result<Option<serde_json::Value>>;

    /// Drop cookies and relaunch with a clean profile
    fn restart(&mut self) -> Result<()>;

    /// Parsed DOM of the current tab
    fn current_document(&mut self) -> Result<Html> {
        Ok(Html::parse_document(&self.page_source()?))
    }
}

/// Hands out a fresh session per extractor task
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn BrowsingSession>>;
}
