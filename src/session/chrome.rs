use super::{BrowsingSession, Locator, NetworkEntry, SessionFactory, TabHandle};
use crate::config::BrowserSettings;
use anyhow::{anyhow, bail, Context, Result};
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const RESPONSE_HANDLER: &str = "rental-scout-capture";

// Chrome exits once idle for this long; detail-page waits can be slow
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

const CLEAR_STORAGE_SCRIPT: &str = r#"
    document.cookie.split(';').forEach(function (c) {
        document.cookie = c.replace(/^ +/, '').replace(/=.*/, '=;expires=' + new Date(0).toUTCString() + ';path=/');
    });
    try { window.localStorage.clear(); window.sessionStorage.clear(); } catch (e) {}
"#;

/// Browser-backed session using headless Chrome
pub struct ChromeSession {
    settings: BrowserSettings,
    browser: Browser,
    tabs: Vec<Arc<Tab>>,
    current: usize,
    network_log: Arc<Mutex<Vec<NetworkEntry>>>,
}

impl ChromeSession {
    /// Launch a browser with one primary tab recording its network responses
    pub fn launch(settings: BrowserSettings) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .window_size(Some((settings.window_width, settings.window_height)))
            .path(settings.chrome_path.clone())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open primary tab")?;

        let network_log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&network_log);
        tab.register_response_handling(
            RESPONSE_HANDLER,
            Box::new(move |params: ResponseReceivedEventParams, _fetch_body| {
                let entry = NetworkEntry {
                    request_id: params.request_id,
                    url: params.response.url,
                    mime_type: params.response.mime_type,
                };
                sink.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
            }),
        )
        .context("Failed to enable network capture")?;

        Ok(Self {
            settings,
            browser,
            tabs: vec![tab],
            current: 0,
            network_log,
        })
    }

    fn tab(&self) -> &Arc<Tab> {
        &self.tabs[self.current]
    }

    fn handle_of(tab: &Tab) -> TabHandle {
        TabHandle(tab.get_target_id().to_string())
    }
}

impl BrowsingSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        let tab = self.tab();
        tab.navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        tab.wait_until_navigated()
            .with_context(|| format!("Page never finished loading: {}", url))?;
        Ok(())
    }

    fn page_source(&mut self) -> Result<String> {
        self.tab().get_content().context("Failed to read page HTML")
    }

    fn wait_for_selector(&mut self, locator: &Locator, timeout: Duration) -> bool {
        let tab = self.tab();
        let found = match locator {
            Locator::Css(selector) => tab.wait_for_element_with_custom_timeout(selector, timeout).is_ok(),
            Locator::XPath(xpath) => tab.wait_for_xpath_with_custom_timeout(xpath, timeout).is_ok(),
        };
        if !found {
            debug!("'{}' did not appear within {:?}", locator, timeout);
        }
        found
    }

    fn click(&mut self, locator: &Locator) -> Result<()> {
        let tab = self.tab();
        let element = match locator {
            Locator::Css(selector) => tab.find_element(selector)?,
            Locator::XPath(xpath) => tab.find_element_by_xpath(xpath)?,
        };
        element.click()?;
        Ok(())
    }

    fn open_background_tab(&mut self, url: &str) -> Result<TabHandle> {
        let tab = self.browser.new_tab().context("Failed to open tab")?;
        tab.navigate_to(url)
            .with_context(|| format!("Failed to open {} in a new tab", url))?;
        let handle = Self::handle_of(&tab);
        self.tabs.push(tab);
        Ok(handle)
    }

    fn switch_to(&mut self, handle: &TabHandle) -> Result<()> {
        self.current = self
            .tabs
            .iter()
            .position(|tab| Self::handle_of(tab) == *handle)
            .ok_or_else(|| anyhow!("No open tab with id {}", handle.0))?;
        Ok(())
    }

    fn close_current_tab(&mut self) -> Result<()> {
        if self.current == 0 {
            bail!("Refusing to close the primary tab");
        }
        let tab = self.tabs.remove(self.current);
        self.current = 0;
        if let Err(e) = tab.close(true) {
            warn!("Failed to close tab {}: {}", tab.get_target_id(), e);
        }
        Ok(())
    }

    fn list_open_handles(&self) -> Vec<TabHandle> {
        self.tabs.iter().map(|tab| Self::handle_of(tab)).collect()
    }

    fn capture_network_log(&mut self) -> Result<Vec<NetworkEntry>> {
        let mut log = self.network_log.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *log))
    }

    fn run_debug_command(&mut self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        match method {
            "Network.getResponseBody" => {
                let request_id = params
                    .get("requestId")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("{} needs a requestId", method))?;
                let response = self.tab().call_method(Network::GetResponseBody {
                    request_id: request_id.to_string(),
                })?;
                Ok(json!({
                    "body": response.body,
                    "base64Encoded": response.base_64_encoded,
                }))
            }
            other => bail!("Unsupported debug command: {}", other),
        }
    }

    fn run_script(&mut self, code: &str) -> Result<Option<serde_json::Value>> {
        let result = self.tab().evaluate(code, false)?;
        Ok(result.value)
    }

    fn restart(&mut self) -> Result<()> {
        info!("Restarting browser session with a clean profile");
        if let Err(e) = self.run_script(CLEAR_STORAGE_SCRIPT) {
            warn!("Failed to clear cookies before restart: {}", e);
        }
        // Replacing the session drops the old browser, which kills its process
        *self = Self::launch(self.settings.clone())?;
        Ok(())
    }
}

/// Launches one Chrome instance per extractor task
#[derive(Debug, Clone, Default)]
pub struct ChromeSessionFactory {
    settings: BrowserSettings,
}

impl ChromeSessionFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl SessionFactory for ChromeSessionFactory {
    fn create(&self) -> Result<Box<dyn BrowsingSession>> {
        Ok(Box::new(ChromeSession::launch(self.settings.clone())?))
    }
}
