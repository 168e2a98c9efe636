#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use rental_scout::config::{EngineSettings, LocationCodes, SearchCriteria, TripDates};
use rental_scout::geo::Coordinate;
use rental_scout::session::{BrowsingSession, Locator, NetworkEntry, SessionFactory, TabHandle};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Four nights in Lisbon for four guests, at most 30€ a night each and 50 km out
pub fn criteria() -> SearchCriteria {
    SearchCriteria {
        destination: "Portugal".to_string(),
        origin: Coordinate::new(38.72, -9.14),
        max_distance_km: 50.0,
        max_price_per_night: 30,
        occupancy: 4,
        dates: TripDates::Fixed {
            check_in: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 7, 8).unwrap(),
        },
        pool: false,
        location_codes: LocationCodes { mediaferias: 3, vrbo: 6009 },
        wait_timeout: Duration::from_millis(10),
    }
}

/// Engine bounds with every delay removed
pub fn fast_engine() -> EngineSettings {
    EngineSettings {
        capture_delay_secs: 0,
        restart_delay_secs: 0,
        ..EngineSettings::default()
    }
}

/// A page the fake browser can render
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub html: String,
    /// XPath locators that match on this page
    pub xpath: Vec<String>,
    /// Locator text -> url loaded when it is clicked
    pub clicks: HashMap<String, String>,
}

impl FakePage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    pub fn with_xpath(mut self, xpath: &str) -> Self {
        self.xpath.push(xpath.to_string());
        self
    }

    pub fn on_click(mut self, locator: &str, url: &str) -> Self {
        self.clicks.insert(locator.to_string(), url.to_string());
        self
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Css(css) => match Selector::parse(css) {
                Ok(selector) => Html::parse_document(&self.html).select(&selector).next().is_some(),
                Err(_) => false,
            },
            Locator::XPath(xpath) => self.xpath.iter().any(|x| x == xpath),
        }
    }
}

/// Scripted in-memory browser. Unknown urls render as empty pages.
#[derive(Debug)]
pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    tabs: Vec<(TabHandle, String)>,
    current: usize,
    next_tab: usize,
    generation: u32,
    network: HashMap<u32, Vec<NetworkEntry>>,
    bodies: HashMap<String, String>,
    dropped: Option<Arc<AtomicUsize>>,
    unreachable: Vec<String>,

    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub scripts: usize,
    pub restarts: u32,
    pub opened_tabs: usize,
    pub max_open_tabs: usize,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            tabs: vec![(TabHandle("tab-0".to_string()), String::new())],
            current: 0,
            next_tab: 1,
            generation: 0,
            network: HashMap::new(),
            bodies: HashMap::new(),
            dropped: None,
            unreachable: Vec::new(),
            navigations: Vec::new(),
            clicks: Vec::new(),
            scripts: 0,
            restarts: 0,
            opened_tabs: 0,
            max_open_tabs: 1,
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, page: FakePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// API responses captured during the given session generation (0 before
    /// any restart)
    pub fn with_traffic(mut self, generation: u32, responses: Vec<(&str, &str, Value)>) -> Self {
        for (request_id, url, body) in responses {
            self.network.entry(generation).or_default().push(NetworkEntry {
                request_id: request_id.to_string(),
                url: url.to_string(),
                mime_type: "application/json".to_string(),
            });
            self.bodies.insert(request_id.to_string(), body.to_string());
        }
        self
    }

    /// Navigating to, or opening a tab on, this url times out
    pub fn unreachable(mut self, url: impl Into<String>) -> Self {
        self.unreachable.push(url.into());
        self
    }

    pub fn counting_drops(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.dropped = Some(counter);
        self
    }

    pub fn open_tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn current_url(&self) -> &str {
        &self.tabs[self.current].1
    }

    fn current_page(&self) -> Option<&FakePage> {
        self.pages.get(self.current_url())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if let Some(counter) = &self.dropped {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl BrowsingSession for FakeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.navigations.push(url.to_string());
        if self.unreachable.iter().any(|u| u == url) {
            bail!("net::ERR_TIMED_OUT loading {}", url);
        }
        self.tabs[self.current].1 = url.to_string();
        Ok(())
    }

    fn page_source(&mut self) -> Result<String> {
        Ok(self
            .current_page()
            .map(|page| page.html.clone())
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    fn wait_for_selector(&mut self, locator: &Locator, _timeout: Duration) -> bool {
        self.current_page().is_some_and(|page| page.matches(locator))
    }

    fn click(&mut self, locator: &Locator) -> Result<()> {
        let target = self
            .current_page()
            .filter(|page| page.matches(locator))
            .ok_or_else(|| anyhow!("nothing to click for {}", locator))?
            .clicks
            .get(&locator.to_string())
            .cloned();

        self.clicks.push(locator.to_string());
        if let Some(url) = target {
            self.tabs[self.current].1 = url;
        }
        Ok(())
    }

    fn open_background_tab(&mut self, url: &str) -> Result<TabHandle> {
        if self.unreachable.iter().any(|u| u == url) {
            bail!("net::ERR_TIMED_OUT opening {}", url);
        }
        let handle = TabHandle(format!("tab-{}", self.next_tab));
        self.next_tab += 1;
        self.tabs.push((handle.clone(), url.to_string()));
        self.opened_tabs += 1;
        self.max_open_tabs = self.max_open_tabs.max(self.tabs.len());
        Ok(handle)
    }

    fn switch_to(&mut self, handle: &TabHandle) -> Result<()> {
        self.current = self
            .tabs
            .iter()
            .position(|(h, _)| h == handle)
            .ok_or_else(|| anyhow!("no tab {:?}", handle))?;
        Ok(())
    }

    fn close_current_tab(&mut self) -> Result<()> {
        if self.current == 0 {
            bail!("refusing to close the primary tab");
        }
        self.tabs.remove(self.current);
        self.current = 0;
        Ok(())
    }

    fn list_open_handles(&self) -> Vec<TabHandle> {
        self.tabs.iter().map(|(handle, _)| handle.clone()).collect()
    }

    fn capture_network_log(&mut self) -> Result<Vec<NetworkEntry>> {
        Ok(self.network.remove(&self.generation).unwrap_or_default())
    }

    fn run_debug_command(&mut self, method: &str, params: Value) -> Result<Value> {
        if method != "Network.getResponseBody" {
            bail!("unsupported command {}", method);
        }
        let request_id = params["requestId"].as_str().unwrap_or_default();
        let body = self
            .bodies
            .get(request_id)
            .ok_or_else(|| anyhow!("no body for {}", request_id))?;
        Ok(json!({ "body": body, "base64Encoded": false }))
    }

    fn run_script(&mut self, _code: &str) -> Result<Option<Value>> {
        self.scripts += 1;
        Ok(None)
    }

    fn restart(&mut self) -> Result<()> {
        self.restarts += 1;
        self.generation += 1;
        self.tabs.truncate(1);
        self.tabs[0].1 = String::new();
        self.current = 0;
        Ok(())
    }
}

/// Hands out empty fake sessions and counts their lifecycle
#[derive(Debug, Default)]
pub struct FakeFactory {
    pub created: AtomicUsize,
    pub dropped: Arc<AtomicUsize>,
    pub broken: bool,
}

impl FakeFactory {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }
}

impl SessionFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn BrowsingSession>> {
        if self.broken {
            bail!("browser failed to launch");
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession::new().counting_drops(Arc::clone(&self.dropped))))
    }
}
