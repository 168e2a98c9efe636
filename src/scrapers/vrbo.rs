use crate::config::{EngineSettings, SearchCriteria, TripDates};
use crate::error::Result;
use crate::geo::Coordinate;
use crate::models::{Listing, Source};
use crate::scrapers::network::TrafficCapture;
use crate::scrapers::retry::RetryPolicy;
use crate::scrapers::traits::Extractor;
use crate::scrapers::types::{parse_amount, ListingFilter};
use crate::session::{BrowsingSession, Locator};
use chrono::Months;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BASE_URL: &str = "https://www.vrbo.com";

const API_PATH: &str = "graphql";
const TRIP_LENGTH: &str = "1_WEEK";

const LISTINGS: &str = "/data/propertySearch/propertySearchListings";
const MARKERS: &str = "/data/propertySearch/dynamicMap/map/markers";
const HEADING: &str = "/headingSection/heading";
const RELATIVE_PATH: &str = "/cardLink/resource/relativePath";
const NIGHTLY_PRICE: &str = "/priceSection/priceSummary/displayMessages/2/lineItems/0/value";

/// Listing and marker ids arrive as numbers or strings
fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn marker_position(marker: &Value) -> Option<Coordinate> {
    let position = marker.get("markerPosition")?;
    Some(Coordinate::new(
        position.get("latitude")?.as_f64()?,
        position.get("longitude")?.as_f64()?,
    ))
}

/// Vrbo search. Listings are read from the site's own GraphQL responses
/// while the result pages are clicked through.
pub struct VrboExtractor {
    search_url: String,
    nights: u32,
    filter: ListingFilter,
    capture: TrafficCapture,
    restarts: RetryPolicy,
    max_pages: usize,
}

impl VrboExtractor {
    pub fn new(criteria: &SearchCriteria, engine: &EngineSettings) -> Self {
        Self {
            search_url: Self::search_url(criteria),
            nights: criteria.dates.nights(),
            filter: ListingFilter::new(criteria),
            capture: TrafficCapture::new(
                API_PATH,
                RetryPolicy::new(engine.capture_attempts, Duration::from_secs(engine.capture_delay_secs)),
            ),
            restarts: RetryPolicy::new(
                engine.max_session_restarts.saturating_add(1),
                Duration::from_secs(engine.restart_delay_secs),
            ),
            max_pages: engine.max_pages,
        }
    }

    pub fn search_url(criteria: &SearchCriteria) -> String {
        let budget = u64::from(criteria.max_price_per_night) * u64::from(criteria.occupancy);
        let mut url = format!(
            "{}/pt-pt/search?regionId={}&adults={}&allowPreAppliedFilters=false&total_price=0%2C{}",
            BASE_URL, criteria.location_codes.vrbo, criteria.occupancy, budget
        );

        match &criteria.dates {
            TripDates::Flexible { .. } => {
                url.push_str(&format!("&flexibility={}", TRIP_LENGTH));
                for month in criteria.dates.months() {
                    let last_day = month
                        .checked_add_months(Months::new(1))
                        .and_then(|next| next.pred_opt())
                        .unwrap_or(month);
                    url.push_str(&format!("&searchRange={}_{}", month, last_day));
                }
            }
            TripDates::Fixed { check_in, check_out } => {
                url.push_str(&format!("&startDate={}&endDate={}", check_in, check_out));
            }
        }

        if criteria.pool {
            url.push_str("&amenities_facilities_group=pool%2C");
        }

        url
    }

    /// Click through the result pages so each one fires its API request
    fn visit_pages(&self, session: &mut dyn BrowsingSession, timeout: Duration) -> Result<()> {
        let map = Locator::css("img[alt='Google']");
        let next = Locator::css("button[data-stid='next-button']:not([disabled])");

        session.navigate(&self.search_url)?;
        for page in 1..=self.max_pages {
            if !session.wait_for_selector(&map, timeout) || !session.wait_for_selector(&next, timeout) {
                debug!("Vrbo: no next page after page {}", page);
                return Ok(());
            }
            session.click(&next)?;
        }

        warn!("Vrbo: stopped paging after the {}-page cap", self.max_pages);
        Ok(())
    }

    /// Listings in one captured search response, correlated with their map markers
    pub fn parse_payload(&self, payload: &Value) -> Vec<Listing> {
        let Some(records) = payload.pointer(LISTINGS).and_then(Value::as_array) else {
            return Vec::new();
        };

        let markers: HashMap<String, Coordinate> = payload
            .pointer(MARKERS)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|marker| Some((record_id(marker)?, marker_position(marker)?)))
            .collect();

        records.iter().filter_map(|record| self.parse_record(record, &markers)).collect()
    }

    fn parse_record(&self, record: &Value, markers: &HashMap<String, Coordinate>) -> Option<Listing> {
        let id = record_id(record)?;
        let Some(position) = markers.get(&id) else {
            debug!("Vrbo: listing {} has no map marker", id);
            return None;
        };

        let distance = self.filter.distance_to(*position);
        if !self.filter.within_reach(distance) {
            debug!("Vrbo: listing {} is {:.1} km away, skipping", id, distance);
            return None;
        }

        let name = record.pointer(HEADING).and_then(Value::as_str)?;
        let path = record.pointer(RELATIVE_PATH).and_then(Value::as_str)?;
        let price_per_night = record.pointer(NIGHTLY_PRICE).and_then(Value::as_str).and_then(parse_amount)?;
        let total_price = price_per_night * f64::from(self.nights);
        if !self.filter.within_budget(total_price) {
            debug!("Vrbo: '{}' costs {} in total, over budget", name, total_price);
            return None;
        }

        match Listing::new(Source::Vrbo, name, format!("{}{}", BASE_URL, path), distance, price_per_night, total_price) {
            Ok(listing) => Some(listing),
            Err(e) => {
                debug!("Vrbo: dropping listing {}: {}", id, e);
                None
            }
        }
    }
}

impl Extractor for VrboExtractor {
    fn extract(&self, session: &mut dyn BrowsingSession, criteria: &SearchCriteria) -> Result<HashSet<Listing>> {
        info!("Starting Vrbo search for {}", criteria.destination);

        let payloads = self.restarts.run("Vrbo traffic capture", |attempt| -> Result<Vec<Value>> {
            if attempt > 1 {
                warn!(
                    "Vrbo: nothing captured, restarting the session (attempt {}/{})",
                    attempt, self.restarts.max_attempts
                );
                session.restart()?;
            }
            self.visit_pages(session, criteria.wait_timeout)?;
            self.capture.payloads(session)
        })?;

        let listings: HashSet<Listing> = payloads.iter().flat_map(|payload| self.parse_payload(payload)).collect();

        info!("Vrbo: {} listings within budget and reach", listings.len());
        Ok(listings)
    }

    fn source(&self) -> Source {
        Source::Vrbo
    }
}
