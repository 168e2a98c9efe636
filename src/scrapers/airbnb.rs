use crate::config::{EngineSettings, SearchCriteria, TripDates};
use crate::error::{Result, ScrapeError};
use crate::geo::{pixel_offset_to_coordinate, Coordinate};
use crate::models::{Listing, Source};
use crate::scrapers::pagination::{PageOutcome, PageSweep};
use crate::scrapers::traits::Extractor;
use crate::scrapers::types::{
    absolute_url, css, element_text, encode, parse_amount, parse_lat_lng, select_attr, select_text, ListingFilter,
};
use crate::session::{BrowsingSession, Locator};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

pub const BASE_URL: &str = "https://www.airbnb.pt";

/// Results per page; the cursor offset advances by this much
const PAGE_SIZE: usize = 18;
const POOL_AMENITY: u32 = 7;

static CARD: LazyLock<Selector> = LazyLock::new(|| css("[data-testid='card-container']"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| css("[data-testid='listing-card-title']"));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a[href]"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| css("div[aria-hidden='true'] > span[class]"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| css("a[href]"));
static GOOGLE_LOGO: LazyLock<Selector> = LazyLock::new(|| css("img[alt='Google']"));
static MAP_PIN: LazyLock<Selector> = LazyLock::new(|| css("div[style*='pan-x pan-y']"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| css("span"));
/// Item-count tag carried by a page holding a full `PAGE_SIZE` of results
static FULL_PAGE: LazyLock<Selector> = LazyLock::new(|| css("meta[content='18']"));

static ZOOM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]z=([\d.]+)").expect("valid zoom pattern"));
static LEFT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"left:\s*(-?\d+(?:\.\d+)?)px").expect("valid left pattern"));
static TOP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"top:\s*(-?\d+(?:\.\d+)?)px").expect("valid top pattern"));

/// The area the results map is showing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: f64,
}

impl MapView {
    /// Read the map centre and zoom from the "Google" attribution link
    pub fn from_document(document: &Html) -> Option<Self> {
        let href = document
            .select(&ANCHOR)
            .find(|a| a.select(&GOOGLE_LOGO).next().is_some())?
            .value()
            .attr("href")?;

        let center = parse_lat_lng(href)?;
        let zoom = ZOOM.captures(href)?.get(1)?.as_str().parse().ok()?;
        Some(Self { center, zoom })
    }

    /// Geographic position of a pin drawn `left`/`top` pixels from the centre
    pub fn locate(&self, left: f64, top: f64) -> Coordinate {
        pixel_offset_to_coordinate(left, top, self.center.latitude, self.center.longitude, self.zoom)
    }
}

/// Pixel offset of the map pin labelled with `name`
fn pin_offset(document: &Html, name: &str) -> Option<(f64, f64)> {
    let pin = document
        .select(&MAP_PIN)
        .filter(|div| div.select(&SPAN).any(|span| element_text(span).contains(name)))
        .last()?;
    let style = pin.value().attr("style")?;

    let left = LEFT.captures(style)?.get(1)?.as_str().parse().ok()?;
    let top = TOP.captures(style)?.get(1)?.as_str().parse().ok()?;
    Some((left, top))
}

/// Airbnb search, paginated through a base64 cursor. Coordinates come from
/// the results map rather than detail pages.
pub struct AirbnbExtractor {
    search_url: String,
    nights: u32,
    filter: ListingFilter,
    max_pages: usize,
}

impl AirbnbExtractor {
    pub fn new(criteria: &SearchCriteria, engine: &EngineSettings) -> Self {
        Self {
            search_url: Self::search_url(criteria),
            nights: criteria.dates.nights(),
            filter: ListingFilter::new(criteria),
            max_pages: engine.max_pages,
        }
    }

    pub fn search_url(criteria: &SearchCriteria) -> String {
        let picker = if criteria.dates.is_flexible() { "flexible_dates" } else { "calendar" };

        let mut url = format!(
            "{}/s/homes?tab_id=home_tab&flexible_trip_lengths%5B%5D=one_week&query={}&date_picker_type={}&adults={}&price_max={}&price_filter_num_nights={}",
            BASE_URL,
            encode(&criteria.destination),
            picker,
            criteria.occupancy,
            criteria.max_price_per_night,
            criteria.dates.nights(),
        );

        match &criteria.dates {
            TripDates::Flexible { .. } => {
                for month in criteria.dates.months() {
                    url.push_str("&flexible_trip_dates%5B%5D=");
                    url.push_str(&month.format("%B").to_string().to_lowercase());
                }
            }
            TripDates::Fixed { check_in, check_out } => {
                url.push_str(&format!("&checkin={}&checkout={}", check_in, check_out));
            }
        }

        if criteria.pool {
            url.push_str(&format!("&amenities%5B%5D={}", POOL_AMENITY));
        }

        url
    }

    pub fn page_url(&self, page: usize) -> String {
        let cursor = format!(
            r#"{{"section_offset":2,"items_offset":{},"version":1}}"#,
            page * PAGE_SIZE
        );
        format!("{}&cursor={}", self.search_url, encode(&STANDARD.encode(cursor)))
    }

    /// Read every card on a results page
    pub fn parse_page(&self, document: &Html) -> PageOutcome {
        let map = MapView::from_document(document);
        if map.is_none() {
            warn!("Airbnb results page has no readable map, cards cannot be placed");
        }

        let mut cards = Vec::new();
        let mut listings = Vec::new();

        for card in document.select(&CARD) {
            if let Some(key) = select_attr(card, &LINK, "href").or_else(|| select_text(card, &TITLE)) {
                cards.push(key);
            }
            match self.parse_card(card, document, map) {
                Ok(Some(listing)) => listings.push(listing),
                Ok(None) => {}
                Err(e) => debug!("Airbnb: skipping card: {}", e),
            }
        }

        PageOutcome::Continue { cards, listings }
    }

    fn parse_card(&self, card: ElementRef, document: &Html, map: Option<MapView>) -> Result<Option<Listing>> {
        let name = select_text(card, &TITLE).ok_or_else(|| ScrapeError::parse("title", "Airbnb card"))?;
        let href = select_attr(card, &LINK, "href").ok_or_else(|| ScrapeError::parse("link", name.clone()))?;

        let price_per_night = card
            .select(&PRICE)
            .filter_map(|span| parse_amount(&element_text(span)))
            .last()
            .ok_or_else(|| ScrapeError::parse("price", name.clone()))?;
        let total_price = price_per_night * f64::from(self.nights);
        if !self.filter.within_budget(total_price) {
            debug!("Airbnb: '{}' costs {} in total, over budget", name, total_price);
            return Ok(None);
        }

        let map = map.ok_or_else(|| ScrapeError::parse("map", "Airbnb results page"))?;
        let (left, top) = pin_offset(document, &name).ok_or_else(|| ScrapeError::parse("map pin", name.clone()))?;
        let distance = self.filter.distance_to(map.locate(left, top));
        if !self.filter.within_reach(distance) {
            debug!("Airbnb: '{}' is {:.1} km away, skipping", name, distance);
            return Ok(None);
        }

        let url = absolute_url(BASE_URL, &href);
        Listing::new(Source::Airbnb, name, url, distance, price_per_night, total_price).map(Some)
    }
}

impl Extractor for AirbnbExtractor {
    fn extract(&self, session: &mut dyn BrowsingSession, criteria: &SearchCriteria) -> Result<HashSet<Listing>> {
        info!("Starting Airbnb search for {}", criteria.destination);

        let sweep = PageSweep {
            // Cards are only placed once the map has rendered
            ready: vec![Locator::css("img[alt='Google']")],
            timeout: criteria.wait_timeout,
            max_pages: self.max_pages,
        };

        let listings = sweep.run(
            session,
            |page| self.page_url(page),
            |_, document| {
                let outcome = self.parse_page(document);
                if document.select(&FULL_PAGE).next().is_some() {
                    return Ok(outcome);
                }
                // A short page is the last one
                Ok(match outcome {
                    PageOutcome::Continue { listings, .. } | PageOutcome::Stop { listings } => {
                        PageOutcome::Stop { listings }
                    }
                })
            },
        )?;

        info!("Airbnb: {} listings within budget and reach", listings.len());
        Ok(listings)
    }

    fn source(&self) -> Source {
        Source::Airbnb
    }
}
