use crate::config::{EngineSettings, SearchCriteria, TripDates};
use crate::error::{Result, ScrapeError};
use crate::geo::Coordinate;
use crate::models::{Listing, Source};
use crate::scrapers::pagination::LoadMore;
use crate::scrapers::tabs::TabBatch;
use crate::scrapers::traits::Extractor;
use crate::scrapers::types::{
    absolute_url, css, encode, geocoded_listings, parse_lat_lng, parse_whole_amount, select_attr, select_text,
    Candidate, ListingFilter,
};
use crate::session::{BrowsingSession, Locator};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const BASE_URL: &str = "https://www.booking.com";

const POOL_FACILITY: u32 = 433;
/// Holiday homes and apartments
const PROPERTY_TYPES: &str = "ht_id%3D220%3Bht_id%3D201%3B";
const LOAD_MORE_BUTTON: &str = "//button[@type='button'][span[contains(text(),'Load')]]";
const HOTEL_HEADER: &str = "#hotel_header[data-atlas-latlng]";

static CARD: LazyLock<Selector> = LazyLock::new(|| css("div[data-testid='property-card']"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| css("a[data-testid='title-link']"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| css("div[data-testid='title']"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| css("span[data-testid='price-and-discounted-price']"));
static ATLAS: LazyLock<Selector> = LazyLock::new(|| css(HOTEL_HEADER));

/// Booking.com search. Results load through a "Load more" button and every
/// affordable card is geocoded from its detail page.
pub struct BookingExtractor {
    search_url: String,
    nights: u32,
    filter: ListingFilter,
    engine: EngineSettings,
}

impl BookingExtractor {
    pub fn new(criteria: &SearchCriteria, engine: &EngineSettings) -> Self {
        Self {
            search_url: Self::search_url(criteria),
            nights: criteria.dates.nights(),
            filter: ListingFilter::new(criteria),
            engine: engine.clone(),
        }
    }

    pub fn search_url(criteria: &SearchCriteria) -> String {
        let nights = criteria.dates.nights().max(1);

        let mut url = format!(
            "{}/searchresults.en-gb.html?ss={}&group_adults={}",
            BASE_URL,
            encode(&criteria.destination),
            criteria.occupancy
        );

        match &criteria.dates {
            TripDates::Flexible { .. } => {
                let months: Vec<String> = criteria
                    .dates
                    .months()
                    .iter()
                    .map(|month| month.format("%-m-%Y").to_string())
                    .collect();
                url.push_str(&format!("&ltfd=1%3A{}%3A{}%3A1%3A", nights, months.join("_")));
            }
            TripDates::Fixed { check_in, check_out } => {
                url.push_str(&format!("&checkin={}&checkout={}", check_in, check_out));
            }
        }

        url.push_str("&nflt=");
        url.push_str(PROPERTY_TYPES);
        if criteria.pool {
            url.push_str(&format!("hotelfacility%3D{}%3B", POOL_FACILITY));
        }

        // Booking filters on the nightly price
        let ceiling = u64::from(criteria.max_price_per_night) * u64::from(criteria.occupancy) / u64::from(nights);
        url.push_str(&format!("price%3DEUR-min-{}-1", ceiling));

        url
    }

    /// Affordable cards on the fully expanded results page
    pub fn parse_candidates(&self, document: &Html) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for card in document.select(&CARD) {
            match Self::parse_card(card) {
                Ok(candidate) if self.filter.within_budget(candidate.total_price) => candidates.push(candidate),
                Ok(candidate) => debug!("Booking: '{}' costs {}, over budget", candidate.name, candidate.total_price),
                Err(e) => debug!("Booking: skipping card: {}", e),
            }
        }

        candidates
    }

    fn parse_card(card: ElementRef) -> Result<Candidate> {
        let name = select_text(card, &TITLE).ok_or_else(|| ScrapeError::parse("title", "Booking card"))?;
        let href = select_attr(card, &TITLE_LINK, "href").ok_or_else(|| ScrapeError::parse("link", name.clone()))?;
        let total_price = select_text(card, &PRICE)
            .and_then(|text| parse_whole_amount(&text))
            .ok_or_else(|| ScrapeError::parse("price", name.clone()))?;

        Ok(Candidate {
            name,
            url: absolute_url(BASE_URL, &href),
            total_price,
        })
    }
}

/// Coordinates from a Booking property page header
pub fn locate_property(document: &Html) -> Result<Coordinate> {
    let latlng = document
        .select(&ATLAS)
        .find_map(|header| header.value().attr("data-atlas-latlng"))
        .ok_or_else(|| ScrapeError::parse("data-atlas-latlng", "Booking property page"))?;
    parse_lat_lng(latlng).ok_or_else(|| ScrapeError::parse("coordinates", latlng.to_string()))
}

impl Extractor for BookingExtractor {
    fn extract(&self, session: &mut dyn BrowsingSession, criteria: &SearchCriteria) -> Result<HashSet<Listing>> {
        info!("Starting Booking search for {}", criteria.destination);
        session.navigate(&self.search_url)?;

        let load_more = LoadMore {
            button: Locator::xpath(LOAD_MORE_BUTTON),
            cards: CARD.clone(),
            timeout: criteria.wait_timeout,
            max_rounds: self.engine.max_pages,
        };
        let document = load_more.run(session)?;

        let candidates = self.parse_candidates(&document);
        info!("Booking: {} affordable cards to geocode", candidates.len());

        let tabs = TabBatch {
            marker: Locator::css(HOTEL_HEADER),
            timeout: criteria.wait_timeout,
            batch_size: self.engine.tab_batch_size,
        };
        let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
        let located = tabs.locate_all(session, &urls, locate_property)?;

        let listings: HashSet<Listing> =
            geocoded_listings(Source::Booking, &self.filter, self.nights, candidates, located).into_iter().collect();

        info!("Booking: {} listings within budget and reach", listings.len());
        Ok(listings)
    }

    fn source(&self) -> Source {
        Source::Booking
    }
}
