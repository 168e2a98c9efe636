use crate::config::{EngineSettings, SearchCriteria};
use crate::error::{Result, ScrapeError};
use crate::geo::Coordinate;
use crate::models::{Listing, Source};
use crate::scrapers::pagination::{PageOutcome, PageSweep};
use crate::scrapers::tabs::TabBatch;
use crate::scrapers::traits::Extractor;
use crate::scrapers::types::{
    absolute_url, css, element_text, geocoded_listings, parse_whole_amount, select_attr, select_text, Candidate,
    ListingFilter,
};
use crate::session::{BrowsingSession, Locator};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const BASE_URL: &str = "https://www.mediaferias.com";

const CARD_SELECTOR: &str = "div.property-bloc-autour";
const MAP_SCRIPT: &str = "div#googlemap > script";
const POOL_FLAG: u8 = 8;

static CARD: LazyLock<Selector> = LazyLock::new(|| css(CARD_SELECTOR));
static HEADER_LINK: LazyLock<Selector> = LazyLock::new(|| css("div.bloc__header__text > a"));
static RIBBON: LazyLock<Selector> = LazyLock::new(|| css("span.bloc__ribbon--info--darken"));
static RIBBON_AMOUNT: LazyLock<Selector> =
    LazyLock::new(|| css("span.bloc__ribbon--info--darken > span ~ span:not(.text--sm)"));
static RIBBON_DETAIL: LazyLock<Selector> = LazyLock::new(|| css("span.bloc__ribbon--info--darken > span ~ span"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| css(MAP_SCRIPT));

static ANNONCE_LAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"annonce_lat\s*=\s*(-?\d+(?:\.\d*)?)").expect("valid latitude pattern"));
static ANNONCE_LNG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"annonce_lng\s*=\s*(-?\d+(?:\.\d*)?)").expect("valid longitude pattern"));

/// Occupancy as the site encodes it: 0-9, then a-z for 10-35
pub fn occupancy_code(occupancy: u32) -> char {
    match occupancy {
        0..=9 => char::from_digit(occupancy, 10).unwrap_or('0'),
        10..=35 => char::from(b'a' + (occupancy - 10) as u8),
        _ => '0',
    }
}

/// Two-digit region code; negative codes mean "anywhere"
pub fn location_code(code: i32) -> String {
    if code < 0 {
        "00".to_string()
    } else {
        format!("{:02}", code)
    }
}

/// Cards read off one results page, up to the first priceless one
#[derive(Debug, Default, PartialEq)]
pub struct PageCards {
    pub keys: Vec<String>,
    pub candidates: Vec<Candidate>,
    /// A card without a usable price was reached; nothing after it is valid
    pub reached_end: bool,
}

/// MediaFerias search. Cards carry no coordinates, so the affordable ones are
/// geocoded from the map script on their detail pages.
pub struct MediaFeriasExtractor {
    search_url: String,
    nights: u32,
    filter: ListingFilter,
    engine: EngineSettings,
}

impl MediaFeriasExtractor {
    pub fn new(criteria: &SearchCriteria, engine: &EngineSettings) -> Self {
        Self {
            search_url: Self::search_url(criteria),
            nights: criteria.dates.nights(),
            filter: ListingFilter::new(criteria),
            engine: engine.clone(),
        }
    }

    pub fn search_url(criteria: &SearchCriteria) -> String {
        // No flexible search on this site, so search the start of the window
        let (date1, date2) = criteria.dates.concrete_stay();
        let region = criteria
            .destination
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        let pool = if criteria.pool { POOL_FLAG } else { 0 };

        format!(
            "{}/aluguer-ferias-{}/{}00{}{}00/?date1={}&date2={}",
            BASE_URL,
            region,
            occupancy_code(criteria.occupancy),
            location_code(criteria.location_codes.mediaferias),
            pool,
            date1,
            date2
        )
    }

    pub fn page_url(&self, page: usize) -> String {
        format!("{}&cur_page={}", self.search_url, page)
    }

    /// Total price of a card, or `None` when its ribbon holds no usable amount
    fn card_price(&self, card: ElementRef) -> Option<f64> {
        let amount: String = card.select(&RIBBON_AMOUNT).map(element_text).collect::<Vec<_>>().join(" ");

        let price = if !amount.trim().is_empty() {
            let value = parse_whole_amount(&amount)?;
            let nightly = card.select(&RIBBON_DETAIL).any(|span| element_text(span).contains("/noite"));
            if nightly {
                value * f64::from(self.nights)
            } else {
                value
            }
        } else {
            parse_whole_amount(&select_text(card, &RIBBON)?)?
        };

        (price > 0.0).then_some(price)
    }

    pub fn parse_cards(&self, document: &Html) -> PageCards {
        let mut page = PageCards::default();

        for card in document.select(&CARD) {
            let Some(total_price) = self.card_price(card) else {
                debug!("MediaFerias: card without a price, end of valid results");
                page.reached_end = true;
                break;
            };

            let Some(href) = select_attr(card, &HEADER_LINK, "href") else {
                debug!("MediaFerias: skipping card without a link");
                continue;
            };
            page.keys.push(href.clone());

            if !self.filter.within_budget(total_price) {
                debug!("MediaFerias: {} costs {}, over budget", href, total_price);
                continue;
            }

            let name = select_text(card, &HEADER_LINK).unwrap_or_default();
            page.candidates.push(Candidate {
                name,
                url: absolute_url(BASE_URL, &href),
                total_price,
            });
        }

        page
    }

    fn extract_page(&self, session: &mut dyn BrowsingSession, document: &Html, tabs: &TabBatch) -> Result<PageOutcome> {
        let PageCards { keys, candidates, reached_end } = self.parse_cards(document);
        debug!("MediaFerias: {} cards, {} affordable", keys.len(), candidates.len());

        let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
        let located = tabs.locate_all(session, &urls, locate_property)?;
        let listings = geocoded_listings(Source::MediaFerias, &self.filter, self.nights, candidates, located);

        Ok(if reached_end {
            PageOutcome::Stop { listings }
        } else {
            PageOutcome::Continue { cards: keys, listings }
        })
    }
}

/// Coordinates from the map script on a MediaFerias property page
pub fn locate_property(document: &Html) -> Result<Coordinate> {
    for script in document.select(&SCRIPT) {
        let code: String = script.text().collect();
        let latitude = ANNONCE_LAT.captures(&code).and_then(|c| c[1].parse::<f64>().ok());
        let longitude = ANNONCE_LNG.captures(&code).and_then(|c| c[1].parse::<f64>().ok());
        if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
            return Ok(Coordinate::new(latitude, longitude));
        }
    }
    Err(ScrapeError::parse("annonce_lat/annonce_lng", "MediaFerias map script"))
}

impl Extractor for MediaFeriasExtractor {
    fn extract(&self, session: &mut dyn BrowsingSession, criteria: &SearchCriteria) -> Result<HashSet<Listing>> {
        info!("Starting MediaFerias search for {}", criteria.destination);

        let sweep = PageSweep {
            ready: vec![Locator::css(CARD_SELECTOR)],
            timeout: criteria.wait_timeout,
            max_pages: self.engine.max_pages,
        };
        let tabs = TabBatch {
            marker: Locator::css(MAP_SCRIPT),
            timeout: criteria.wait_timeout,
            batch_size: self.engine.tab_batch_size,
        };

        let listings = sweep.run(
            session,
            |page| self.page_url(page),
            |session, document| self.extract_page(session, document, &tabs),
        )?;

        info!("MediaFerias: {} listings within budget and reach", listings.len());
        Ok(listings)
    }

    fn source(&self) -> Source {
        Source::MediaFerias
    }
}
