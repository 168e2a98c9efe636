use crate::config::SearchCriteria;
use crate::geo::Coordinate;
use crate::models::{Listing, Source};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use tracing::debug;

static LAT_LNG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?\d+\.\d*)\s*,\s*(-?\d+\.\d*)").expect("valid lat,lng pattern"));

/// Compile a CSS selector written into the source
pub(crate) fn css(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid selector {selector:?}: {e:?}"))
}

/// The two filters every source applies before emitting a listing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListingFilter {
    origin: Coordinate,
    max_distance_km: f64,
    max_total_price: f64,
}

impl ListingFilter {
    pub fn new(criteria: &SearchCriteria) -> Self {
        Self {
            origin: criteria.origin,
            max_distance_km: criteria.max_distance_km,
            max_total_price: criteria.max_total_price(),
        }
    }

    /// Kilometres from the traveller's origin
    pub fn distance_to(&self, coordinate: Coordinate) -> f64 {
        self.origin.distance_to(&coordinate)
    }

    pub fn within_budget(&self, total_price: f64) -> bool {
        total_price <= self.max_total_price
    }

    pub fn within_reach(&self, distance_km: f64) -> bool {
        distance_km <= self.max_distance_km
    }

    pub fn admits(&self, listing: &Listing) -> bool {
        self.within_budget(listing.total_price()) && self.within_reach(listing.distance_km())
    }
}

/// A result card read off a search page, waiting to be geocoded
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    pub total_price: f64,
}

/// Turn geocoded candidates into listings, dropping those out of reach.
///
/// A candidate whose location stayed unknown gets distance 0 and is kept.
pub fn geocoded_listings(
    source: Source,
    filter: &ListingFilter,
    nights: u32,
    candidates: Vec<Candidate>,
    located: Vec<Option<Coordinate>>,
) -> Vec<Listing> {
    let nights = f64::from(nights.max(1));
    let mut listings = Vec::with_capacity(candidates.len());

    for (candidate, coordinate) in candidates.into_iter().zip(located) {
        let distance = coordinate.map(|c| filter.distance_to(c)).unwrap_or(0.0);
        if !filter.within_reach(distance) {
            debug!("{}: '{}' is {:.1} km away, skipping", source, candidate.name, distance);
            continue;
        }

        let price_per_night = candidate.total_price / nights;
        match Listing::new(source, candidate.name, candidate.url, distance, price_per_night, candidate.total_price) {
            Ok(listing) => listings.push(listing),
            Err(e) => debug!("{}: dropping card: {}", source, e),
        }
    }

    listings
}

/// Percent-encode a query-string value
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Resolve a possibly relative link against the site root
pub fn absolute_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("{}/{}", base.trim_end_matches('/'), href.trim_start_matches('/')),
    }
}

/// Price from text like "€ 1,234.50", keeping digits and dots
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Price from text like "1 234 €" where dots and commas group thousands
pub fn parse_whole_amount(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// First "lat,lng" pair in a string such as a map link or data attribute
pub fn parse_lat_lng(text: &str) -> Option<Coordinate> {
    let caps = LAT_LNG.captures(text)?;
    let latitude = caps.get(1)?.as_str().parse().ok()?;
    let longitude = caps.get(2)?.as_str().parse().ok()?;
    Some(Coordinate::new(latitude, longitude))
}

/// Whitespace-normalised text content of an element
pub fn element_text(element: ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Text of the first match of `selector` under `element`, if any and non-empty
pub fn select_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Attribute of the first match of `selector` under `element`
pub fn select_attr(element: ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocationCodes, TripDates};
    use chrono::NaiveDate;
    use scraper::Html;
    use std::time::Duration;

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            destination: "Portugal".to_string(),
            origin: Coordinate::new(38.72, -9.14),
            max_distance_km: 30.0,
            max_price_per_night: 25,
            occupancy: 4,
            dates: TripDates::Fixed {
                check_in: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2026, 7, 11).unwrap(),
            },
            pool: false,
            location_codes: LocationCodes::default(),
            wait_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let filter = ListingFilter::new(&criteria());
        assert!(filter.within_budget(100.0));
        assert!(!filter.within_budget(100.01));
        assert!(filter.within_reach(30.0));
        assert!(!filter.within_reach(30.5));
    }

    #[test]
    fn test_filter_admits_listing() {
        let filter = ListingFilter::new(&criteria());
        let near_cheap = Listing::new(Source::Vrbo, "A", "https://a", 5.0, 10.0, 70.0).unwrap();
        let far = Listing::new(Source::Vrbo, "B", "https://b", 50.0, 10.0, 70.0).unwrap();
        let pricey = Listing::new(Source::Vrbo, "C", "https://c", 5.0, 30.0, 210.0).unwrap();
        assert!(filter.admits(&near_cheap));
        assert!(!filter.admits(&far));
        assert!(!filter.admits(&pricey));
    }

    #[test]
    fn test_geocoded_listings_keeps_unknown_locations() {
        let filter = ListingFilter::new(&criteria());
        let candidates = vec![
            Candidate { name: "Near".into(), url: "https://near".into(), total_price: 70.0 },
            Candidate { name: "Unknown".into(), url: "https://unknown".into(), total_price: 84.0 },
            Candidate { name: "Far".into(), url: "https://far".into(), total_price: 56.0 },
        ];
        let located = vec![
            Some(Coordinate::new(38.75, -9.15)),
            None,
            Some(Coordinate::new(41.15, -8.63)),
        ];

        let listings = geocoded_listings(Source::Booking, &filter, 7, candidates, located);
        let names: Vec<&str> = listings.iter().map(Listing::name).collect();
        assert_eq!(names, vec!["Near", "Unknown"]);
        assert_eq!(listings[1].distance_km(), 0.0);
        assert_eq!(listings[1].price_per_night(), 12.0);
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(encode("Costa Vicentina"), "Costa+Vicentina");
        assert_eq!(absolute_url("https://www.airbnb.pt", "/rooms/42?x=1"), "https://www.airbnb.pt/rooms/42?x=1");
        assert_eq!(absolute_url("https://www.airbnb.pt", "https://other/x"), "https://other/x");
    }

    #[test]
    fn test_parse_amounts() {
        assert_eq!(parse_amount("€ 45.50 night"), Some(45.5));
        assert_eq!(parse_amount("76 €"), Some(76.0));
        assert_eq!(parse_amount("no price"), None);
        assert_eq!(parse_whole_amount("€ 1.234"), Some(1234.0));
        assert_eq!(parse_whole_amount("1 050 € total"), Some(1050.0));
        assert_eq!(parse_whole_amount(""), None);
    }

    #[test]
    fn test_parse_lat_lng() {
        let c = parse_lat_lng("https://maps.google.com/maps?ll=38.7223,-9.1393&z=12").unwrap();
        assert_eq!(c, Coordinate::new(38.7223, -9.1393));
        assert_eq!(parse_lat_lng("37.01, -7.93"), Some(Coordinate::new(37.01, -7.93)));
        assert_eq!(parse_lat_lng("nowhere"), None);
    }

    #[test]
    fn test_select_helpers() {
        let html = Html::parse_fragment(
            r#"<div><a href=" /rooms/1 ">  Casa
               do   Mar </a><span></span></div>"#,
        );
        let root = html.root_element();
        assert_eq!(select_text(root, &css("a")).as_deref(), Some("Casa do Mar"));
        assert_eq!(select_attr(root, &css("a"), "href").as_deref(), Some("/rooms/1"));
        assert_eq!(select_text(root, &css("span")), None);
    }
}
