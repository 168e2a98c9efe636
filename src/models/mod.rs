use crate::error::ScrapeError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Rental site a listing was found on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Airbnb,
    Booking,
    MediaFerias,
    Vrbo,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Airbnb, Source::Booking, Source::MediaFerias, Source::Vrbo];

    pub fn name(&self) -> &'static str {
        match self {
            Source::Airbnb => "Airbnb",
            Source::Booking => "Booking",
            Source::MediaFerias => "MediaFerias",
            Source::Vrbo => "Vrbo",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One candidate rental.
///
/// Two listings are the same entity when their name and distance match,
/// whatever their price or URL. Use [`Listing::cmp_total_price`] to order them.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    name: String,
    url: String,
    distance_km: f64,
    price_per_night: f64,
    total_price: f64,
    source: Source,
}

impl Listing {
    pub fn new(
        source: Source,
        name: impl Into<String>,
        url: impl Into<String>,
        distance_km: f64,
        price_per_night: f64,
        total_price: f64,
    ) -> Result<Self, ScrapeError> {
        let name = name.into().trim().to_string();
        let url = url.into().trim().to_string();

        if name.is_empty() {
            return Err(ScrapeError::Validation("listing name is empty".to_string()));
        }
        if url.is_empty() {
            return Err(ScrapeError::Validation(format!("listing '{}' has no url", name)));
        }
        for (field, value) in [
            ("distance", distance_km),
            ("price per night", price_per_night),
            ("total price", total_price),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScrapeError::Validation(format!(
                    "listing '{}' has invalid {}: {}",
                    name, field, value
                )));
            }
        }

        Ok(Self {
            name,
            url,
            // normalise -0.0 so identity hashing sees one zero
            distance_km: distance_km + 0.0,
            price_per_night,
            total_price,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn price_per_night(&self) -> f64 {
        self.price_per_night
    }

    pub fn total_price(&self) -> f64 {
        self.total_price
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Ascending by total price; ties are left as they are
    pub fn cmp_total_price(&self, other: &Listing) -> Ordering {
        self.total_price.total_cmp(&other.total_price)
    }
}

impl PartialEq for Listing {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.distance_km.to_bits() == other.distance_km.to_bits()
    }
}

impl Eq for Listing {}

impl Hash for Listing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.distance_km.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn listing(name: &str, url: &str, distance: f64, total: f64) -> Listing {
        Listing::new(Source::Airbnb, name, url, distance, total / 7.0, total).unwrap()
    }

    #[test]
    fn test_rejects_empty_name_and_url() {
        assert!(matches!(
            Listing::new(Source::Vrbo, "  ", "https://x", 1.0, 1.0, 1.0),
            Err(ScrapeError::Validation(_))
        ));
        assert!(matches!(
            Listing::new(Source::Vrbo, "Casa", "", 1.0, 1.0, 1.0),
            Err(ScrapeError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_negative_and_non_finite_numbers() {
        for (d, n, t) in [
            (-1.0, 1.0, 1.0),
            (1.0, -0.5, 1.0),
            (1.0, 1.0, -10.0),
            (f64::NAN, 1.0, 1.0),
            (1.0, f64::INFINITY, 1.0),
        ] {
            assert!(Listing::new(Source::Booking, "Casa", "https://x", d, n, t).is_err());
        }
    }

    #[test]
    fn test_identity_ignores_price_and_url() {
        let a = listing("Casa do Mar", "https://a", 12.5, 700.0);
        let b = listing("Casa do Mar", "https://b", 12.5, 350.0);
        let c = listing("Casa do Mar", "https://a", 12.6, 700.0);

        let set: HashSet<Listing> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_negative_zero_distance_is_zero() {
        let a = listing("Casa", "https://a", 0.0, 100.0);
        let b = Listing::new(Source::Airbnb, "Casa", "https://b", -0.0, 1.0, 100.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_orders_by_total_price() {
        let mut listings = vec![
            listing("B", "https://b", 1.0, 120.0),
            listing("A", "https://a", 2.0, 80.0),
            listing("C", "https://c", 3.0, 100.0),
        ];
        listings.sort_by(Listing::cmp_total_price);
        let totals: Vec<f64> = listings.iter().map(Listing::total_price).collect();
        assert_eq!(totals, vec![80.0, 100.0, 120.0]);
    }
}
