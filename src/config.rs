use crate::error::ConfigError;
use crate::geo::Coordinate;
use crate::models::Source;
use chrono::{Datelike, Months, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Trip dates, either a fixed stay or a number of nights anywhere in a span of months
#[derive(Debug, Clone, PartialEq)]
pub enum TripDates {
    Fixed {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    Flexible {
        from: NaiveDate,
        to: NaiveDate,
        nights: u32,
    },
}

impl TripDates {
    pub fn nights(&self) -> u32 {
        match self {
            TripDates::Fixed { check_in, check_out } => (*check_out - *check_in).num_days() as u32,
            TripDates::Flexible { nights, .. } => *nights,
        }
    }

    pub fn is_flexible(&self) -> bool {
        matches!(self, TripDates::Flexible { .. })
    }

    /// First day of every month touched by the trip window, in order
    pub fn months(&self) -> Vec<NaiveDate> {
        let (from, to) = match self {
            TripDates::Fixed { check_in, check_out } => (*check_in, *check_out),
            TripDates::Flexible { from, to, .. } => (*from, *to),
        };

        let mut months = Vec::new();
        let mut current = from.with_day(1).unwrap_or(from);
        while current <= to {
            months.push(current);
            match current.checked_add_months(Months::new(1)) {
                Some(next) => current = next,
                None => break,
            }
        }
        months
    }

    /// Concrete stay for sites without flexible search: the first nights of the window
    pub fn concrete_stay(&self) -> (NaiveDate, NaiveDate) {
        match self {
            TripDates::Fixed { check_in, check_out } => (*check_in, *check_out),
            TripDates::Flexible { from, nights, .. } => {
                (*from, *from + chrono::Duration::days(i64::from(*nights)))
            }
        }
    }
}

/// Per-site region codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct LocationCodes {
    #[serde(default)]
    pub mediaferias: i32,
    #[serde(default)]
    pub vrbo: i64,
}

/// Trip parameters shared by every extractor. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub destination: String,
    pub origin: Coordinate,
    pub max_distance_km: f64,
    pub max_price_per_night: u32,
    pub occupancy: u32,
    pub dates: TripDates,
    pub pool: bool,
    pub location_codes: LocationCodes,
    pub wait_timeout: Duration,
}

impl SearchCriteria {
    /// Upper bound on a listing's total price
    pub fn max_total_price(&self) -> f64 {
        f64::from(self.max_price_per_night) * f64::from(self.occupancy)
    }
}

/// Structural bounds of the extraction patterns
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub tab_batch_size: usize,
    pub max_pages: usize,
    pub capture_attempts: u32,
    pub capture_delay_secs: u64,
    pub max_session_restarts: u32,
    pub restart_delay_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tab_batch_size: 10,
            max_pages: 50,
            capture_attempts: 5,
            capture_delay_secs: 2,
            max_session_restarts: 3,
            restart_delay_secs: 5,
        }
    }
}

/// Launch options for the browser sessions
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            chrome_path: None,
        }
    }
}

/// Everything a run needs, validated
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub criteria: SearchCriteria,
    pub engine: EngineSettings,
    pub browser: BrowserSettings,
    pub sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    search: SearchSection,
    dates: DatesSection,
    #[serde(default)]
    amenities: AmenitiesSection,
    #[serde(default)]
    location_codes: LocationCodes,
    #[serde(default)]
    engine: EngineSettings,
    #[serde(default)]
    browser: BrowserSettings,
    #[serde(default)]
    sources: Option<Vec<Source>>,
}

#[derive(Debug, Deserialize)]
struct SearchSection {
    destination: String,
    latitude: f64,
    longitude: f64,
    max_distance_km: f64,
    max_price_per_night: u32,
    occupancy: u32,
    #[serde(default = "default_wait_secs")]
    wait_timeout_secs: u64,
}

fn default_wait_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
struct DatesSection {
    start: NaiveDate,
    end: NaiveDate,
    #[serde(default)]
    flexible: bool,
    nights: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AmenitiesSection {
    #[serde(default)]
    pool: bool,
}

impl Settings {
    /// Read and validate a TOML settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: SettingsFile = toml::from_str(text)?;
        file.validate()
    }
}

impl SettingsFile {
    fn validate(self) -> Result<Settings, ConfigError> {
        let search = self.search;

        if search.destination.trim().is_empty() {
            return Err(ConfigError::invalid("search.destination", "must not be empty"));
        }
        if !(-90.0..=90.0).contains(&search.latitude) {
            return Err(ConfigError::invalid(
                "search.latitude",
                format!("{} is outside [-90, 90]", search.latitude),
            ));
        }
        if !(-180.0..=180.0).contains(&search.longitude) {
            return Err(ConfigError::invalid(
                "search.longitude",
                format!("{} is outside [-180, 180]", search.longitude),
            ));
        }
        if !search.max_distance_km.is_finite() || search.max_distance_km < 0.0 {
            return Err(ConfigError::invalid(
                "search.max_distance_km",
                "must be a non-negative number",
            ));
        }
        if search.occupancy == 0 {
            return Err(ConfigError::invalid("search.occupancy", "must be at least 1"));
        }
        if search.wait_timeout_secs == 0 {
            return Err(ConfigError::invalid("search.wait_timeout_secs", "must be at least 1"));
        }

        let dates = self.dates;
        if dates.end < dates.start {
            return Err(ConfigError::invalid("dates.end", "must not be before dates.start"));
        }
        let trip = if dates.flexible {
            let nights = dates
                .nights
                .ok_or_else(|| ConfigError::invalid("dates.nights", "required for flexible dates"))?;
            if nights == 0 {
                return Err(ConfigError::invalid("dates.nights", "must be at least 1"));
            }
            TripDates::Flexible {
                from: dates.start,
                to: dates.end,
                nights,
            }
        } else {
            if dates.end == dates.start {
                return Err(ConfigError::invalid("dates.end", "a stay needs at least one night"));
            }
            TripDates::Fixed {
                check_in: dates.start,
                check_out: dates.end,
            }
        };

        let engine = self.engine;
        if engine.tab_batch_size == 0 {
            return Err(ConfigError::invalid("engine.tab_batch_size", "must be at least 1"));
        }
        if engine.max_pages == 0 {
            return Err(ConfigError::invalid("engine.max_pages", "must be at least 1"));
        }
        if engine.capture_attempts == 0 {
            return Err(ConfigError::invalid("engine.capture_attempts", "must be at least 1"));
        }

        let mut sources: Vec<Source> = Vec::new();
        for source in self.sources.unwrap_or_else(|| Source::ALL.to_vec()) {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            return Err(ConfigError::invalid("sources", "at least one source must be enabled"));
        }

        Ok(Settings {
            criteria: SearchCriteria {
                destination: search.destination.trim().to_string(),
                origin: Coordinate::new(search.latitude, search.longitude),
                max_distance_km: search.max_distance_km,
                max_price_per_night: search.max_price_per_night,
                occupancy: search.occupancy,
                dates: trip,
                pool: self.amenities.pool,
                location_codes: self.location_codes,
                wait_timeout: Duration::from_secs(search.wait_timeout_secs),
            },
            engine,
            browser: self.browser,
            sources,
        })
    }
}
