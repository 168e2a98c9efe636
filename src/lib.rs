//! Searches several vacation-rental sites at once and ranks what they offer.

pub mod config;
pub mod error;
pub mod export;
pub mod geo;
pub mod models;
pub mod orchestrator;
pub mod scrapers;
pub mod session;

pub use config::{SearchCriteria, Settings};
pub use error::{ConfigError, ScrapeError};
pub use models::{Listing, Source};
