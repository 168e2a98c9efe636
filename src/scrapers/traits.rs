use crate::config::SearchCriteria;
use crate::error::Result;
use crate::models::{Listing, Source};
use crate::session::BrowsingSession;
use std::collections::HashSet;

/// Common trait for all rental sources.
///
/// Implementations derive their site query from the criteria when built and
/// only read `criteria` during extraction.
pub trait Extractor: Send + Sync {
    /// Collect every listing that passes the price and distance filters
    fn extract(&self, session: &mut dyn BrowsingSession, criteria: &SearchCriteria) -> Result<HashSet<Listing>>;

    /// The rental site this extractor reads
    fn source(&self) -> Source;
}
