//! Runs every extractor at once and merges what they find.

use crate::config::SearchCriteria;
use crate::error::{Result, ScrapeError};
use crate::models::{Listing, Source};
use crate::scrapers::Extractor;
use crate::session::SessionFactory;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// How one source's task ended
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: Source,
    /// Listings found, or why the task failed
    pub outcome: std::result::Result<usize, String>,
}

/// Merged listings plus a report per source, in launch order
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub listings: Vec<Listing>,
    pub reports: Vec<SourceReport>,
}

/// Run all extractors concurrently and return their merged listings,
/// cheapest first. Failed sources are logged and left out.
pub async fn run(
    extractors: Vec<Arc<dyn Extractor>>,
    criteria: Arc<SearchCriteria>,
    factory: Arc<dyn SessionFactory>,
) -> Vec<Listing> {
    run_with_report(extractors, criteria, factory).await.listings
}

/// Like [`run`], also reporting how each source fared
pub async fn run_with_report(
    extractors: Vec<Arc<dyn Extractor>>,
    criteria: Arc<SearchCriteria>,
    factory: Arc<dyn SessionFactory>,
) -> RunSummary {
    let mut tasks = Vec::with_capacity(extractors.len());

    for extractor in extractors {
        let source = extractor.source();
        let criteria = Arc::clone(&criteria);
        let factory = Arc::clone(&factory);

        // Sessions block on the browser, so each source gets its own thread
        let handle = tokio::task::spawn_blocking(move || {
            extract_with_session(extractor.as_ref(), &criteria, factory.as_ref())
        });
        tasks.push((source, handle));
    }
    info!("Launched {} extractors", tasks.len());

    let mut found = Vec::with_capacity(tasks.len());
    let mut reports = Vec::with_capacity(tasks.len());

    for (source, handle) in tasks {
        let outcome = match handle.await {
            Ok(Ok(listings)) => {
                info!("{}: {} listings", source, listings.len());
                let count = listings.len();
                found.push(listings);
                Ok(count)
            }
            Ok(Err(e)) => {
                error!("{} failed: {}", source, e);
                Err(e.to_string())
            }
            Err(e) if e.is_panic() => {
                error!("{} panicked: {}", source, e);
                Err(format!("panicked: {}", e))
            }
            Err(e) => {
                error!("{} task did not finish: {}", source, e);
                Err(e.to_string())
            }
        };
        reports.push(SourceReport { source, outcome });
    }

    let listings = merge(found);
    info!("{} unique listings after merging", listings.len());

    RunSummary { listings, reports }
}

/// One extractor task: own a fresh session for exactly as long as the extraction runs
fn extract_with_session(
    extractor: &dyn Extractor,
    criteria: &SearchCriteria,
    factory: &dyn SessionFactory,
) -> Result<HashSet<Listing>> {
    let source = extractor.source();
    let started = Instant::now();

    let mut session = factory
        .create()
        .map_err(|e| ScrapeError::Session(format!("{}: {:#}", source, e)))?;
    let result = extractor.extract(session.as_mut(), criteria);
    drop(session);

    info!("{} finished in {:.1}s", source, started.elapsed().as_secs_f64());
    result
}

/// Flatten per-source sets, keep the first listing of each (name, distance)
/// identity and sort by total price.
pub fn merge(sets: impl IntoIterator<Item = HashSet<Listing>>) -> Vec<Listing> {
    let mut unique: HashSet<Listing> = HashSet::new();
    for set in sets {
        // `extend` never replaces an equal listing already present
        unique.extend(set);
    }

    let mut merged: Vec<Listing> = unique.into_iter().collect();
    merged.sort_by(Listing::cmp_total_price);
    merged
}
