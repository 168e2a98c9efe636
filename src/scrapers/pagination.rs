//! Walking a result list page by page.

use crate::error::Result;
use crate::models::Listing;
use crate::session::{BrowsingSession, Locator};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// What one results page produced
#[derive(Debug)]
pub enum PageOutcome {
    /// Keep going. `cards` identifies every result shown on the page, kept or
    /// not. The no-new-results stop compares these card keys, not the emitted
    /// listings, so a page whose cards are all filtered out still counts as new.
    Continue { cards: Vec<String>, listings: Vec<Listing> },
    /// The site stopped returning valid data partway through this page
    Stop { listings: Vec<Listing> },
}

/// Request page 0, 1, 2... until the content marker stops appearing, a page
/// brings nothing new, or the page cap is hit.
#[derive(Debug, Clone)]
pub struct PageSweep {
    /// Every locator must appear before a page counts as loaded
    pub ready: Vec<Locator>,
    pub timeout: Duration,
    pub max_pages: usize,
}

impl PageSweep {
    pub fn run<U, E>(&self, session: &mut dyn BrowsingSession, page_url: U, mut extract_page: E) -> Result<HashSet<Listing>>
    where
        U: Fn(usize) -> String,
        E: FnMut(&mut dyn BrowsingSession, &Html) -> Result<PageOutcome>,
    {
        let mut listings = HashSet::new();
        let mut seen_cards = HashSet::new();

        for page in 0..self.max_pages {
            let url = page_url(page);
            debug!("Requesting page {}: {}", page + 1, url);

            let outcome = match self.visit(session, &url, page, &mut extract_page) {
                Ok(Some(outcome)) => outcome,
                Ok(None) => return Ok(listings),
                Err(e) if page > 0 => {
                    warn!("Page {} failed, keeping the {} listings already found: {}", page + 1, listings.len(), e);
                    return Ok(listings);
                }
                Err(e) => return Err(e),
            };

            match outcome {
                PageOutcome::Stop { listings: found } => {
                    info!("Page {} reached the end of valid results", page + 1);
                    listings.extend(found);
                    return Ok(listings);
                }
                PageOutcome::Continue { cards, listings: found } => {
                    listings.extend(found);

                    let mut fresh = 0;
                    for card in cards {
                        if seen_cards.insert(card) {
                            fresh += 1;
                        }
                    }
                    if fresh == 0 {
                        info!("Page {} brought no new results, stopping", page + 1);
                        return Ok(listings);
                    }
                    debug!("Page {}: {} new results, {} listings kept so far", page + 1, fresh, listings.len());
                }
            }
        }

        warn!("Stopped after the {}-page cap", self.max_pages);
        Ok(listings)
    }

    /// Load one page and read it. `None` when a ready marker never shows up.
    fn visit<E>(&self, session: &mut dyn BrowsingSession, url: &str, page: usize, extract_page: &mut E) -> Result<Option<PageOutcome>>
    where
        E: FnMut(&mut dyn BrowsingSession, &Html) -> Result<PageOutcome>,
    {
        session.navigate(url)?;

        let timeout = self.timeout;
        if let Some(missing) = self.ready.iter().find(|l| !session.wait_for_selector(l, timeout)) {
            info!(
                "'{}' missing on page {} after {}s, treating it as past the last page",
                missing,
                page + 1,
                timeout.as_secs()
            );
            return Ok(None);
        }

        let document = session.current_document()?;
        extract_page(session, &document).map(Some)
    }
}

/// Infinite-scroll variant: keep scrolling and pressing a "load more" button
/// until it disappears or stops adding results.
#[derive(Debug, Clone)]
pub struct LoadMore {
    pub button: Locator,
    pub cards: Selector,
    pub timeout: Duration,
    pub max_rounds: usize,
}

impl LoadMore {
    /// Expand the current page fully and return its final document
    pub fn run(&self, session: &mut dyn BrowsingSession) -> Result<Html> {
        let mut last_count: Option<usize> = None;

        for round in 0..self.max_rounds {
            session.run_script(SCROLL_TO_BOTTOM)?;

            if !session.wait_for_selector(&self.button, self.timeout) {
                debug!("No '{}' after round {}, everything is loaded", self.button, round);
                return Ok(session.current_document()?);
            }

            let document = session.current_document()?;
            let count = document.select(&self.cards).count();
            if last_count.is_some_and(|last| count <= last) {
                info!("Loading more did not add results ({} shown), stopping", count);
                return Ok(document);
            }
            last_count = Some(count);

            if let Err(e) = session.click(&self.button) {
                warn!("Could not press '{}': {}", self.button, e);
                return Ok(document);
            }
        }

        warn!("Stopped loading more after {} rounds", self.max_rounds);
        Ok(session.current_document()?)
    }
}
