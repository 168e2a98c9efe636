//! Geocoding listings through their detail pages, a batch of tabs at a time.

use crate::error::{Result, ScrapeError};
use crate::geo::Coordinate;
use crate::session::{BrowsingSession, Locator, TabHandle};
use scraper::Html;
use std::time::Duration;
use tracing::{debug, warn};

/// Opens detail pages in secondary tabs, never more than `batch_size` at once
#[derive(Debug, Clone)]
pub struct TabBatch {
    /// Element whose presence means the location data has rendered
    pub marker: Locator,
    pub timeout: Duration,
    pub batch_size: usize,
}

impl TabBatch {
    /// Locate every url, in order. `None` marks a page that never showed a
    /// usable location in time.
    pub fn locate_all<L>(&self, session: &mut dyn BrowsingSession, urls: &[String], mut locate: L) -> Result<Vec<Option<Coordinate>>>
    where
        L: FnMut(&Html) -> Result<Coordinate>,
    {
        let primary = session
            .list_open_handles()
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::Session("no open tab to return to".to_string()))?;

        let mut located = Vec::with_capacity(urls.len());

        for (batch, chunk) in urls.chunks(self.batch_size.max(1)).enumerate() {
            debug!("Opening detail batch {} ({} tabs)", batch + 1, chunk.len());

            let mut open: Vec<TabHandle> = Vec::with_capacity(chunk.len());
            if let Err(e) = self.locate_batch(session, chunk, &mut open, &mut located, &mut locate) {
                warn!("Detail batch {} failed, closing its {} open tabs: {}", batch + 1, open.len(), e);
                Self::close_all(session, &open, &primary);
                return Err(e);
            }

            session.switch_to(&primary)?;
        }

        Ok(located)
    }

    /// Open every url of the batch, then read and close the tabs in order.
    /// `open` tracks the tabs not yet closed.
    fn locate_batch<L>(
        &self,
        session: &mut dyn BrowsingSession,
        chunk: &[String],
        open: &mut Vec<TabHandle>,
        located: &mut Vec<Option<Coordinate>>,
        locate: &mut L,
    ) -> Result<()>
    where
        L: FnMut(&Html) -> Result<Coordinate>,
    {
        for url in chunk {
            open.push(session.open_background_tab(url)?);
        }

        for url in chunk {
            let handle = open[0].clone();
            session.switch_to(&handle)?;
            let coordinate = match self.locate_one(session, locate) {
                Ok(coordinate) => Some(coordinate),
                Err(e) => {
                    warn!("Location not found for {}: {}", url, e);
                    None
                }
            };
            session.close_current_tab()?;
            open.remove(0);
            located.push(coordinate);
        }

        Ok(())
    }

    fn close_all(session: &mut dyn BrowsingSession, open: &[TabHandle], primary: &TabHandle) {
        for handle in open {
            if let Err(e) = session.switch_to(handle).and_then(|_| session.close_current_tab()) {
                debug!("Could not close tab {:?}: {}", handle, e);
            }
        }
        if let Err(e) = session.switch_to(primary) {
            warn!("Could not return to the primary tab: {}", e);
        }
    }

    fn locate_one<L>(&self, session: &mut dyn BrowsingSession, locate: &mut L) -> Result<Coordinate>
    where
        L: FnMut(&Html) -> Result<Coordinate>,
    {
        if !session.wait_for_selector(&self.marker, self.timeout) {
            return Err(ScrapeError::Timeout {
                what: self.marker.to_string(),
                secs: self.timeout.as_secs(),
            });
        }
        let document = session.current_document()?;
        locate(&document)
    }
}
