pub mod airbnb;
pub mod booking;
pub mod mediaferias;
pub mod network;
pub mod pagination;
pub mod retry;
pub mod tabs;
pub mod traits;
pub mod types;
pub mod vrbo;

use crate::config::Settings;
use crate::models::Source;
use std::sync::Arc;

pub use airbnb::AirbnbExtractor;
pub use booking::BookingExtractor;
pub use mediaferias::MediaFeriasExtractor;
pub use traits::Extractor;
pub use vrbo::VrboExtractor;

/// Build the extractor for one source from the run settings
pub fn extractor_for(source: Source, settings: &Settings) -> Arc<dyn Extractor> {
    let (criteria, engine) = (&settings.criteria, &settings.engine);
    match source {
        Source::Airbnb => Arc::new(AirbnbExtractor::new(criteria, engine)),
        Source::Booking => Arc::new(BookingExtractor::new(criteria, engine)),
        Source::MediaFerias => Arc::new(MediaFeriasExtractor::new(criteria, engine)),
        Source::Vrbo => Arc::new(VrboExtractor::new(criteria, engine)),
    }
}

/// Extractors for every enabled source, in configured order
pub fn build_extractors(settings: &Settings) -> Vec<Arc<dyn Extractor>> {
    settings
        .sources
        .iter()
        .map(|source| extractor_for(*source, settings))
        .collect()
}
