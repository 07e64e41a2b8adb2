pub mod extract;
pub mod fetch;
pub mod logging;
pub mod manager;
pub mod normalize;
pub mod profile;

pub use extract::{CandidateRecord, Extractor};
pub use fetch::{FetchConfig, Fetcher};
pub use manager::{RecordOutcome, ScrapeSummary, ScraperManager, SkippedRecord};
pub use normalize::Normalizer;
pub use profile::{Field, FieldRule, LookupPath, SiteProfile, Substitution};

pub mod prelude {
    pub use super::{ScrapeSummary, ScraperManager, SiteProfile};
    pub use vx_core::{Article, Error, Result};
}
