//! Upstream pipeline stages: bulletin discovery and download (`scrape`), and
//! candidate-event extraction through an external model CLI (`extract`) over
//! schedule-page excerpts (`excerpt`).
//!
//! Network and model access sit behind `BulletinFetcher` and
//! `BulletinExtractor` so both stages run against in-memory doubles in tests.

pub mod excerpt;
pub mod extract;
pub mod fetch;
pub mod scrape;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use extract::{BulletinExtractor, CliExtractor, ProcessOutcome, ProcessStats, Processor};
pub use fetch::{BulletinFetcher, HttpFetcher};
pub use scrape::{ScrapeStats, Scraper};
