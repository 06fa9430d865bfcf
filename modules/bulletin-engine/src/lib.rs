//! Enactment of validated diffs.
//!
//! Applies a `ValidatedDiff` to a copy of the store in fixed passes
//! (expire → remove → cancel → update → add) and returns the new store with a
//! summary. The input store is never touched; on error nothing is returned
//! but the error.

pub mod enact;
pub mod error;
pub mod summary;

pub use enact::{is_elapsed, Enactor};
pub use error::EnactError;
pub use summary::Summary;
