//! Durable event catalog: one JSON document holding every known event, the
//! per-source collection cursors and the next identifier to assign.
//!
//! The whole document is the unit of durability. Reads check the invariants
//! (unique ids, `next_id` above every id) and refuse corrupt state; writes
//! replace the file atomically.

pub mod error;
pub mod store;
pub mod types;

pub use error::{CorruptStoreError, StoreError};
pub use store::{parse_store, write_json_atomic, StoreFile};
pub use types::Store;
