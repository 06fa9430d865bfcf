//! Proposed change-sets against the event store, and their validation.
//!
//! A diff arrives as an untrusted JSON document (`add` / `cancel` / `update` /
//! `remove`). Existing events are referenced by match references rather than
//! ids, since upstream candidates never carry one. `validate` decodes every
//! entry, resolves every reference against the store, and either returns a
//! `ValidatedDiff` (the only input enactment accepts) or every problem found.

pub mod decode;
pub mod index;
pub mod model;
pub mod problem;
pub mod schema;
pub mod validate;

pub use index::{MatchIndex, MatchKey};
pub use model::{Diff, EventPatch, MatchRef, UpdateEntry};
pub use problem::{DiffProblem, ValidationFailure};
pub use validate::{validate, ValidatedDiff, ValidationPolicy, ValidationResult, Validator};
