//! Diff validation.
//!
//! Pure: reads the store, never mutates it, and returns the same answer for
//! the same inputs. Problems are aggregated across the whole diff.

use std::collections::{BTreeMap, HashMap, HashSet};

use bulletin_common::{CandidateEvent, EventId};
use bulletin_store::Store;
use tracing::{debug, info};

use crate::decode;
use crate::index::{MatchIndex, MatchKey};
use crate::model::{Diff, EventPatch, MatchRef};
use crate::problem::{DiffProblem, ValidationFailure};

pub type ValidationResult = Result<ValidatedDiff, ValidationFailure>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Let an update patch set `cancelled` instead of requiring a separate
    /// `cancel` entry.
    pub allow_cancel_in_update: bool,
}

/// A diff that passed validation against one specific store state, with every
/// reference resolved to an id. Only `validate` can produce one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDiff {
    store_fingerprint: String,
    additions: Vec<CandidateEvent>,
    cancellations: Vec<EventId>,
    updates: Vec<(EventId, EventPatch)>,
    removals: Vec<EventId>,
}

impl ValidatedDiff {
    /// Fingerprint of the store this diff was validated against.
    pub fn store_fingerprint(&self) -> &str {
        &self.store_fingerprint
    }

    pub fn additions(&self) -> &[CandidateEvent] {
        &self.additions
    }

    pub fn cancellations(&self) -> &[EventId] {
        &self.cancellations
    }

    pub fn updates(&self) -> &[(EventId, EventPatch)] {
        &self.updates
    }

    pub fn removals(&self) -> &[EventId] {
        &self.removals
    }
}

/// Validate with the default policy.
pub fn validate(store: &Store, diff: &Diff) -> ValidationResult {
    Validator::default().validate(store, diff)
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: ValidationPolicy,
}

impl Validator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn validate(&self, store: &Store, diff: &Diff) -> ValidationResult {
        let index = MatchIndex::build(store);
        let mut problems = Vec::new();
        // Resolved target → every path that targets it.
        let mut targets: BTreeMap<EventId, Vec<String>> = BTreeMap::new();

        // 1. Additions
        let mut additions = Vec::with_capacity(diff.add.len());
        for (i, value) in diff.add.iter().enumerate() {
            let path = format!("add[{i}]");
            match decode::candidate(&path, value) {
                Ok(candidate) => additions.push((path, candidate)),
                Err(mut found) => problems.append(&mut found),
            }
        }

        // 2. Cancellations
        let mut cancellations = Vec::with_capacity(diff.cancel.len());
        for (i, value) in diff.cancel.iter().enumerate() {
            let path = format!("cancel[{i}]");
            let resolved = match decode::match_ref(&path, value) {
                Ok(reference) => resolve(&index, &path, &reference, &mut problems),
                Err(mut found) => {
                    problems.append(&mut found);
                    None
                }
            };
            if let Some(id) = resolved {
                targets.entry(id).or_default().push(path);
                cancellations.push(id);
            }
        }

        // 3. Updates
        let mut updates = Vec::with_capacity(diff.update.len());
        let mut update_paths = Vec::with_capacity(diff.update.len());
        for (i, value) in diff.update.iter().enumerate() {
            let path = format!("update[{i}]");
            let entry = match decode::update(&path, value, self.policy.allow_cancel_in_update) {
                Ok(entry) => entry,
                Err(mut found) => {
                    problems.append(&mut found);
                    continue;
                }
            };
            let match_path = format!("{path}.match");
            if let Some(id) = resolve(&index, &match_path, &entry.target, &mut problems) {
                targets.entry(id).or_default().push(match_path);
                updates.push((id, entry.patch));
                update_paths.push(path);
            }
        }

        // 4. Removals
        let mut removals = Vec::with_capacity(diff.remove.len());
        for (i, value) in diff.remove.iter().enumerate() {
            let path = format!("remove[{i}]");
            let resolved = match decode::match_ref(&path, value) {
                Ok(reference) => resolve(&index, &path, &reference, &mut problems),
                Err(mut found) => {
                    problems.append(&mut found);
                    None
                }
            };
            if let Some(id) = resolved {
                targets.entry(id).or_default().push(path);
                removals.push(id);
            }
        }

        // 5. One operation per event
        for (id, paths) in &targets {
            if paths.len() > 1 {
                problems.push(DiffProblem::ConflictingOperation {
                    id: *id,
                    paths: paths.clone(),
                });
            }
        }

        // 6. No two surviving events may share a key once the diff applies
        let removed: HashSet<EventId> = removals.iter().copied().collect();
        let moved = moved_keys(store, &updates, &update_paths);
        let mut settled: HashMap<MatchKey, Vec<(EventId, String)>> = HashMap::new();
        for event in store.events.iter().filter(|e| !removed.contains(&e.id)) {
            let (key, label) = match moved.get(&event.id) {
                Some((path, key)) => (key.clone(), (*path).to_string()),
                None => (MatchKey::of_event(event), format!("stored event {}", event.id)),
            };
            settled.entry(key).or_default().push((event.id, label));
        }

        for ((id, _), path) in updates.iter().zip(&update_paths) {
            let Some((moved_path, key)) = moved.get(id) else {
                continue;
            };
            if *moved_path != path.as_str() || removed.contains(id) {
                continue;
            }
            let clash = settled
                .get(key)
                .and_then(|occupants| occupants.iter().find(|(other, _)| other != id));
            if let Some((_, label)) = clash {
                problems.push(DiffProblem::DuplicateUpdate {
                    path: format!("{path}.patch"),
                    duplicate_of: label.clone(),
                });
            }
        }

        let mut added_keys: HashMap<MatchKey, &str> = HashMap::new();
        for (path, candidate) in &additions {
            let key = MatchKey::of_candidate(candidate);
            if let Some((_, label)) = settled.get(&key).and_then(|occupants| occupants.first()) {
                problems.push(DiffProblem::DuplicateAdd {
                    path: path.clone(),
                    duplicate_of: label.clone(),
                });
            }
            match added_keys.get(&key) {
                Some(first) => problems.push(DiffProblem::DuplicateAdd {
                    path: path.clone(),
                    duplicate_of: (*first).to_string(),
                }),
                None => {
                    added_keys.insert(key, path.as_str());
                }
            }
        }

        if !problems.is_empty() {
            info!(problems = problems.len(), "Diff rejected");
            return Err(ValidationFailure { problems });
        }

        debug!(
            add = additions.len(),
            cancel = cancellations.len(),
            update = updates.len(),
            remove = removals.len(),
            "Diff validated"
        );

        Ok(ValidatedDiff {
            store_fingerprint: store.fingerprint(),
            additions: additions.into_iter().map(|(_, c)| c).collect(),
            cancellations,
            updates,
            removals,
        })
    }
}

/// Keys of updated events whose patch moves them off their stored key, with
/// the path of the update that does it.
fn moved_keys<'d>(
    store: &Store,
    updates: &[(EventId, EventPatch)],
    paths: &'d [String],
) -> HashMap<EventId, (&'d str, MatchKey)> {
    updates
        .iter()
        .zip(paths)
        .filter_map(|((id, patch), path)| {
            let event = store.event(*id)?;
            let mut after = event.clone();
            patch.apply(&mut after);
            let key = MatchKey::of_event(&after);
            (key != MatchKey::of_event(event)).then(|| (*id, (path.as_str(), key)))
        })
        .collect()
}

/// Exactly one match, or a problem.
fn resolve(
    index: &MatchIndex<'_>,
    path: &str,
    reference: &MatchRef,
    problems: &mut Vec<DiffProblem>,
) -> Option<EventId> {
    let ids = index.resolve(reference);
    match ids.as_slice() {
        [id] => Some(*id),
        [] => {
            problems.push(DiffProblem::UnknownMatch {
                path: path.to_string(),
            });
            None
        }
        _ => {
            problems.push(DiffProblem::AmbiguousMatch {
                path: path.to_string(),
                ids,
            });
            None
        }
    }
}
