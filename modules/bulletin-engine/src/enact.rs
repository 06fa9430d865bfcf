use std::collections::HashSet;

use bulletin_common::{Event, EventId};
use bulletin_diff::ValidatedDiff;
use bulletin_store::Store;
use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::{debug, info};

use crate::error::EnactError;
use crate::summary::Summary;

/// An event is elapsed once its own calendar day has been reached; an event
/// dated today is already past.
pub fn is_elapsed(datetime: &DateTime<FixedOffset>, today: NaiveDate) -> bool {
    datetime.date_naive() <= today
}

/// Applies validated diffs as of one processing date.
#[derive(Debug, Clone, Copy)]
pub struct Enactor {
    today: NaiveDate,
}

impl Enactor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Apply `diff` to a copy of `store`. The diff must have been validated
    /// against exactly this store state.
    pub fn enact(&self, store: &Store, diff: &ValidatedDiff) -> Result<(Store, Summary), EnactError> {
        let fingerprint = store.fingerprint();
        if fingerprint != diff.store_fingerprint() {
            return Err(EnactError::Precondition(
                "diff was validated against a different store state; validate it again".into(),
            ));
        }

        let mut next = store.clone();
        let mut summary = Summary::default();

        // 1. Expire
        let expired = self.expire(&mut next.events);
        summary.expired = expired.len();

        // 2. Remove
        for &id in diff.removals() {
            if expired.contains(&id) {
                continue;
            }
            let pos = position(&next.events, id)?;
            next.events.remove(pos);
            summary.removed += 1;
        }

        // 3. Cancel
        for &id in diff.cancellations() {
            if expired.contains(&id) {
                continue;
            }
            let pos = position(&next.events, id)?;
            let event = &mut next.events[pos];
            if !event.cancelled {
                event.cancelled = true;
                summary.cancelled += 1;
            }
        }

        // 4. Update
        for (id, patch) in diff.updates() {
            if expired.contains(id) {
                continue;
            }
            let pos = position(&next.events, *id)?;
            patch.apply(&mut next.events[pos]);
            if is_elapsed(&next.events[pos].datetime, self.today) {
                debug!(id, "Update moved event into the past, expiring");
                next.events.remove(pos);
                summary.expired += 1;
            } else {
                summary.updated += 1;
            }
        }

        // 5. Add
        for candidate in diff.additions() {
            if is_elapsed(&candidate.datetime, self.today) {
                debug!(location = %candidate.location, datetime = %candidate.datetime, "Discarding elapsed addition");
                summary.discarded += 1;
                continue;
            }
            let id = next.next_id;
            next.next_id = id
                .checked_add(1)
                .ok_or(EnactError::IdSpaceExhausted(id))?;
            next.events.push(candidate.clone().into_event(id));
            summary.new_ids.push(id);
            summary.added += 1;
        }

        info!(
            today = %self.today,
            expired = summary.expired,
            removed = summary.removed,
            cancelled = summary.cancelled,
            updated = summary.updated,
            added = summary.added,
            next_id = next.next_id,
            "Diff enacted"
        );

        Ok((next, summary))
    }

    fn expire(&self, events: &mut Vec<Event>) -> HashSet<EventId> {
        let mut expired = HashSet::new();
        events.retain(|e| {
            let elapsed = is_elapsed(&e.datetime, self.today);
            if elapsed {
                expired.insert(e.id);
            }
            !elapsed
        });
        expired
    }
}

/// A validated target that is neither expired nor present means the store
/// changed under the diff.
fn position(events: &[Event], id: EventId) -> Result<usize, EnactError> {
    events
        .iter()
        .position(|e| e.id == id)
        .ok_or_else(|| EnactError::Precondition(format!("validated target event {id} is missing")))
}
