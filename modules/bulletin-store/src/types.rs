use std::collections::{BTreeMap, HashSet};

use bulletin_common::{BulletinRecord, Event, EventId, SourceCursor};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CorruptStoreError;

/// The whole catalog. Event order is insertion order; consumers sort by
/// `datetime` for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceCursor>,
    pub next_id: EventId,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub bulletins: Vec<BulletinRecord>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            next_id: 1,
            events: Vec::new(),
            bulletins: Vec::new(),
        }
    }
}

impl Store {
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn max_id(&self) -> Option<EventId> {
        self.events.iter().map(|e| e.id).max()
    }

    /// Unique ids, `next_id` strictly above all of them, and the fields every
    /// event needs to be matched and linked to its bulletin.
    pub fn check_invariants(&self) -> Result<(), CorruptStoreError> {
        if self.next_id == 0 {
            return Err(CorruptStoreError::ZeroNextId);
        }

        let mut seen = HashSet::with_capacity(self.events.len());
        for event in &self.events {
            if !seen.insert(event.id) {
                return Err(CorruptStoreError::DuplicateId { id: event.id });
            }
            check_fields(event)?;
        }

        if let Some(max_id) = self.max_id() {
            if self.next_id <= max_id {
                return Err(CorruptStoreError::NextIdNotAbove {
                    next_id: self.next_id,
                    max_id,
                });
            }
        }

        Ok(())
    }

    /// Digest of everything enactment reads: `next_id` and every event field,
    /// in stored order. Cursors and bulletin records are excluded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.next_id.to_le_bytes());
        for event in &self.events {
            hasher.update(event.id.to_le_bytes());
            let datetime = event.datetime.to_rfc3339();
            for field in [
                event.source.as_str(),
                event.location.as_str(),
                datetime.as_str(),
                event.time_desc.as_str(),
                event.details.as_str(),
                event.bulletin_url.as_str(),
                event.event_type.as_str(),
            ] {
                hasher.update((field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
            hasher.update(event.bulletin_page.to_le_bytes());
            hasher.update([event.cancelled as u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Cursor for a source, if it has ever been collected.
    pub fn last_collected(&self, source: &str) -> Option<NaiveDate> {
        self.sources.get(source).and_then(|c| c.last_collected)
    }

    /// Move a source's cursor forward. Earlier dates are ignored.
    pub fn advance_cursor(&mut self, source: &str, date: NaiveDate) {
        let cursor = self.sources.entry(source.to_string()).or_default();
        if cursor.last_collected.map_or(true, |existing| date > existing) {
            cursor.last_collected = Some(date);
        }
    }

    /// Record a downloaded bulletin. Returns false if `(source, date)` was
    /// already recorded.
    pub fn record_bulletin(&mut self, record: BulletinRecord) -> bool {
        let known = self
            .bulletins
            .iter()
            .any(|b| b.source == record.source && b.date == record.date);
        if known {
            return false;
        }
        self.bulletins.push(record);
        true
    }
}

fn check_fields(event: &Event) -> Result<(), CorruptStoreError> {
    let invalid = |field, problem| CorruptStoreError::InvalidField {
        id: event.id,
        field,
        problem,
    };
    for (field, value) in [
        ("source", &event.source),
        ("location", &event.location),
        ("bulletin_url", &event.bulletin_url),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(field, "is empty"));
        }
    }
    if event.bulletin_page == 0 {
        return Err(invalid("bulletin_page", "must be a positive page number"));
    }
    Ok(())
}
