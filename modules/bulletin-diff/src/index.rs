//! Match-reference resolution.
//!
//! Built once per validation. References resolve by key, so every operation
//! kind shares one matching policy.

use std::collections::HashMap;

use bulletin_common::{CandidateEvent, Event, EventId, EventType};
use bulletin_store::Store;
use chrono::{DateTime, FixedOffset, Utc};

use crate::model::MatchRef;

/// `(type, instant, location)`. Instants compare across offsets; locations
/// compare trimmed, whitespace-collapsed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub event_type: EventType,
    pub instant: DateTime<Utc>,
    pub location: String,
}

impl MatchKey {
    pub fn new(event_type: EventType, datetime: &DateTime<FixedOffset>, location: &str) -> Self {
        Self {
            event_type,
            instant: datetime.with_timezone(&Utc),
            location: normalize_location(location),
        }
    }

    pub fn of_event(event: &Event) -> Self {
        Self::new(event.event_type, &event.datetime, &event.location)
    }

    pub fn of_candidate(candidate: &CandidateEvent) -> Self {
        Self::new(candidate.event_type, &candidate.datetime, &candidate.location)
    }

    pub fn of_ref(reference: &MatchRef) -> Self {
        Self::new(reference.event_type, &reference.datetime, &reference.location)
    }
}

pub fn normalize_location(location: &str) -> String {
    location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct MatchIndex<'s> {
    by_key: HashMap<MatchKey, Vec<&'s Event>>,
}

impl<'s> MatchIndex<'s> {
    pub fn build(store: &'s Store) -> Self {
        let mut by_key: HashMap<MatchKey, Vec<&'s Event>> = HashMap::new();
        for event in &store.events {
            by_key.entry(MatchKey::of_event(event)).or_default().push(event);
        }
        Self { by_key }
    }

    /// Stored events sharing a key, in store order.
    pub fn lookup(&self, key: &MatchKey) -> &[&'s Event] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of every stored event the reference matches.
    pub fn resolve(&self, reference: &MatchRef) -> Vec<EventId> {
        let source = reference.source.as_deref().map(str::trim);
        self.lookup(&MatchKey::of_ref(reference))
            .iter()
            .filter(|e| source.map_or(true, |s| e.source == s))
            .map(|e| e.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: EventId, source: &str, location: &str, datetime: &str) -> Event {
        Event {
            id,
            source: source.into(),
            location: location.into(),
            datetime: DateTime::parse_from_rfc3339(datetime).unwrap(),
            time_desc: String::new(),
            details: String::new(),
            bulletin_url: "https://example.org/b.pdf".into(),
            bulletin_page: 2,
            event_type: EventType::Mass,
            cancelled: false,
        }
    }

    fn reference(location: &str, datetime: &str, source: Option<&str>) -> MatchRef {
        MatchRef {
            event_type: EventType::Mass,
            datetime: DateTime::parse_from_rfc3339(datetime).unwrap(),
            location: location.into(),
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn resolves_across_offsets_and_location_case() {
        let store = Store {
            next_id: 2,
            events: vec![event(1, "hspht", "HSP", "2025-03-08T17:00:00-06:00")],
            ..Store::default()
        };
        let index = MatchIndex::build(&store);

        let ids = index.resolve(&reference("  hsp ", "2025-03-08T23:00:00+00:00", None));
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn source_narrows_an_ambiguous_key() {
        let store = Store {
            next_id: 3,
            events: vec![
                event(1, "hspht", "unk", "2025-03-08T17:00:00-06:00"),
                event(2, "smb", "unk", "2025-03-08T17:00:00-06:00"),
            ],
            ..Store::default()
        };
        let index = MatchIndex::build(&store);

        assert_eq!(
            index.resolve(&reference("unk", "2025-03-08T17:00:00-06:00", None)),
            vec![1, 2]
        );
        assert_eq!(
            index.resolve(&reference("unk", "2025-03-08T17:00:00-06:00", Some("smb"))),
            vec![2]
        );
    }

    #[test]
    fn different_type_does_not_match() {
        let store = Store {
            next_id: 2,
            events: vec![event(1, "epi", "epi", "2025-03-08T17:00:00-06:00")],
            ..Store::default()
        };
        let index = MatchIndex::build(&store);

        let mut r = reference("epi", "2025-03-08T17:00:00-06:00", None);
        r.event_type = EventType::Confession;
        assert!(index.resolve(&r).is_empty());
    }
}
