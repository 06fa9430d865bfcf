//! Paths and orderings the static site renders from.
//!
//! The site itself is built elsewhere; these helpers pin down the contract:
//! one detail page per event id, a proof link into the bulletin PDF, and one
//! listing per event type sorted by `datetime`.

use crate::types::{Event, EventId, EventType};

/// Site-relative path of an event's detail page.
pub fn detail_path(id: EventId) -> String {
    format!("events/{id}/")
}

/// Site-relative path of a type's listing page.
pub fn listing_path(event_type: EventType) -> String {
    format!("{event_type}/")
}

/// Link to the bulletin page the event was read from.
pub fn proof_link(event: &Event) -> String {
    let base = event
        .bulletin_url
        .split_once('#')
        .map_or(event.bulletin_url.as_str(), |(base, _)| base);
    format!("{base}#page={}", event.bulletin_page)
}

/// Events of one type, ascending by `datetime` (ties broken by id).
pub fn listing(events: &[Event], event_type: EventType) -> Vec<&Event> {
    let mut out: Vec<&Event> = events
        .iter()
        .filter(|e| e.event_type == event_type)
        .collect();
    out.sort_by(|a, b| a.datetime.cmp(&b.datetime).then(a.id.cmp(&b.id)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn event(id: EventId, event_type: EventType, datetime: &str) -> Event {
        Event {
            id,
            source: "epi".into(),
            location: "epi".into(),
            datetime: DateTime::parse_from_rfc3339(datetime).unwrap(),
            time_desc: String::new(),
            details: String::new(),
            bulletin_url: "https://example.org/epi/20250302B.pdf".into(),
            bulletin_page: 2,
            event_type,
            cancelled: false,
        }
    }

    #[test]
    fn proof_link_appends_page_fragment() {
        let e = event(1, EventType::Mass, "2025-03-02T09:00:00-06:00");
        assert_eq!(
            proof_link(&e),
            "https://example.org/epi/20250302B.pdf#page=2"
        );
    }

    #[test]
    fn proof_link_replaces_existing_fragment() {
        let mut e = event(1, EventType::Mass, "2025-03-02T09:00:00-06:00");
        e.bulletin_url = "https://example.org/b.pdf#view=fit".into();
        e.bulletin_page = 3;
        assert_eq!(proof_link(&e), "https://example.org/b.pdf#page=3");
    }

    #[test]
    fn listing_filters_by_type_and_sorts_by_instant() {
        let events = vec![
            event(1, EventType::Mass, "2025-03-03T09:00:00-06:00"),
            event(2, EventType::Confession, "2025-03-01T15:00:00-06:00"),
            // Same instant as id 1 expressed in UTC.
            event(3, EventType::Mass, "2025-03-03T15:00:00+00:00"),
            event(4, EventType::Mass, "2025-03-02T17:00:00-06:00"),
        ];

        let ids: Vec<EventId> = listing(&events, EventType::Mass)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![4, 1, 3]);
    }

    #[test]
    fn paths_are_keyed_by_id_and_type() {
        assert_eq!(detail_path(42), "events/42/");
        assert_eq!(listing_path(EventType::Adoration), "adoration/");
    }
}
