use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Store-assigned event identifier. Never reused, never decremented.
pub type EventId = u64;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Misc,
    Mass,
    Adoration,
    Confession,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Misc,
        EventType::Mass,
        EventType::Adoration,
        EventType::Confession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Misc => "misc",
            EventType::Mass => "mass",
            EventType::Adoration => "adoration",
            EventType::Confession => "confession",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A catalogued event as held in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Originating parish/feed (e.g. "hspht").
    pub source: String,
    /// Church code or free text.
    pub location: String,
    /// The point in time used for ordering and expiry.
    pub datetime: DateTime<FixedOffset>,
    /// Human description of the timing; may say more than `datetime` does
    /// ("3pm until mass").
    pub time_desc: String,
    #[serde(default)]
    pub details: String,
    pub bulletin_url: String,
    pub bulletin_page: u32,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub cancelled: bool,
}

/// An event before enactment. `id` is always null at this stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CandidateEvent {
    /// Always null. Identifiers are assigned on enactment.
    #[serde(default)]
    pub id: Option<EventId>,
    pub source: String,
    pub location: String,
    /// RFC 3339 with offset, e.g. "2025-03-01T09:00:00-06:00".
    pub datetime: DateTime<FixedOffset>,
    pub time_desc: String,
    #[serde(default)]
    pub details: String,
    pub bulletin_url: String,
    /// 1-based page of the bulletin PDF the event was read from.
    pub bulletin_page: u32,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub cancelled: bool,
}

impl CandidateEvent {
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            source: self.source,
            location: self.location,
            datetime: self.datetime,
            time_desc: self.time_desc,
            details: self.details,
            bulletin_url: self.bulletin_url,
            bulletin_page: self.bulletin_page,
            event_type: self.event_type,
            cancelled: self.cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection bookkeeping
// ---------------------------------------------------------------------------

/// Per-source collection cursor. Only the scraping stage moves it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCursor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_collected: Option<NaiveDate>,
}

/// A downloaded bulletin PDF awaiting (or past) extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinRecord {
    pub source: String,
    pub date: NaiveDate,
    pub url: String,
    pub local_path: String,
    #[serde(default)]
    pub processed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_round_trips_through_its_wire_name() {
        for t in EventType::ALL {
            assert_eq!(EventType::parse(t.as_str()), Some(t));
            assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
        }
        assert_eq!(EventType::parse("vespers"), None);
    }

    #[test]
    fn event_defaults_details_and_cancelled() {
        let event: Event = serde_json::from_value(json!({
            "id": 4,
            "source": "epi",
            "location": "epi",
            "datetime": "2025-03-01T16:00:00-06:00",
            "time_desc": "4pm",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 2,
            "type": "mass"
        }))
        .unwrap();

        assert_eq!(event.details, "");
        assert!(!event.cancelled);
        assert_eq!(event.event_type, EventType::Mass);
    }

    #[test]
    fn candidate_into_event_keeps_every_field() {
        let candidate: CandidateEvent = serde_json::from_value(json!({
            "id": null,
            "source": "smb",
            "location": "smb",
            "datetime": "2025-03-02T08:30:00-06:00",
            "time_desc": "8:30am",
            "details": "Lenten schedule",
            "bulletin_url": "https://example.org/smb.pdf",
            "bulletin_page": 3,
            "type": "confession",
            "cancelled": true
        }))
        .unwrap();

        let event = candidate.clone().into_event(12);
        assert_eq!(event.id, 12);
        assert_eq!(event.details, candidate.details);
        assert_eq!(event.datetime, candidate.datetime);
        assert!(event.cancelled);
    }
}
