use bulletin_common::{Event, EventType};
use chrono::{DateTime, FixedOffset};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::problem::{DiffProblem, ValidationFailure};

// ---------------------------------------------------------------------------
// Diff document
// ---------------------------------------------------------------------------

/// A proposed change-set, as received. Entries stay raw JSON until the
/// validator decodes them, so every malformed field can be reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    #[serde(default)]
    pub add: Vec<Value>,
    #[serde(default)]
    pub cancel: Vec<Value>,
    #[serde(default)]
    pub update: Vec<Value>,
    #[serde(default)]
    pub remove: Vec<Value>,
}

const DIFF_KEYS: [&str; 4] = ["add", "cancel", "update", "remove"];

impl Diff {
    /// Parse the document's outer shape: an object whose only keys are the
    /// four operation lists.
    pub fn parse(json: &str) -> Result<Self, ValidationFailure> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            ValidationFailure::single(DiffProblem::schema("$", format!("not valid JSON: {e}")))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationFailure> {
        let Value::Object(mut obj) = value else {
            return Err(ValidationFailure::single(DiffProblem::schema(
                "$",
                "diff must be a JSON object",
            )));
        };

        let mut problems = Vec::new();
        for key in obj.keys() {
            if !DIFF_KEYS.contains(&key.as_str()) {
                problems.push(DiffProblem::schema(key.as_str(), "unknown operation list"));
            }
        }

        let mut list = |key: &str| -> Vec<Value> {
            match obj.remove(key) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(_) => {
                    problems.push(DiffProblem::schema(key, "must be an array"));
                    Vec::new()
                }
            }
        };

        let diff = Diff {
            add: list("add"),
            cancel: list("cancel"),
            update: list("update"),
            remove: list("remove"),
        };

        if problems.is_empty() {
            Ok(diff)
        } else {
            Err(ValidationFailure { problems })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.cancel.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Decoded entries
// ---------------------------------------------------------------------------

/// Identifies an existing event without its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MatchRef {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub datetime: DateTime<FixedOffset>,
    /// Compared trimmed and case-insensitively.
    pub location: String,
    /// Narrows the match to one source when the key alone is ambiguous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Field-level patch. Omitted fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    /// Only accepted when the validation policy allows folding cancellation
    /// into updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }

    /// Shallow merge: patch fields overwrite, everything else is kept.
    pub fn apply(&self, event: &mut Event) {
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let Some(datetime) = self.datetime {
            event.datetime = datetime;
        }
        if let Some(time_desc) = &self.time_desc {
            event.time_desc = time_desc.clone();
        }
        if let Some(details) = &self.details {
            event.details = details.clone();
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(cancelled) = self.cancelled {
            event.cancelled = cancelled;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEntry {
    #[serde(rename = "match")]
    pub target: MatchRef,
    pub patch: EventPatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_lists_default_to_empty() {
        let diff = Diff::parse(r#"{"cancel": []}"#).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn outer_shape_problems_are_collected() {
        let err = Diff::parse(r#"{"add": {}, "rename": []}"#).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert!(err.problems.contains(&DiffProblem::Schema {
            path: "add".into(),
            message: "must be an array".into(),
        }));
        assert!(err.problems.contains(&DiffProblem::Schema {
            path: "rename".into(),
            message: "unknown operation list".into(),
        }));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let err = Diff::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.problems.len(), 1);
    }

    #[test]
    fn apply_only_touches_patched_fields() {
        let mut event: Event = serde_json::from_value(json!({
            "id": 9,
            "source": "epi",
            "location": "epi",
            "datetime": "2025-03-01T09:00:00-06:00",
            "time_desc": "9am",
            "details": "Ash Wednesday",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 2,
            "type": "mass"
        }))
        .unwrap();
        let before = event.clone();

        let patch = EventPatch {
            time_desc: Some("9:30am".into()),
            ..EventPatch::default()
        };
        patch.apply(&mut event);

        assert_eq!(event.time_desc, "9:30am");
        assert_eq!(event.details, before.details);
        assert_eq!(event.datetime, before.datetime);
        assert_eq!(event.location, before.location);
    }
}
