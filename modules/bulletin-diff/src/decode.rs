//! Field-by-field decoding of diff entries.
//!
//! Each decoder reports one problem per offending field instead of stopping
//! at the first, so an operator sees everything wrong with an entry at once.

use bulletin_common::{CandidateEvent, EventType};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::model::{EventPatch, MatchRef, UpdateEntry};
use crate::problem::DiffProblem;

/// Fields an update may never touch: identity and provenance.
pub const IMMUTABLE_FIELDS: [&str; 4] = ["id", "source", "bulletin_url", "bulletin_page"];

const EVENT_FIELDS: [&str; 10] = [
    "id",
    "source",
    "location",
    "datetime",
    "time_desc",
    "details",
    "bulletin_url",
    "bulletin_page",
    "type",
    "cancelled",
];

const MATCH_FIELDS: [&str; 4] = ["type", "datetime", "location", "source"];

// ---------------------------------------------------------------------------
// Value converters
// ---------------------------------------------------------------------------

type Convert<T> = fn(&Value) -> Result<T, String>;

fn text(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected a string, got {}", describe(value)))
}

fn non_empty_text(value: &Value) -> Result<String, String> {
    let s = text(value)?;
    if s.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    Ok(s)
}

fn datetime(value: &Value) -> Result<DateTime<FixedOffset>, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("expected an RFC 3339 timestamp, got {}", describe(value)))?;
    DateTime::parse_from_rfc3339(s)
        .map_err(|_| format!("expected an RFC 3339 timestamp with a UTC offset, got {s:?}"))
}

fn event_type(value: &Value) -> Result<EventType, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("expected an event type, got {}", describe(value)))?;
    EventType::parse(s).ok_or_else(|| {
        let allowed: Vec<&str> = EventType::ALL.iter().map(EventType::as_str).collect();
        format!("unknown event type {s:?}, expected one of {}", allowed.join(", "))
    })
}

fn page(value: &Value) -> Result<u32, String> {
    value
        .as_u64()
        .filter(|&n| n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| format!("expected a positive page number, got {}", describe(value)))
}

fn absolute_url(value: &Value) -> Result<String, String> {
    let s = text(value)?;
    url::Url::parse(&s).map_err(|e| format!("not an absolute URL ({e}): {s:?}"))?;
    Ok(s)
}

fn flag(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected true or false, got {}", describe(value)))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{s:?}"),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

// ---------------------------------------------------------------------------
// FieldReader
// ---------------------------------------------------------------------------

struct FieldReader<'a> {
    path: &'a str,
    obj: &'a Map<String, Value>,
    problems: Vec<DiffProblem>,
}

impl<'a> FieldReader<'a> {
    fn new(path: &'a str, obj: &'a Map<String, Value>) -> Self {
        Self {
            path,
            obj,
            problems: Vec::new(),
        }
    }

    fn fail(&mut self, key: &str, message: impl Into<String>) {
        self.problems
            .push(DiffProblem::schema(format!("{}.{key}", self.path), message));
    }

    /// Missing or null required fields are reported.
    fn required<T>(&mut self, key: &str, convert: Convert<T>) -> Option<T> {
        let obj = self.obj;
        match obj.get(key) {
            None => {
                self.fail(key, "missing required field");
                None
            }
            Some(Value::Null) => {
                self.fail(key, "must not be null");
                None
            }
            Some(value) => self.convert(key, value, convert),
        }
    }

    /// Missing and null optional fields both read as absent.
    fn optional<T>(&mut self, key: &str, convert: Convert<T>) -> Option<T> {
        let obj = self.obj;
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.convert(key, value, convert),
        }
    }

    fn convert<T>(&mut self, key: &str, value: &Value, convert: Convert<T>) -> Option<T> {
        match convert(value) {
            Ok(v) => Some(v),
            Err(message) => {
                self.fail(key, message);
                None
            }
        }
    }

    fn reject_unknown(&mut self, allowed: &[&str]) {
        let obj = self.obj;
        let unknown: Vec<&String> = obj
            .keys()
            .filter(|k| !allowed.contains(&k.as_str()))
            .collect();
        for key in unknown {
            self.fail(key, "unknown field");
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, Vec<DiffProblem>> {
        match value {
            Some(v) if self.problems.is_empty() => Ok(v),
            _ => Err(self.problems),
        }
    }
}

fn object<'v>(path: &str, value: &'v Value) -> Result<&'v Map<String, Value>, Vec<DiffProblem>> {
    value
        .as_object()
        .ok_or_else(|| {
            vec![DiffProblem::schema(
                path,
                format!("expected an object, got {}", describe(value)),
            )]
        })
}

// ---------------------------------------------------------------------------
// Entry decoders
// ---------------------------------------------------------------------------

/// An `add` entry: a full event without an id.
pub fn candidate(path: &str, value: &Value) -> Result<CandidateEvent, Vec<DiffProblem>> {
    let obj = object(path, value)?;
    let mut r = FieldReader::new(path, obj);
    r.reject_unknown(&EVENT_FIELDS);

    if obj.get("id").is_some_and(|id| !id.is_null()) {
        r.fail("id", "must be absent or null; ids are assigned on enactment");
    }

    let source = r.required("source", non_empty_text);
    let location = r.required("location", non_empty_text);
    let when = r.required("datetime", datetime);
    let time_desc = r.required("time_desc", text);
    let details = r.optional("details", text).unwrap_or_default();
    let bulletin_url = r.required("bulletin_url", absolute_url);
    let bulletin_page = r.required("bulletin_page", page);
    let kind = r.required("type", event_type);
    let cancelled = r.optional("cancelled", flag).unwrap_or(false);

    let decoded = (|| {
        Some(CandidateEvent {
            id: None,
            source: source?,
            location: location?,
            datetime: when?,
            time_desc: time_desc?,
            details,
            bulletin_url: bulletin_url?,
            bulletin_page: bulletin_page?,
            event_type: kind?,
            cancelled,
        })
    })();
    r.finish(decoded)
}

/// A `cancel` / `remove` entry, or the `match` of an update.
pub fn match_ref(path: &str, value: &Value) -> Result<MatchRef, Vec<DiffProblem>> {
    let obj = object(path, value)?;
    let mut r = FieldReader::new(path, obj);
    r.reject_unknown(&MATCH_FIELDS);

    let kind = r.required("type", event_type);
    let when = r.required("datetime", datetime);
    let location = r.required("location", non_empty_text);
    let source = r.optional("source", non_empty_text);

    let reference = (|| {
        Some(MatchRef {
            event_type: kind?,
            datetime: when?,
            location: location?,
            source,
        })
    })();
    r.finish(reference)
}

/// A patch body. `allow_cancelled` decides whether `cancelled` may appear.
pub fn patch(path: &str, value: &Value, allow_cancelled: bool) -> Result<EventPatch, Vec<DiffProblem>> {
    let obj = object(path, value)?;
    let mut r = FieldReader::new(path, obj);

    if obj.is_empty() {
        r.problems.push(DiffProblem::schema(path, "patch is empty"));
    }

    let mut out = EventPatch::default();
    for key in obj.keys() {
        match key.as_str() {
            field if IMMUTABLE_FIELDS.contains(&field) => {
                r.problems.push(DiffProblem::ImmutableField {
                    path: format!("{path}.{field}"),
                    field: field.to_string(),
                });
            }
            "location" => out.location = r.required("location", non_empty_text),
            "datetime" => out.datetime = r.required("datetime", datetime),
            "time_desc" => out.time_desc = r.required("time_desc", text),
            "details" => out.details = r.required("details", text),
            "type" => out.event_type = r.required("type", event_type),
            "cancelled" if allow_cancelled => out.cancelled = r.required("cancelled", flag),
            "cancelled" => r.fail(
                "cancelled",
                "cancellation belongs in the cancel list, not in an update patch",
            ),
            _ => r.fail(key, "unknown field"),
        }
    }

    r.finish(Some(out))
}

/// An `update` entry: `{ "match": …, "patch": … }`.
pub fn update(path: &str, value: &Value, allow_cancelled: bool) -> Result<UpdateEntry, Vec<DiffProblem>> {
    let obj = object(path, value)?;
    let mut r = FieldReader::new(path, obj);
    r.reject_unknown(&["match", "patch"]);

    let target = match obj.get("match") {
        None => {
            r.fail("match", "missing required field");
            None
        }
        Some(v) => match match_ref(&format!("{path}.match"), v) {
            Ok(m) => Some(m),
            Err(mut problems) => {
                r.problems.append(&mut problems);
                None
            }
        },
    };

    let body = match obj.get("patch") {
        None => {
            r.fail("patch", "missing required field");
            None
        }
        Some(v) => match patch(&format!("{path}.patch"), v, allow_cancelled) {
            Ok(p) => Some(p),
            Err(mut problems) => {
                r.problems.append(&mut problems);
                None
            }
        },
    };

    let entry = target.zip(body).map(|(target, patch)| UpdateEntry { target, patch });
    r.finish(entry)
}
