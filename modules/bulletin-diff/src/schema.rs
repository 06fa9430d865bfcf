//! JSON Schemas for the documents exchanged with upstream stages.

use bulletin_common::CandidateEvent;
use schemars::{schema::RootSchema, schema_for, JsonSchema};
use serde::Deserialize;

use crate::model::{MatchRef, UpdateEntry};

/// Shape of a diff document. Validation decodes entries itself; this exists
/// so callers can publish the schema.
#[derive(Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct DiffDocument {
    #[serde(default)]
    add: Vec<CandidateEvent>,
    #[serde(default)]
    cancel: Vec<MatchRef>,
    #[serde(default)]
    update: Vec<UpdateEntry>,
    #[serde(default)]
    remove: Vec<MatchRef>,
}

pub fn diff_schema() -> RootSchema {
    schema_for!(DiffDocument)
}

pub fn candidate_schema() -> RootSchema {
    schema_for!(Vec<CandidateEvent>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_schema_names_the_four_lists() {
        let value = serde_json::to_value(diff_schema()).unwrap();
        let properties = value["properties"].as_object().unwrap();
        for key in ["add", "cancel", "update", "remove"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
        assert_eq!(value["additionalProperties"], serde_json::json!(false));
    }

    #[test]
    fn candidate_schema_is_an_array() {
        let value = serde_json::to_value(candidate_schema()).unwrap();
        assert_eq!(value["type"], "array");
    }
}
