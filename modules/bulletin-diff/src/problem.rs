use std::fmt;

use bulletin_common::EventId;

/// One thing wrong with a proposed diff. Paths point into the diff document
/// (`add[2].datetime`, `update[0].match`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffProblem {
    #[error("{path}: {message}")]
    Schema { path: String, message: String },

    #[error("{path}: reference matches {} stored events (ids {ids:?})", .ids.len())]
    AmbiguousMatch { path: String, ids: Vec<EventId> },

    #[error("{path}: reference matches no stored event")]
    UnknownMatch { path: String },

    #[error("event {id} is targeted by more than one operation: {}", .paths.join(", "))]
    ConflictingOperation { id: EventId, paths: Vec<String> },

    #[error("{path}: field `{field}` cannot be changed by an update")]
    ImmutableField { path: String, field: String },

    #[error("{path}: duplicates {duplicate_of}")]
    DuplicateAdd { path: String, duplicate_of: String },

    #[error("{path}: patched event would duplicate {duplicate_of}")]
    DuplicateUpdate { path: String, duplicate_of: String },
}

impl DiffProblem {
    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        DiffProblem::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Stable name of the problem class, for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DiffProblem::Schema { .. } => "SchemaError",
            DiffProblem::AmbiguousMatch { .. } => "AmbiguousMatchError",
            DiffProblem::UnknownMatch { .. } => "UnknownMatchError",
            DiffProblem::ConflictingOperation { .. } => "ConflictingOperationError",
            DiffProblem::ImmutableField { .. } => "ImmutableFieldError",
            DiffProblem::DuplicateAdd { .. } => "DuplicateAddError",
            DiffProblem::DuplicateUpdate { .. } => "DuplicateUpdateError",
        }
    }
}

/// Every problem found in a rejected diff. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub problems: Vec<DiffProblem>,
}

impl ValidationFailure {
    pub fn single(problem: DiffProblem) -> Self {
        Self {
            problems: vec![problem],
        }
    }

    pub fn count(&self, kind: &str) -> usize {
        self.problems.iter().filter(|p| p.kind() == kind).count()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "diff rejected with {} problem(s)", self.problems.len())?;
        for problem in &self.problems {
            write!(f, "\n  [{}] {problem}", problem.kind())?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_problem_with_its_kind() {
        let failure = ValidationFailure {
            problems: vec![
                DiffProblem::UnknownMatch {
                    path: "remove[0]".into(),
                },
                DiffProblem::ConflictingOperation {
                    id: 4,
                    paths: vec!["cancel[0]".into(), "update[1].match".into()],
                },
            ],
        };

        let text = failure.to_string();
        assert!(text.starts_with("diff rejected with 2 problem(s)"));
        assert!(text.contains("[UnknownMatchError] remove[0]: reference matches no stored event"));
        assert!(text.contains(
            "[ConflictingOperationError] event 4 is targeted by more than one operation: cancel[0], update[1].match"
        ));
    }
}
