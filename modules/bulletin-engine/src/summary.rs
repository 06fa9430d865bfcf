use bulletin_common::EventId;
use serde::Serialize;

/// What one enactment did, for the operator to review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub expired: usize,
    pub removed: usize,
    pub cancelled: usize,
    pub updated: usize,
    pub added: usize,
    /// Additions that had already elapsed and were dropped without an id.
    pub discarded: usize,
    pub new_ids: Vec<EventId>,
}

impl Summary {
    pub fn changed_anything(&self) -> bool {
        self.expired + self.removed + self.cancelled + self.updated + self.added > 0
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Enactment Complete ===")?;
        writeln!(f, "Expired:   {}", self.expired)?;
        writeln!(f, "Removed:   {}", self.removed)?;
        writeln!(f, "Cancelled: {}", self.cancelled)?;
        writeln!(f, "Updated:   {}", self.updated)?;
        writeln!(f, "Added:     {}", self.added)?;
        if self.discarded > 0 {
            writeln!(f, "Discarded: {} (already past)", self.discarded)?;
        }
        if !self.new_ids.is_empty() {
            let ids: Vec<String> = self.new_ids.iter().map(ToString::to_string).collect();
            writeln!(f, "New ids:   {}", ids.join(", "))?;
        }
        Ok(())
    }
}
