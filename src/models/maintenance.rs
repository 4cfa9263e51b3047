//! Counter audit results

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// A stored counter that disagrees with its source records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CounterMismatch {
    pub entity_id: Uuid,
    /// `shelf.currentBooks`, `book.availableCopies` or `event.currentAttendees`
    pub counter: String,
    pub stored: i64,
    pub expected: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub mismatches: Vec<CounterMismatch>,
    /// True when the mismatches were rewritten from the source records
    pub repaired: bool,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Result of an overdue sweep
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub updated_count: u64,
}
