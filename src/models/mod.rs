//! Data models for the campus library

pub mod book;
pub mod event;
pub mod loan;
pub mod maintenance;
pub mod shelf;
pub mod study_room;
pub mod time;
pub mod user;

use std::fmt::Debug;

use crate::error::{AppError, AppResult};

// Re-export commonly used types
pub use book::Book;
pub use event::{Event, EventStatus, InvitationStatus};
pub use loan::{Loan, LoanStatus};
pub use shelf::Shelf;
pub use study_room::{RoomReservation, RoomReservationStatus, StudyRoom};
pub use time::{TimeOfDay, TimeRange};
pub use user::{Actor, Role, User};

/// Look up `(from, op)` in a transition table.
///
/// Pairs missing from the table are rejected as invalid transitions.
pub(crate) fn transition<S, O>(table: &[(S, O, S)], from: S, op: O, entity: &str) -> AppResult<S>
where
    S: Copy + PartialEq + Debug,
    O: Copy + PartialEq + Debug,
{
    table
        .iter()
        .find(|(state, operation, _)| *state == from && *operation == op)
        .map(|(_, _, to)| *to)
        .ok_or_else(|| {
            AppError::InvalidStateTransition(format!("{} cannot {:?} while {:?}", entity, op, from))
        })
}
