//! Study rooms and their reservations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{
    time::{TimeOfDay, TimeRange},
    transition,
};
use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudyRoom {
    pub id: Uuid,
    pub room_number: String,
    pub name: String,
    pub capacity: i32,
    pub facilities: Vec<String>,
    /// Disabled rooms accept no bookings and expose no slots
    pub is_available: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudyRoom {
    #[validate(length(min = 1))]
    pub room_number: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 1))]
    pub capacity: i32,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudyRoom {
    #[validate(length(min = 1))]
    pub room_number: Option<String>,
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub facilities: Option<Vec<String>>,
    pub is_available: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "room_reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomReservationStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomReservationOp {
    Cancel,
    Complete,
}

const ROOM_RESERVATION_TRANSITIONS: &[(RoomReservationStatus, RoomReservationOp, RoomReservationStatus)] = &[
    (RoomReservationStatus::Active, RoomReservationOp::Cancel, RoomReservationStatus::Cancelled),
    (RoomReservationStatus::Active, RoomReservationOp::Complete, RoomReservationStatus::Completed),
];

impl RoomReservationStatus {
    pub fn apply(self, op: RoomReservationOp) -> AppResult<RoomReservationStatus> {
        transition(ROOM_RESERVATION_TRANSITIONS, self, op, "study room reservation")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomReservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub study_room_id: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "10:00")]
    pub start_time: TimeOfDay,
    #[schema(value_type = String, example = "11:00")]
    pub end_time: TimeOfDay,
    pub status: RoomReservationStatus,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RoomReservation {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Booking request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomReservation {
    pub study_room_id: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "10:00")]
    pub start_time: TimeOfDay,
    #[schema(value_type = String, example = "11:00")]
    pub end_time: TimeOfDay,
    pub purpose: Option<String>,
}

/// Insertable reservation record (always active)
#[derive(Debug, Clone)]
pub struct NewRoomReservation {
    pub user_id: Uuid,
    pub study_room_id: Uuid,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub purpose: Option<String>,
}

/// Free and booked slots of a room for one day
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomAvailability {
    pub study_room: StudyRoom,
    pub date: NaiveDate,
    pub available_slots: Vec<TimeRange>,
    pub booked_slots: Vec<RoomReservation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_reservation_transitions() {
        use RoomReservationOp::*;
        use RoomReservationStatus::*;
        assert_eq!(Active.apply(Cancel).unwrap(), Cancelled);
        assert_eq!(Active.apply(Complete).unwrap(), Completed);
        for terminal in [Cancelled, Completed] {
            assert!(terminal.apply(Cancel).is_err());
            assert!(terminal.apply(Complete).is_err());
        }
    }
}
