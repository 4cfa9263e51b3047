//! Guest events: attendees and the invitation workflow

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{time::TimeOfDay, transition, user::User};
use crate::error::{AppError, AppResult};

pub const DEFAULT_MAX_ATTENDEES: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOp {
    Start,
    Complete,
    Cancel,
}

const EVENT_TRANSITIONS: &[(EventStatus, EventOp, EventStatus)] = &[
    (EventStatus::Upcoming, EventOp::Start, EventStatus::Ongoing),
    (EventStatus::Upcoming, EventOp::Complete, EventStatus::Completed),
    (EventStatus::Upcoming, EventOp::Cancel, EventStatus::Cancelled),
    (EventStatus::Ongoing, EventOp::Complete, EventStatus::Completed),
    (EventStatus::Ongoing, EventOp::Cancel, EventStatus::Cancelled),
];

impl EventStatus {
    pub fn apply(self, op: EventOp) -> AppResult<EventStatus> {
        transition(EVENT_TRANSITIONS, self, op, "event")
    }

    /// Resolve a requested target status into the transition that reaches it
    pub fn transition_to(self, target: EventStatus) -> AppResult<EventStatus> {
        let op = match target {
            EventStatus::Ongoing => EventOp::Start,
            EventStatus::Completed => EventOp::Complete,
            EventStatus::Cancelled => EventOp::Cancel,
            EventStatus::Upcoming => {
                return Err(AppError::InvalidStateTransition(format!(
                    "event cannot move from {:?} back to Upcoming",
                    self
                )))
            }
        };
        self.apply(op)
    }

    /// Completed and cancelled events accept no further changes
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationOp {
    Accept,
    Decline,
    /// A new invitee always restarts the workflow
    Reissue,
}

const INVITATION_TRANSITIONS: &[(InvitationStatus, InvitationOp, InvitationStatus)] = &[
    (InvitationStatus::Pending, InvitationOp::Accept, InvitationStatus::Accepted),
    (InvitationStatus::Pending, InvitationOp::Decline, InvitationStatus::Declined),
    (InvitationStatus::Pending, InvitationOp::Reissue, InvitationStatus::Pending),
    (InvitationStatus::Accepted, InvitationOp::Reissue, InvitationStatus::Pending),
    (InvitationStatus::Declined, InvitationOp::Reissue, InvitationStatus::Pending),
];

impl InvitationStatus {
    pub fn apply(self, op: InvitationOp) -> AppResult<InvitationStatus> {
        transition(INVITATION_TRANSITIONS, self, op, "invitation")
    }
}

/// A guest's answer to an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationResponse {
    Accepted,
    Declined,
}

impl InvitationResponse {
    pub fn op(self) -> InvitationOp {
        match self {
            InvitationResponse::Accepted => InvitationOp::Accept,
            InvitationResponse::Declined => InvitationOp::Decline,
        }
    }
}

/// Event record. `current_attendees` always equals `attendees.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Invited guest (a user with the guest role)
    pub guest_id: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "14:00")]
    pub start_time: TimeOfDay,
    #[schema(value_type = String, example = "16:00")]
    pub end_time: TimeOfDay,
    pub location: String,
    pub max_attendees: i32,
    pub current_attendees: i32,
    pub attendees: Vec<Uuid>,
    pub status: EventStatus,
    pub category: String,
    pub invitation_status: InvitationStatus,
    pub invitation_sent_at: DateTime<Utc>,
    pub invitation_responded_at: Option<DateTime<Utc>>,
    pub is_visible_to_students: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.current_attendees >= self.max_attendees
    }

    pub fn has_attendee(&self, user_id: Uuid) -> bool {
        self.attendees.contains(&user_id)
    }
}

/// Event with its guest, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDetails {
    pub event: Event,
    pub guest: Option<User>,
}

/// Create event request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub guest_id: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "14:00")]
    pub start_time: TimeOfDay,
    #[schema(value_type = String, example = "16:00")]
    pub end_time: TimeOfDay,
    #[validate(length(min = 1))]
    pub location: String,
    /// Defaults to 50
    #[validate(range(min = 1))]
    pub max_attendees: Option<i32>,
    #[validate(length(min = 1))]
    pub category: String,
}

/// Insertable event record
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub guest_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub location: String,
    pub max_attendees: i32,
    pub category: String,
    pub invitation_sent_at: DateTime<Utc>,
}

/// Update of descriptive event fields
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "14:00")]
    pub start_time: Option<TimeOfDay>,
    #[schema(value_type = Option<String>, example = "16:00")]
    pub end_time: Option<TimeOfDay>,
    #[validate(length(min = 1))]
    pub location: Option<String>,
    #[validate(range(min = 1))]
    pub max_attendees: Option<i32>,
    #[validate(length(min = 1))]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateEventStatus {
    pub status: EventStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEventGuest {
    pub guest_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RespondInvitation {
    pub response: InvitationResponse,
}
