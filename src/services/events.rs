//! Guest events: attendees, status changes and the invitation workflow

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{lost_race, optional};
use crate::{
    error::{AppError, AppResult},
    models::{
        event::{
            CreateEvent, Event, EventDetails, EventStatus, InvitationOp, InvitationResponse, NewEvent,
            UpdateEvent, DEFAULT_MAX_ATTENDEES,
        },
        time::TimeRange,
        user::{Actor, User},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EventsService {
    repository: Repository,
}

impl EventsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Events the caller may see. Administrators see everything, everyone
    /// else only events whose guest accepted the invitation.
    pub async fn list_visible(&self, actor: Option<Actor>) -> AppResult<Vec<Event>> {
        let events = self.repository.events.list().await?;
        if actor.map_or(false, |a| a.is_admin()) {
            return Ok(events);
        }
        Ok(events.into_iter().filter(|e| e.is_visible_to_students).collect())
    }

    /// Hidden events are reported missing to anyone but administrators and
    /// the invited guest
    pub async fn get_event(&self, actor: Option<Actor>, id: Uuid) -> AppResult<EventDetails> {
        let event = self.repository.events.get(id).await?;
        let allowed = event.is_visible_to_students
            || actor.map_or(false, |a| a.is_admin() || a.user_id == event.guest_id);
        if !allowed {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }
        let guest = optional(self.repository.users.get(event.guest_id).await)?;
        Ok(EventDetails { event, guest })
    }

    pub async fn list_registered(&self, user_id: Uuid) -> AppResult<Vec<Event>> {
        self.repository.events.list_for_attendee(user_id).await
    }

    pub async fn list_invitations(&self, guest_id: Uuid) -> AppResult<Vec<Event>> {
        self.repository.events.list_for_guest(guest_id).await
    }

    /// Resolve an invitee and check it may be attached to an event
    async fn eligible_guest(&self, guest_id: Uuid) -> AppResult<User> {
        let guest = self
            .repository
            .users
            .get(guest_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound(format!("Guest speaker {} not found", guest_id)),
                other => other,
            })?;
        if !guest.is_eligible_guest() {
            return Err(AppError::InvalidGuestRole(format!(
                "{} is not an available guest",
                guest.username
            )));
        }
        Ok(guest)
    }

    /// Create an event and send the invitation to its guest
    pub async fn create_event(&self, data: CreateEvent) -> AppResult<Event> {
        data.validate()?;
        TimeRange::new(data.start_time, data.end_time)?;
        let guest = self.eligible_guest(data.guest_id).await?;

        let event = self
            .repository
            .events
            .create(&NewEvent {
                title: data.title,
                description: data.description,
                guest_id: guest.id,
                date: data.date,
                start_time: data.start_time,
                end_time: data.end_time,
                location: data.location,
                max_attendees: data.max_attendees.unwrap_or(DEFAULT_MAX_ATTENDEES),
                category: data.category,
                invitation_sent_at: Utc::now(),
            })
            .await?;
        tracing::info!(event_id = %event.id, guest_id = %guest.id, "Created event '{}', invitation pending", event.title);
        Ok(event)
    }

    pub async fn update_event(&self, id: Uuid, data: UpdateEvent) -> AppResult<Event> {
        data.validate()?;
        let current = self.repository.events.get(id).await?;
        TimeRange::new(
            data.start_time.unwrap_or(current.start_time),
            data.end_time.unwrap_or(current.end_time),
        )?;
        if let Some(max) = data.max_attendees {
            if max < current.current_attendees {
                return Err(AppError::CapacityExceeded(format!(
                    "{} attendees are registered, max attendees cannot be lower",
                    current.current_attendees
                )));
            }
        }

        let event = self
            .repository
            .events
            .update(id, &data)
            .await
            .map_err(lost_race("update_event"))?;
        tracing::info!(event_id = %id, "Updated event");
        Ok(event)
    }

    /// Manual status change along the event transition table
    pub async fn change_status(&self, id: Uuid, target: EventStatus) -> AppResult<Event> {
        let current = self.repository.events.get(id).await?;
        let next = current.status.transition_to(target)?;
        let event = self
            .repository
            .events
            .set_status(id, current.status, next)
            .await
            .map_err(lost_race("change_event_status"))?;
        tracing::info!(event_id = %id, from = ?current.status, to = ?next, "Changed event status");
        Ok(event)
    }

    /// Replace the invited guest of an event that has not ended. The
    /// invitation always starts over.
    pub async fn change_guest(&self, id: Uuid, guest_id: Uuid) -> AppResult<Event> {
        let current = self.repository.events.get(id).await?;
        if current.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "cannot change the guest of a {:?} event",
                current.status
            )));
        }
        let guest = self.eligible_guest(guest_id).await?;
        current.invitation_status.apply(InvitationOp::Reissue)?;

        let event = self
            .repository
            .events
            .reassign_guest(id, guest.id, Utc::now())
            .await
            .map_err(lost_race("change_event_guest"))?;
        tracing::info!(event_id = %id, guest_id = %guest.id, "Reassigned event guest, invitation pending");
        Ok(event)
    }

    pub async fn register(&self, actor: Actor, id: Uuid) -> AppResult<Event> {
        let current = self.repository.events.get(id).await?;
        if current.status != EventStatus::Upcoming {
            return Err(AppError::EventNotOpen);
        }
        if current.has_attendee(actor.user_id) {
            return Err(AppError::AlreadyRegistered);
        }
        if current.is_full() {
            return Err(AppError::EventFull);
        }

        let event = self
            .repository
            .events
            .add_attendee(id, actor.user_id)
            .await
            .map_err(lost_race("register_attendee"))?;
        tracing::info!(
            event_id = %id,
            user_id = %actor.user_id,
            attendees = event.current_attendees,
            "Registered attendee"
        );
        Ok(event)
    }

    pub async fn unregister(&self, actor: Actor, id: Uuid) -> AppResult<Event> {
        let current = self.repository.events.get(id).await?;
        if current.status != EventStatus::Upcoming {
            return Err(AppError::EventNotOpen);
        }
        if !current.has_attendee(actor.user_id) {
            return Err(AppError::NotRegistered);
        }

        let event = self
            .repository
            .events
            .remove_attendee(id, actor.user_id)
            .await
            .map_err(lost_race("unregister_attendee"))?;
        tracing::info!(
            event_id = %id,
            user_id = %actor.user_id,
            attendees = event.current_attendees,
            "Unregistered attendee"
        );
        Ok(event)
    }

    /// The invited guest accepts or declines. Accepting publishes the event.
    pub async fn respond_to_invitation(
        &self,
        actor: Actor,
        id: Uuid,
        response: InvitationResponse,
    ) -> AppResult<Event> {
        let current = self.repository.events.get(id).await?;
        if current.guest_id != actor.user_id {
            return Err(AppError::NotInvited);
        }
        let target = current.invitation_status.apply(response.op())?;

        let event = self
            .repository
            .events
            .respond_invitation(id, actor.user_id, target, Utc::now())
            .await
            .map_err(lost_race("respond_to_invitation"))?;
        tracing::info!(
            event_id = %id,
            guest_id = %actor.user_id,
            invitation = ?event.invitation_status,
            visible = event.is_visible_to_students,
            "Guest responded to invitation"
        );
        Ok(event)
    }

    pub async fn delete_event(&self, id: Uuid) -> AppResult<()> {
        self.repository.events.delete(id).await?;
        tracing::info!(event_id = %id, "Deleted event");
        Ok(())
    }
}
