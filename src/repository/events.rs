//! Events repository
//!
//! Attendees live in a `UUID[]` column next to `current_attendees`, so a
//! registration is one conditional `UPDATE` touching both.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::event::{Event, EventStatus, InvitationStatus, NewEvent, UpdateEvent},
};

#[async_trait]
pub trait EventsRepository: Send + Sync {
    /// All events, by date and start time
    async fn list(&self) -> AppResult<Vec<Event>>;
    async fn get(&self, id: Uuid) -> AppResult<Event>;
    async fn list_for_attendee(&self, user_id: Uuid) -> AppResult<Vec<Event>>;
    async fn list_for_guest(&self, guest_id: Uuid) -> AppResult<Vec<Event>>;
    async fn create(&self, event: &NewEvent) -> AppResult<Event>;
    /// Rejects a `max_attendees` below the current attendee count
    async fn update(&self, id: Uuid, data: &UpdateEvent) -> AppResult<Event>;
    /// Compare-and-set on the event status
    async fn set_status(&self, id: Uuid, from: EventStatus, to: EventStatus) -> AppResult<Event>;
    async fn add_attendee(&self, id: Uuid, user_id: Uuid) -> AppResult<Event>;
    async fn remove_attendee(&self, id: Uuid, user_id: Uuid) -> AppResult<Event>;
    /// Record the invited guest's answer to a pending invitation
    async fn respond_invitation(
        &self,
        id: Uuid,
        guest_id: Uuid,
        response: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<Event>;
    /// Point an upcoming or ongoing event at another guest and restart the
    /// invitation
    async fn reassign_guest(&self, id: Uuid, guest_id: Uuid, sent_at: DateTime<Utc>) -> AppResult<Event>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    /// Recompute `current_attendees` from the attendee list, returning the
    /// value written
    async fn recount_attendees(&self, id: Uuid) -> AppResult<i32>;
}

#[derive(Clone)]
pub struct PgEventsRepository {
    pool: Pool<Postgres>,
}

impl PgEventsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventsRepository for PgEventsRepository {
    async fn list(&self) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY date, start_time, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn get(&self, id: Uuid) -> AppResult<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    async fn list_for_attendee(&self, user_id: Uuid) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE $1 = ANY(attendees) ORDER BY date, start_time, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn list_for_guest(&self, guest_id: Uuid) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE guest_id = $1 ORDER BY date, start_time, id",
        )
        .bind(guest_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn create(&self, event: &NewEvent) -> AppResult<Event> {
        let created = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, title, description, guest_id, date, start_time, end_time, location,
                max_attendees, current_attendees, attendees, status, category,
                invitation_status, invitation_sent_at, is_visible_to_students
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, '{}', 'upcoming', $10, 'pending', $11, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.guest_id)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location)
        .bind(event.max_attendees)
        .bind(&event.category)
        .bind(event.invitation_sent_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, data: &UpdateEvent) -> AppResult<Event> {
        let updated = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                date = COALESCE($4, date),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                location = COALESCE($7, location),
                max_attendees = COALESCE($8, max_attendees),
                category = COALESCE($9, category)
            WHERE id = $1 AND COALESCE($8, max_attendees) >= current_attendees
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.date)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(&data.location)
        .bind(data.max_attendees)
        .bind(&data.category)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let event = self.get(id).await?;
                Err(AppError::CapacityExceeded(format!(
                    "{} attendees are registered, max attendees cannot be lower",
                    event.current_attendees
                )))
            }
        }
    }

    async fn set_status(&self, id: Uuid, from: EventStatus, to: EventStatus) -> AppResult<Event> {
        let updated = sqlx::query_as::<_, Event>(
            "UPDATE events SET status = $3 WHERE id = $1 AND status = $2 RETURNING *",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let event = self.get(id).await?;
                Err(AppError::InvalidStateTransition(format!(
                    "event is {:?}, expected {:?}",
                    event.status, from
                )))
            }
        }
    }

    async fn add_attendee(&self, id: Uuid, user_id: Uuid) -> AppResult<Event> {
        let updated = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                attendees = array_append(attendees, $2),
                current_attendees = current_attendees + 1
            WHERE id = $1
              AND status = 'upcoming'
              AND NOT ($2 = ANY(attendees))
              AND current_attendees < max_attendees
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let event = self.get(id).await?;
                Err(if event.status != EventStatus::Upcoming {
                    AppError::EventNotOpen
                } else if event.has_attendee(user_id) {
                    AppError::AlreadyRegistered
                } else {
                    AppError::EventFull
                })
            }
        }
    }

    async fn remove_attendee(&self, id: Uuid, user_id: Uuid) -> AppResult<Event> {
        let updated = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                attendees = array_remove(attendees, $2),
                current_attendees = current_attendees - 1
            WHERE id = $1 AND status = 'upcoming' AND $2 = ANY(attendees)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let event = self.get(id).await?;
                Err(if event.status != EventStatus::Upcoming {
                    AppError::EventNotOpen
                } else {
                    AppError::NotRegistered
                })
            }
        }
    }

    async fn respond_invitation(
        &self,
        id: Uuid,
        guest_id: Uuid,
        response: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<Event> {
        let updated = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                invitation_status = $3,
                invitation_responded_at = $4,
                is_visible_to_students = ($3 = 'accepted'::invitation_status)
            WHERE id = $1 AND guest_id = $2 AND invitation_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(guest_id)
        .bind(response)
        .bind(responded_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let event = self.get(id).await?;
                Err(if event.guest_id != guest_id {
                    AppError::NotInvited
                } else {
                    AppError::InvalidStateTransition(format!(
                        "invitation was already {:?}",
                        event.invitation_status
                    ))
                })
            }
        }
    }

    async fn reassign_guest(&self, id: Uuid, guest_id: Uuid, sent_at: DateTime<Utc>) -> AppResult<Event> {
        let updated = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET
                guest_id = $2,
                invitation_status = 'pending',
                invitation_sent_at = $3,
                invitation_responded_at = NULL,
                is_visible_to_students = FALSE
            WHERE id = $1 AND status IN ('upcoming', 'ongoing')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(guest_id)
        .bind(sent_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(event) => Ok(event),
            None => {
                let event = self.get(id).await?;
                Err(AppError::InvalidStateTransition(format!(
                    "cannot change the guest of a {:?} event",
                    event.status
                )))
            }
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }
        Ok(())
    }

    async fn recount_attendees(&self, id: Uuid) -> AppResult<i32> {
        sqlx::query_scalar(
            "UPDATE events SET current_attendees = cardinality(attendees) WHERE id = $1 RETURNING current_attendees",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }
}
