//! Study rooms and room reservations repositories

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{is_unique_violation, violated_constraint};
use crate::{
    error::{AppError, AppResult},
    models::study_room::{
        CreateStudyRoom, NewRoomReservation, RoomReservation, RoomReservationStatus, StudyRoom,
        UpdateStudyRoom,
    },
};

#[async_trait]
pub trait StudyRoomsRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<StudyRoom>>;
    async fn get(&self, id: Uuid) -> AppResult<StudyRoom>;
    async fn find_by_number(&self, room_number: &str) -> AppResult<Option<StudyRoom>>;
    async fn create(&self, data: &CreateStudyRoom) -> AppResult<StudyRoom>;
    async fn update(&self, id: Uuid, data: &UpdateStudyRoom) -> AppResult<StudyRoom>;
    /// Rejected while the room has active reservations
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait RoomReservationsRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<RoomReservation>;
    async fn list_all(&self) -> AppResult<Vec<RoomReservation>>;
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomReservation>>;
    /// Active reservations of a room on one day, by start time
    async fn list_active_for_room(&self, study_room_id: Uuid, date: NaiveDate) -> AppResult<Vec<RoomReservation>>;
    async fn find_active_for_user(&self, user_id: Uuid) -> AppResult<Option<RoomReservation>>;
    /// Check room availability, the user's system-wide booking and slot
    /// overlap, then insert, as one step
    async fn book(&self, reservation: &NewRoomReservation) -> AppResult<RoomReservation>;
    /// Move an active reservation to a terminal status
    async fn set_status(&self, id: Uuid, status: RoomReservationStatus) -> AppResult<RoomReservation>;
    async fn delete(&self, id: Uuid) -> AppResult<RoomReservation>;
}

#[derive(Clone)]
pub struct PgStudyRoomsRepository {
    pool: Pool<Postgres>,
}

impl PgStudyRoomsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn room_number_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Room number already in use".to_string())
    } else {
        e.into()
    }
}

#[async_trait]
impl StudyRoomsRepository for PgStudyRoomsRepository {
    async fn list(&self) -> AppResult<Vec<StudyRoom>> {
        let rooms = sqlx::query_as::<_, StudyRoom>("SELECT * FROM study_rooms ORDER BY room_number")
            .fetch_all(&self.pool)
            .await?;
        Ok(rooms)
    }

    async fn get(&self, id: Uuid) -> AppResult<StudyRoom> {
        sqlx::query_as::<_, StudyRoom>("SELECT * FROM study_rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Study room {} not found", id)))
    }

    async fn find_by_number(&self, room_number: &str) -> AppResult<Option<StudyRoom>> {
        let room = sqlx::query_as::<_, StudyRoom>("SELECT * FROM study_rooms WHERE room_number = $1")
            .bind(room_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    async fn create(&self, data: &CreateStudyRoom) -> AppResult<StudyRoom> {
        sqlx::query_as::<_, StudyRoom>(
            r#"
            INSERT INTO study_rooms (id, room_number, name, capacity, facilities, is_available, description)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.room_number)
        .bind(&data.name)
        .bind(data.capacity)
        .bind(&data.facilities)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(room_number_conflict)
    }

    async fn update(&self, id: Uuid, data: &UpdateStudyRoom) -> AppResult<StudyRoom> {
        sqlx::query_as::<_, StudyRoom>(
            r#"
            UPDATE study_rooms SET
                room_number = COALESCE($2, room_number),
                name = COALESCE($3, name),
                capacity = COALESCE($4, capacity),
                facilities = COALESCE($5, facilities),
                is_available = COALESCE($6, is_available),
                description = COALESCE($7, description)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.room_number)
        .bind(&data.name)
        .bind(data.capacity)
        .bind(&data.facilities)
        .bind(data.is_available)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(room_number_conflict)?
        .ok_or_else(|| AppError::NotFound(format!("Study room {} not found", id)))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let room = sqlx::query_as::<_, StudyRoom>("SELECT * FROM study_rooms WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Study room {} not found", id)))?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM room_reservations WHERE study_room_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "Study room {} has {} active reservation(s)",
                room.room_number, active
            )));
        }

        sqlx::query("DELETE FROM study_rooms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgRoomReservationsRepository {
    pool: Pool<Postgres>,
}

impl PgRoomReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomReservationsRepository for PgRoomReservationsRepository {
    async fn get(&self, id: Uuid) -> AppResult<RoomReservation> {
        sqlx::query_as::<_, RoomReservation>("SELECT * FROM room_reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room reservation {} not found", id)))
    }

    async fn list_all(&self) -> AppResult<Vec<RoomReservation>> {
        let reservations = sqlx::query_as::<_, RoomReservation>(
            "SELECT * FROM room_reservations ORDER BY date DESC, start_time, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomReservation>> {
        let reservations = sqlx::query_as::<_, RoomReservation>(
            "SELECT * FROM room_reservations WHERE user_id = $1 ORDER BY date DESC, start_time, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn list_active_for_room(&self, study_room_id: Uuid, date: NaiveDate) -> AppResult<Vec<RoomReservation>> {
        let reservations = sqlx::query_as::<_, RoomReservation>(
            r#"
            SELECT * FROM room_reservations
            WHERE study_room_id = $1 AND date = $2 AND status = 'active'
            ORDER BY start_time
            "#,
        )
        .bind(study_room_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn find_active_for_user(&self, user_id: Uuid) -> AppResult<Option<RoomReservation>> {
        let reservation = sqlx::query_as::<_, RoomReservation>(
            "SELECT * FROM room_reservations WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    async fn book(&self, reservation: &NewRoomReservation) -> AppResult<RoomReservation> {
        let mut tx = self.pool.begin().await?;

        // Bookings of one room are serialized on the room row
        let room = sqlx::query_as::<_, StudyRoom>("SELECT * FROM study_rooms WHERE id = $1 FOR UPDATE")
            .bind(reservation.study_room_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Study room {} not found", reservation.study_room_id)))?;
        if !room.is_available {
            return Err(AppError::RoomUnavailable);
        }

        let already_booked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM room_reservations WHERE user_id = $1 AND status = 'active')",
        )
        .bind(reservation.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_booked {
            return Err(AppError::UserAlreadyBooked);
        }

        let conflict: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM room_reservations
                WHERE study_room_id = $1 AND date = $2 AND status = 'active'
                  AND NOT (end_time <= $3 OR start_time >= $4)
            )
            "#,
        )
        .bind(reservation.study_room_id)
        .bind(reservation.date)
        .bind(reservation.range.start_time)
        .bind(reservation.range.end_time)
        .fetch_one(&mut *tx)
        .await?;
        if conflict {
            return Err(AppError::SlotConflict);
        }

        let created = sqlx::query_as::<_, RoomReservation>(
            r#"
            INSERT INTO room_reservations (id, user_id, study_room_id, date, start_time, end_time, status, purpose)
            VALUES ($1, $2, $3, $4, $5, $6, 'active', $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reservation.user_id)
        .bind(reservation.study_room_id)
        .bind(reservation.date)
        .bind(reservation.range.start_time)
        .bind(reservation.range.end_time)
        .bind(&reservation.purpose)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // Two rooms booked at once by the same user race past the check above
            if violated_constraint(&e).as_deref() == Some("room_reservations_one_active_per_user") {
                AppError::UserAlreadyBooked
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn set_status(&self, id: Uuid, status: RoomReservationStatus) -> AppResult<RoomReservation> {
        let updated = sqlx::query_as::<_, RoomReservation>(
            "UPDATE room_reservations SET status = $2 WHERE id = $1 AND status = 'active' RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(reservation) => Ok(reservation),
            None => {
                let current = self.get(id).await?;
                Err(AppError::NotActive(format!(
                    "Room reservation {} is already {:?}",
                    id, current.status
                )))
            }
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<RoomReservation> {
        sqlx::query_as::<_, RoomReservation>("DELETE FROM room_reservations WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room reservation {} not found", id)))
    }
}
