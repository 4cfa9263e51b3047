//! Study rooms and the hourly slot engine

use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use super::lost_race;
use crate::{
    error::{AppError, AppResult},
    models::{
        study_room::{
            CreateRoomReservation, CreateStudyRoom, NewRoomReservation, RoomAvailability, RoomReservation,
            RoomReservationOp, StudyRoom, UpdateStudyRoom,
        },
        time::{hourly_slots, TimeRange},
        user::Actor,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct StudyRoomsService {
    repository: Repository,
}

impl StudyRoomsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_rooms(&self) -> AppResult<Vec<StudyRoom>> {
        self.repository.study_rooms.list().await
    }

    pub async fn get_room(&self, id: Uuid) -> AppResult<StudyRoom> {
        self.repository.study_rooms.get(id).await
    }

    pub async fn create_room(&self, data: CreateStudyRoom) -> AppResult<StudyRoom> {
        data.validate()?;
        let room = self.repository.study_rooms.create(&data).await?;
        tracing::info!(room_id = %room.id, "Created study room {}", room.room_number);
        Ok(room)
    }

    pub async fn update_room(&self, id: Uuid, data: UpdateStudyRoom) -> AppResult<StudyRoom> {
        data.validate()?;
        let room = self.repository.study_rooms.update(id, &data).await?;
        tracing::info!(room_id = %id, is_available = room.is_available, "Updated study room");
        Ok(room)
    }

    pub async fn delete_room(&self, id: Uuid) -> AppResult<()> {
        self.repository.study_rooms.delete(id).await?;
        tracing::info!(room_id = %id, "Deleted study room");
        Ok(())
    }

    /// The hourly grid of a day minus every slot touched by an active booking
    pub async fn available_slots(&self, room_id: Uuid, date: NaiveDate) -> AppResult<RoomAvailability> {
        let room = self.repository.study_rooms.get(room_id).await?;
        if !room.is_available {
            return Err(AppError::RoomUnavailable);
        }

        let booked = self
            .repository
            .room_reservations
            .list_active_for_room(room_id, date)
            .await?;
        let available_slots = free_slots(&booked);

        Ok(RoomAvailability {
            study_room: room,
            date,
            available_slots,
            booked_slots: booked,
        })
    }

    pub async fn list_all_reservations(&self) -> AppResult<Vec<RoomReservation>> {
        self.repository.room_reservations.list_all().await
    }

    pub async fn list_user_reservations(&self, user_id: Uuid) -> AppResult<Vec<RoomReservation>> {
        self.repository.room_reservations.list_for_user(user_id).await
    }

    /// Book a room for the acting user
    pub async fn create_reservation(&self, actor: Actor, request: CreateRoomReservation) -> AppResult<RoomReservation> {
        let range = TimeRange::within_grid(request.start_time, request.end_time)?;

        let room = self.repository.study_rooms.get(request.study_room_id).await?;
        if !room.is_available {
            return Err(AppError::RoomUnavailable);
        }
        if self
            .repository
            .room_reservations
            .find_active_for_user(actor.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::UserAlreadyBooked);
        }
        let booked = self
            .repository
            .room_reservations
            .list_active_for_room(room.id, request.date)
            .await?;
        if booked.iter().any(|r| r.range().overlaps(&range)) {
            return Err(AppError::SlotConflict);
        }

        let reservation = self
            .repository
            .room_reservations
            .book(&NewRoomReservation {
                user_id: actor.user_id,
                study_room_id: room.id,
                date: request.date,
                range,
                purpose: request.purpose,
            })
            .await
            .map_err(lost_race("create_room_reservation"))?;

        tracing::info!(
            reservation_id = %reservation.id,
            room_id = %room.id,
            user_id = %actor.user_id,
            "Booked study room {} on {} {}-{}",
            room.room_number,
            reservation.date,
            reservation.start_time,
            reservation.end_time
        );
        Ok(reservation)
    }

    pub async fn cancel_reservation(&self, actor: Actor, id: Uuid) -> AppResult<RoomReservation> {
        self.finish_reservation(actor, id, RoomReservationOp::Cancel).await
    }

    pub async fn complete_reservation(&self, actor: Actor, id: Uuid) -> AppResult<RoomReservation> {
        self.finish_reservation(actor, id, RoomReservationOp::Complete).await
    }

    async fn finish_reservation(&self, actor: Actor, id: Uuid, op: RoomReservationOp) -> AppResult<RoomReservation> {
        let reservation = self.repository.room_reservations.get(id).await?;
        if !actor.may_act_for(reservation.user_id) {
            return Err(AppError::NotAuthorized(
                "You can only change your own reservations".to_string(),
            ));
        }
        let target = reservation.status.apply(op).map_err(|_| {
            AppError::NotActive(format!(
                "Room reservation {} is already {:?}",
                id, reservation.status
            ))
        })?;

        let updated = self
            .repository
            .room_reservations
            .set_status(id, target)
            .await
            .map_err(lost_race("finish_room_reservation"))?;
        tracing::info!(reservation_id = %id, status = ?updated.status, "Closed room reservation");
        Ok(updated)
    }

    /// Administrative removal of a reservation record
    pub async fn delete_reservation(&self, id: Uuid) -> AppResult<()> {
        let removed = self.repository.room_reservations.delete(id).await?;
        tracing::info!(reservation_id = %id, status = ?removed.status, "Deleted room reservation");
        Ok(())
    }
}

/// Grid slots that overlap none of the given reservations
fn free_slots(booked: &[RoomReservation]) -> Vec<TimeRange> {
    hourly_slots()
        .into_iter()
        .filter(|slot| !booked.iter().any(|r| r.range().overlaps(slot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        study_room::RoomReservationStatus,
        time::TimeOfDay,
        user::Role,
    };

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn student() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role: Role::Student,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    async fn setup() -> (StudyRoomsService, StudyRoom) {
        let service = StudyRoomsService::new(Repository::in_memory());
        let room = service
            .create_room(CreateStudyRoom {
                room_number: "S-101".into(),
                name: "Group room".into(),
                capacity: 6,
                facilities: vec!["whiteboard".into()],
                description: None,
            })
            .await
            .unwrap();
        (service, room)
    }

    fn booking(room: &StudyRoom, start: &str, end: &str) -> CreateRoomReservation {
        CreateRoomReservation {
            study_room_id: room.id,
            date: day(),
            start_time: t(start),
            end_time: t(end),
            purpose: Some("Study group".into()),
        }
    }

    #[tokio::test]
    async fn test_slots_exclude_booked_hours() {
        let (service, room) = setup().await;
        assert_eq!(service.available_slots(room.id, day()).await.unwrap().available_slots.len(), 12);

        service
            .create_reservation(student(), booking(&room, "10:30", "12:00"))
            .await
            .unwrap();
        let availability = service.available_slots(room.id, day()).await.unwrap();
        let starts: Vec<String> = availability
            .available_slots
            .iter()
            .map(|s| s.start_time.to_string())
            .collect();
        assert_eq!(availability.available_slots.len(), 10);
        assert!(!starts.contains(&"10:00".to_string()));
        assert!(!starts.contains(&"11:00".to_string()));
        assert_eq!(availability.booked_slots.len(), 1);
    }

    #[tokio::test]
    async fn test_one_active_booking_per_user() {
        let (service, room) = setup().await;
        let actor = student();
        let first = service
            .create_reservation(actor, booking(&room, "09:00", "10:00"))
            .await
            .unwrap();
        let err = service
            .create_reservation(actor, booking(&room, "15:00", "16:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserAlreadyBooked));

        service.complete_reservation(actor, first.id).await.unwrap();
        assert!(service
            .create_reservation(actor, booking(&room, "15:00", "16:00"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_disabled_room_rejects_bookings() {
        let (service, room) = setup().await;
        service
            .update_room(
                room.id,
                UpdateStudyRoom {
                    is_available: Some(false),
                    ..UpdateStudyRoom::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            service.available_slots(room.id, day()).await,
            Err(AppError::RoomUnavailable)
        ));
        assert!(matches!(
            service.create_reservation(student(), booking(&room, "09:00", "10:00")).await,
            Err(AppError::RoomUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_booking_outside_grid_is_invalid() {
        let (service, room) = setup().await;
        let err = service
            .create_reservation(student(), booking(&room, "08:00", "09:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_requires_owner_and_active() {
        let (service, room) = setup().await;
        let owner = student();
        let reservation = service
            .create_reservation(owner, booking(&room, "13:00", "14:00"))
            .await
            .unwrap();

        let err = service.cancel_reservation(student(), reservation.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));

        let cancelled = service.cancel_reservation(owner, reservation.id).await.unwrap();
        assert_eq!(cancelled.status, RoomReservationStatus::Cancelled);
        let err = service.complete_reservation(owner, reservation.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotActive(_)));
    }

    #[tokio::test]
    async fn test_room_with_active_booking_cannot_be_deleted() {
        let (service, room) = setup().await;
        service
            .create_reservation(student(), booking(&room, "13:00", "14:00"))
            .await
            .unwrap();
        assert!(matches!(
            service.delete_room(room.id).await,
            Err(AppError::InvalidStateTransition(_))
        ));
    }
}
