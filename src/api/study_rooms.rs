//! Study room endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::study_room::{CreateStudyRoom, RoomAvailability, StudyRoom, UpdateStudyRoom},
};

use super::AuthenticatedUser;

/// List study rooms
#[utoipa::path(
    get,
    path = "/study-rooms",
    tag = "study-rooms",
    responses(
        (status = 200, description = "All study rooms", body = Vec<StudyRoom>)
    )
)]
pub async fn list_rooms(State(state): State<crate::AppState>) -> AppResult<Json<Vec<StudyRoom>>> {
    let rooms = state.services.study_rooms.list_rooms().await?;
    Ok(Json(rooms))
}

#[utoipa::path(
    get,
    path = "/study-rooms/{id}",
    tag = "study-rooms",
    params(("id" = Uuid, Path, description = "Study room ID")),
    responses(
        (status = 200, description = "Study room", body = StudyRoom),
        (status = 404, description = "Study room not found")
    )
)]
pub async fn get_room(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StudyRoom>> {
    let room = state.services.study_rooms.get_room(id).await?;
    Ok(Json(room))
}

/// Free and booked hourly slots of a room on one day
#[utoipa::path(
    get,
    path = "/study-rooms/{id}/slots/{date}",
    tag = "study-rooms",
    params(
        ("id" = Uuid, Path, description = "Study room ID"),
        ("date" = String, Path, description = "Day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Availability", body = RoomAvailability),
        (status = 404, description = "Study room not found"),
        (status = 422, description = "Room is disabled")
    )
)]
pub async fn available_slots(
    State(state): State<crate::AppState>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
) -> AppResult<Json<RoomAvailability>> {
    let availability = state.services.study_rooms.available_slots(id, date).await?;
    Ok(Json(availability))
}

#[utoipa::path(
    post,
    path = "/study-rooms",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    request_body = CreateStudyRoom,
    responses(
        (status = 201, description = "Study room created", body = StudyRoom),
        (status = 409, description = "Room number already used")
    )
)]
pub async fn create_room(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateStudyRoom>,
) -> AppResult<(StatusCode, Json<StudyRoom>)> {
    claims.require_admin()?;

    let room = state.services.study_rooms.create_room(data).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[utoipa::path(
    put,
    path = "/study-rooms/{id}",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Study room ID")),
    request_body = UpdateStudyRoom,
    responses(
        (status = 200, description = "Study room updated", body = StudyRoom),
        (status = 404, description = "Study room not found")
    )
)]
pub async fn update_room(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateStudyRoom>,
) -> AppResult<Json<StudyRoom>> {
    claims.require_admin()?;

    let room = state.services.study_rooms.update_room(id, data).await?;
    Ok(Json(room))
}

#[utoipa::path(
    delete,
    path = "/study-rooms/{id}",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Study room ID")),
    responses(
        (status = 204, description = "Study room deleted"),
        (status = 409, description = "Room has active reservations")
    )
)]
pub async fn delete_room(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.study_rooms.delete_room(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
