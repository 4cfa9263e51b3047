//! Study room reservation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::study_room::{CreateRoomReservation, RoomReservation},
};

use super::AuthenticatedUser;

/// List every reservation
#[utoipa::path(
    get,
    path = "/room-reservations",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All reservations", body = Vec<RoomReservation>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RoomReservation>>> {
    claims.require_admin()?;

    let reservations = state.services.study_rooms.list_all_reservations().await?;
    Ok(Json(reservations))
}

/// Reservations of the current user
#[utoipa::path(
    get,
    path = "/room-reservations/mine",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user's reservations", body = Vec<RoomReservation>)
    )
)]
pub async fn my_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RoomReservation>>> {
    let reservations = state.services.study_rooms.list_user_reservations(claims.sub).await?;
    Ok(Json(reservations))
}

/// Book a study room
#[utoipa::path(
    post,
    path = "/room-reservations",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    request_body = CreateRoomReservation,
    responses(
        (status = 201, description = "Reservation created", body = RoomReservation),
        (status = 400, description = "Invalid time range"),
        (status = 409, description = "Slot taken or user already holds a booking"),
        (status = 422, description = "Room is disabled")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateRoomReservation>,
) -> AppResult<(StatusCode, Json<RoomReservation>)> {
    let reservation = state
        .services
        .study_rooms
        .create_reservation(claims.actor(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

#[utoipa::path(
    post,
    path = "/room-reservations/{id}/cancel",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = RoomReservation),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 409, description = "Reservation is not active")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RoomReservation>> {
    let reservation = state.services.study_rooms.cancel_reservation(claims.actor(), id).await?;
    Ok(Json(reservation))
}

#[utoipa::path(
    post,
    path = "/room-reservations/{id}/complete",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation completed", body = RoomReservation),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 409, description = "Reservation is not active")
    )
)]
pub async fn complete_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RoomReservation>> {
    let reservation = state
        .services
        .study_rooms
        .complete_reservation(claims.actor(), id)
        .await?;
    Ok(Json(reservation))
}

#[utoipa::path(
    delete,
    path = "/room-reservations/{id}",
    tag = "study-rooms",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation deleted"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn delete_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.study_rooms.delete_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
