//! Guest event endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::event::{
        ChangeEventGuest, CreateEvent, Event, EventDetails, RespondInvitation, UpdateEvent, UpdateEventStatus,
    },
};

use super::{AuthenticatedUser, OptionalUser};

/// List events visible to the caller
#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    security((), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Events; administrators also see unpublished ones", body = Vec<Event>)
    )
)]
pub async fn list_events(
    State(state): State<crate::AppState>,
    OptionalUser(claims): OptionalUser,
) -> AppResult<Json<Vec<Event>>> {
    let events = state
        .services
        .events
        .list_visible(claims.map(|c| c.actor()))
        .await?;
    Ok(Json(events))
}

#[utoipa::path(
    get,
    path = "/events/{id}",
    tag = "events",
    security((), ("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event with its guest", body = EventDetails),
        (status = 404, description = "Event not found or not published")
    )
)]
pub async fn get_event(
    State(state): State<crate::AppState>,
    OptionalUser(claims): OptionalUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EventDetails>> {
    let event = state
        .services
        .events
        .get_event(claims.map(|c| c.actor()), id)
        .await?;
    Ok(Json(event))
}

/// Events the current user registered for
#[utoipa::path(
    get,
    path = "/events/mine/registered",
    tag = "events",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registered events", body = Vec<Event>)
    )
)]
pub async fn my_registered_events(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Event>>> {
    let events = state.services.events.list_registered(claims.sub).await?;
    Ok(Json(events))
}

/// Events the current guest is invited to
#[utoipa::path(
    get,
    path = "/events/mine/invitations",
    tag = "events",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Invitations", body = Vec<Event>)
    )
)]
pub async fn my_invitations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Event>>> {
    let events = state.services.events.list_invitations(claims.sub).await?;
    Ok(Json(events))
}

/// Create an event and invite its guest
#[utoipa::path(
    post,
    path = "/events",
    tag = "events",
    security(("bearer_auth" = [])),
    request_body = CreateEvent,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid request or guest not available"),
        (status = 404, description = "Guest not found")
    )
)]
pub async fn create_event(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateEvent>,
) -> AppResult<(StatusCode, Json<Event>)> {
    claims.require_admin()?;

    let event = state.services.events.create_event(data).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    put,
    path = "/events/{id}",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = UpdateEvent,
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 404, description = "Event not found"),
        (status = 422, description = "Capacity below registered attendees")
    )
)]
pub async fn update_event(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateEvent>,
) -> AppResult<Json<Event>> {
    claims.require_admin()?;

    let event = state.services.events.update_event(id, data).await?;
    Ok(Json(event))
}

#[utoipa::path(
    put,
    path = "/events/{id}/status",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = UpdateEventStatus,
    responses(
        (status = 200, description = "Status changed", body = Event),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn change_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateEventStatus>,
) -> AppResult<Json<Event>> {
    claims.require_admin()?;

    let event = state.services.events.change_status(id, data.status).await?;
    Ok(Json(event))
}

/// Invite another guest; the invitation starts over as pending
#[utoipa::path(
    put,
    path = "/events/{id}/guest",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = ChangeEventGuest,
    responses(
        (status = 200, description = "Guest changed", body = Event),
        (status = 400, description = "User is not an available guest"),
        (status = 404, description = "Event or guest not found"),
        (status = 409, description = "Event has already ended")
    )
)]
pub async fn change_guest(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<ChangeEventGuest>,
) -> AppResult<Json<Event>> {
    claims.require_admin()?;

    let event = state.services.events.change_guest(id, data.guest_id).await?;
    Ok(Json(event))
}

#[utoipa::path(
    post,
    path = "/events/{id}/register",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Registered", body = Event),
        (status = 409, description = "Already registered or event not upcoming"),
        (status = 422, description = "Event is full")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Event>> {
    let event = state.services.events.register(claims.actor(), id).await?;
    Ok(Json(event))
}

#[utoipa::path(
    post,
    path = "/events/{id}/unregister",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Unregistered", body = Event),
        (status = 409, description = "Not registered or event not upcoming")
    )
)]
pub async fn unregister(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Event>> {
    let event = state.services.events.unregister(claims.actor(), id).await?;
    Ok(Json(event))
}

/// Accept or decline an invitation (invited guest only)
#[utoipa::path(
    put,
    path = "/events/{id}/invitation",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = RespondInvitation,
    responses(
        (status = 200, description = "Response recorded", body = Event),
        (status = 403, description = "Caller is not the invited guest"),
        (status = 409, description = "Invitation already answered")
    )
)]
pub async fn respond_to_invitation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<RespondInvitation>,
) -> AppResult<Json<Event>> {
    let event = state
        .services
        .events
        .respond_to_invitation(claims.actor(), id, data.response)
        .await?;
    Ok(Json(event))
}

#[utoipa::path(
    delete,
    path = "/events/{id}",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn delete_event(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.events.delete_event(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
