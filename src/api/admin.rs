//! Counter audit and repair endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::maintenance::ConsistencyReport};

use super::AuthenticatedUser;

/// Compare stored counters with their source records
#[utoipa::path(
    get,
    path = "/admin/consistency",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit report", body = ConsistencyReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn audit_counters(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ConsistencyReport>> {
    claims.require_admin()?;

    let report = state.services.maintenance.audit().await?;
    Ok(Json(report))
}

/// Rewrite mismatching counters from their source records
#[utoipa::path(
    post,
    path = "/admin/consistency/repair",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "What was repaired", body = ConsistencyReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn repair_counters(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ConsistencyReport>> {
    claims.require_admin()?;

    let report = state.services.maintenance.repair().await?;
    Ok(Json(report))
}
