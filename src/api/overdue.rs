//! Overdue detection endpoints (librarian only)

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, services::overdue::ScanReport, AppState};

use super::AuthenticatedUser;

#[derive(Serialize, ToSchema)]
pub struct ReminderResponse {
    /// Users that received a reminder
    pub notified: usize,
}

/// Detect overdue loans and issue or accrue their fines
#[utoipa::path(
    post,
    path = "/overdue/scan",
    tag = "overdue",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Scan summary", body = ScanReport),
        (status = 401, description = "Librarian privileges required")
    )
)]
pub async fn run_scan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<ScanReport>> {
    let report = state.services.overdue.detect_and_issue(&caller).await?;
    Ok(Json(report))
}

/// Remind users of their overdue loans
#[utoipa::path(
    post,
    path = "/overdue/reminders",
    tag = "overdue",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reminders sent", body = ReminderResponse),
        (status = 401, description = "Librarian privileges required")
    )
)]
pub async fn send_reminders(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<ReminderResponse>> {
    let notified = state.services.overdue.send_overdue_reminders(&caller).await?;
    Ok(Json(ReminderResponse { notified }))
}
