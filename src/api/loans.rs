//! Loan endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrowing::{Borrowing, LoanRequest},
    AppState,
};

use super::AuthenticatedUser;

/// List all loans of a user, returned ones included
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans", body = Vec<Borrowing>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<Borrowing>>> {
    let loans = state.services.borrowing.loans_for_user(&caller, user_id).await?;
    Ok(Json(loans))
}

/// Borrow a media
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = LoanRequest,
    responses(
        (status = 201, description = "Loan created", body = Borrowing),
        (status = 404, description = "User or media not found"),
        (status = 409, description = "Media already on loan"),
        (status = 422, description = "Outstanding balance or overdue items")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<LoanRequest>,
) -> AppResult<(StatusCode, Json<Borrowing>)> {
    let borrowing = state
        .services
        .borrowing
        .borrow(&caller, request.user_id, request.media_id)
        .await?;

    Ok((StatusCode::CREATED, Json(borrowing)))
}

/// Return a borrowed media
#[utoipa::path(
    post,
    path = "/loans/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Media returned", body = Borrowing),
        (status = 404, description = "No active loan for this user and media"),
        (status = 422, description = "Loan is late and its fine is unpaid")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<LoanRequest>,
) -> AppResult<Json<Borrowing>> {
    let borrowing = state
        .services
        .borrowing
        .return_media(&caller, request.user_id, request.media_id)
        .await?;

    Ok(Json(borrowing))
}
