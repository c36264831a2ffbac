//! Fine and balance endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        fine::{Fine, FinePayment, PayFine},
        user::BalanceResponse,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List the fines of a user
#[utoipa::path(
    get,
    path = "/users/{id}/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's fines", body = Vec<Fine>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_fines(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<Fine>>> {
    let fines = state.services.fines.fines_for_user(&caller, user_id).await?;
    Ok(Json(fines))
}

/// Current unpaid balance of a user
#[utoipa::path(
    get,
    path = "/users/{id}/balance",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Outstanding balance", body = BalanceResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_balance(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<BalanceResponse>> {
    let balance = state.services.fines.balance(&caller, user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

/// Pay all or part of a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    request_body = PayFine,
    responses(
        (status = 200, description = "Payment applied", body = FinePayment),
        (status = 400, description = "Amount is not positive"),
        (status = 404, description = "Fine not found for this user"),
        (status = 409, description = "Fine already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(fine_id): Path<i32>,
    Json(request): Json<PayFine>,
) -> AppResult<Json<FinePayment>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let payment = state
        .services
        .fines
        .pay(&caller, fine_id, request.user_id, request.amount)
        .await?;

    Ok(Json(payment))
}
