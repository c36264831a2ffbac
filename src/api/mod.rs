//! HTTP shell over the circulation services

pub mod fines;
pub mod health;
pub mod loans;
pub mod media;
pub mod openapi;
pub mod overdue;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    error::AppError,
    models::{user::UserClaims, Caller},
    AppState,
};

/// Extractor for the authenticated caller from a JWT bearer token
pub struct AuthenticatedUser(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::NotAuthenticated("Missing authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::NotAuthenticated("Invalid authorization header format".to_string())
        })?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::NotAuthenticated(e.to_string()))?;

        Ok(AuthenticatedUser(claims.caller()))
    }
}

/// API v1 routes with tracing and OpenAPI docs
pub fn router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/health", get(health::health_check))
        // Catalog
        .route("/media/:id", get(media::get_media))
        // Loans
        .route("/loans", post(loans::create_loan))
        .route("/loans/return", post(loans::return_loan))
        .route("/users/:id/loans", get(loans::get_user_loans))
        // Fines
        .route("/users/:id/fines", get(fines::get_user_fines))
        .route("/users/:id/balance", get(fines::get_user_balance))
        .route("/fines/:id/pay", post(fines::pay_fine))
        // Overdue
        .route("/overdue/scan", post(overdue::run_scan))
        .route("/overdue/reminders", post(overdue::send_reminders))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
}
