//! Catalog lookup endpoint

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::Media, AppState};

use super::AuthenticatedUser;

/// Get a media with its availability
#[utoipa::path(
    get,
    path = "/media/{id}",
    tag = "media",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "Media details", body = Media),
        (status = 404, description = "Media not found")
    )
)]
pub async fn get_media(
    State(state): State<AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Media>> {
    let media = state.services.borrowing.media(id).await?;
    Ok(Json(media))
}
