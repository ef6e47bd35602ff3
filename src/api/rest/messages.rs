//! Message endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;

use super::{ApiError, ApiResponse};
use crate::api::state::AppState;
use crate::service::MessageView;

/// Query parameters for reading a game's log
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    /// First seq to return (inclusive)
    pub start: Option<u64>,
    /// Last seq to return (inclusive)
    pub end: Option<u64>,
}

/// POST /api/v1/:game/messages - Append the request body to a game's log
pub async fn post_message(
    State(state): State<AppState>,
    Path(game): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let posted = state.service.post_message(&game, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(posted))))
}

/// GET /api/v1/:game/messages - Read `[start, end]` in ascending seq order
pub async fn get_messages(
    State(state): State<AppState>,
    Path(game): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let messages: Vec<MessageView> = state
        .service
        .get_messages(&game, params.start, params.end)?
        .try_collect()
        .await?;

    let total = messages.len();
    Ok(Json(ApiResponse::with_total(messages, total)))
}
