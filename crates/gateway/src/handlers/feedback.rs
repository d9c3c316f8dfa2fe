//! Feedback endpoint
//!
//! Records a helpful/not-helpful rating against a prior response. Outside
//! the scored core pipeline but shares the audit store.

use crate::state::AppState;
use axum::{extract::State, Json};
use bookrag_common::db::models::FeedbackRating;
use bookrag_common::errors::{AppError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedbackRequest {
    pub response_id: Uuid,
    pub rating: FeedbackRating,

    #[validate(length(max = 500, message = "comment must be at most 500 characters"))]
    pub comment: Option<String>,

    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub feedback_id: Uuid,
    pub message: String,
    pub timestamp: chrono::DateTime<Utc>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let response_exists = state
        .repository
        .find_query_response(request.response_id)
        .await?
        .is_some();

    if !response_exists {
        return Err(AppError::ResponseNotFound {
            id: request.response_id.to_string(),
        });
    }

    tracing::info!(
        response_id = %request.response_id,
        user_id = %request.user_id,
        rating = ?request.rating,
        "feedback received"
    );

    let feedback = state
        .repository
        .insert_feedback(request.response_id, request.rating, request.comment.as_deref())
        .await?;

    Ok(Json(FeedbackResponse {
        feedback_id: feedback.id,
        message: "Thank you for your feedback".to_string(),
        timestamp: Utc::now(),
    }))
}
