use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{require_non_empty, AppState, ValidJson};
use crate::errors::AppError;
use crate::usage::UsageSummary;
use crate::wire::{UsageEventRequest, UsageQuery};

pub async fn record_usage(
    State(state): State<AppState>,
    ValidJson(event): ValidJson<UsageEventRequest>,
) -> Result<Json<UsageSummary>, AppError> {
    require_non_empty("userId", &event.user_id)?;
    if i64::try_from(event.tokens_used).is_err() {
        return Err(AppError::Validation(format!("tokensUsed must be at most {}", i64::MAX)));
    }
    let summary = state
        .usage
        .record(&event.user_id, event.action_type, event.tokens_used, event.metadata.as_ref())
        .map_err(AppError::internal)?;
    tracing::debug!(
        user = %event.user_id,
        action = event.action_type.as_str(),
        tokens = event.tokens_used,
        "usage recorded"
    );
    Ok(Json(summary))
}

pub async fn usage_summary(
    State(state): State<AppState>,
    query: Result<Query<UsageQuery>, QueryRejection>,
) -> Result<Json<UsageSummary>, AppError> {
    let Query(q) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    require_non_empty("userId", &q.user_id)?;
    Ok(Json(state.usage.summary(&q.user_id).map_err(AppError::internal)?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/usage", get(usage_summary).post(record_usage))
}
