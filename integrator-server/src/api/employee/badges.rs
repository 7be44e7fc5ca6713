use axum::{
    Json,
    extract::{Path, State},
};
use integrator_core::entities::employee::{
    DEFAULT_LEADERBOARD_LIMIT, EarnBadge, Leaderboard, ListBadges,
};
use integrator_core::events::{Payload, Priority};
use integrator_sdk::objects::employee::{
    BadgeEarnedResponse, BadgesResponse, EarnBadgeRequest, LeaderboardQuery, LeaderboardResponse,
};
use kanau::processor::Processor;
use serde_json::json;

use super::SOURCE;
use crate::api::extractors::{JsonBody, QueryParams};
use crate::api::{ApiError, publish_primary};
use crate::state::AppState;

/// `POST /badges/earn`
pub async fn earn_badge(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<EarnBadgeRequest>,
) -> Result<Json<BadgeEarnedResponse>, ApiError> {
    let badge = state.employees.process(EarnBadge(request)).await?;

    let mut payload = Payload::new();
    payload.insert("badge_id".to_string(), json!(badge.id));
    payload.insert("employee_id".to_string(), json!(badge.employee_id));
    payload.insert("badge_type".to_string(), json!(badge.badge_type));
    publish_primary(&state, "badge_earned", SOURCE, &[], Priority::Medium, payload).await?;

    Ok(Json(BadgeEarnedResponse {
        status: "earned".to_string(),
        badge,
    }))
}

/// `GET /badges/{employee_id}`
pub async fn list_badges(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<BadgesResponse>, ApiError> {
    let badges = state.employees.process(ListBadges { employee_id }).await?;
    Ok(Json(BadgesResponse { badges }))
}

/// `GET /leaderboard?limit=`
pub async fn leaderboard(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let leaderboard = state
        .employees
        .process(Leaderboard {
            limit: query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT),
        })
        .await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}
