use axum::{
    Json,
    extract::{Path, State},
};
use integrator_core::entities::employee::{CreateReview, ListReviews, UpdateReview};
use integrator_core::events::{Payload, Priority};
use integrator_sdk::objects::employee::{
    CreateReviewRequest, ReviewCreatedResponse, ReviewUpdatedResponse, ReviewsResponse,
    UpdateReviewRequest,
};
use kanau::processor::Processor;
use serde_json::json;

use super::SOURCE;
use crate::api::extractors::JsonBody;
use crate::api::{ApiError, publish_primary};
use crate::state::AppState;

const REPORT_UNAVAILABLE: &str = "Unable to generate AI performance report at this time.";

/// `POST /performance-reviews`: create a draft review.
///
/// The report text comes from the advisor. When the advisor fails the
/// review is still created with a placeholder and `ai_report_generated`
/// set to false.
pub async fn create_review(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateReviewRequest>,
) -> Result<Json<ReviewCreatedResponse>, ApiError> {
    let (Some(employee_id), Some(reviewer_id)) = (
        request.employee_id.filter(|id| !id.trim().is_empty()),
        request.reviewer_id.filter(|id| !id.trim().is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Employee ID and reviewer ID required".to_string(),
        ));
    };

    let (ai_report, ai_report_generated) = match state
        .advisor
        .performance_report(&employee_id, request.review_type)
        .await
    {
        Ok(report) => (report, true),
        Err(e) => {
            tracing::warn!(employee_id = %employee_id, error = %e, "Performance report unavailable");
            (REPORT_UNAVAILABLE.to_string(), false)
        }
    };

    let review = state
        .employees
        .process(CreateReview {
            employee_id,
            reviewer_id,
            review_type: request.review_type,
            metrics: request.metrics,
            ai_report,
        })
        .await?;

    let mut payload = Payload::new();
    payload.insert("review_id".to_string(), json!(review.id));
    payload.insert("employee_id".to_string(), json!(review.employee_id));
    payload.insert("reviewer_id".to_string(), json!(review.reviewer_id));
    payload.insert("ai_report_generated".to_string(), json!(ai_report_generated));
    publish_primary(
        &state,
        "performance_review_created",
        SOURCE,
        &[],
        Priority::Medium,
        payload,
    )
    .await?;

    Ok(Json(ReviewCreatedResponse {
        status: "created".to_string(),
        review_id: review.id,
        ai_report: review.ai_report,
        ai_report_generated,
    }))
}

/// `GET /performance-reviews/{employee_id}`
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<ReviewsResponse>, ApiError> {
    let reviews = state.employees.process(ListReviews { employee_id }).await?;
    Ok(Json(ReviewsResponse { reviews }))
}

/// `PUT /performance-reviews/{review_id}`
pub async fn update_review(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    JsonBody(update): JsonBody<UpdateReviewRequest>,
) -> Result<Json<ReviewUpdatedResponse>, ApiError> {
    let review = state
        .employees
        .process(UpdateReview { review_id, update })
        .await?;
    Ok(Json(ReviewUpdatedResponse {
        status: "updated".to_string(),
        review,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::testing::{CLOSED, call, state_with_failing_advisor, unreachable_state};
    use crate::server::build_router;

    #[tokio::test]
    async fn test_review_lifecycle() {
        let state = unreachable_state();

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/employee/performance-reviews",
            Some(json!({
                "employee_id": "emp_001",
                "reviewer_id": "mgr_1",
                "review_type": "project",
                "metrics": {"tasks_completed": 40},
            })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], json!("created"));
        assert_eq!(body["review_id"], json!("review_1"));
        assert_eq!(body["ai_report"], json!("project report for emp_001"));
        assert_eq!(body["ai_report_generated"], json!(true));

        let (status, body) = call(
            build_router(state.clone()),
            "PUT",
            "/employee/performance-reviews/review_1",
            Some(json!({"overall_rating": 4.5, "status": "final"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["review"]["overall_rating"], json!(4.5));
        assert_eq!(body["review"]["status"], json!("final"));

        let (_, body) = call(
            build_router(state.clone()),
            "GET",
            "/employee/performance-reviews/emp_001",
            None,
        )
        .await;
        assert_eq!(body["reviews"].as_array().unwrap().len(), 1);

        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "performance_review_created");
        assert_eq!(events[0].source_system, "employee_management");
    }

    #[tokio::test]
    async fn test_review_validation_and_missing_review() {
        let state = unreachable_state();

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/employee/performance-reviews",
            Some(json!({"employee_id": "emp_001"})),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["detail"], json!("Employee ID and reviewer ID required"));
        assert!(state.broker.store().is_empty().await);

        let (status, _) = call(
            build_router(state.clone()),
            "PUT",
            "/employee/performance-reviews/review_9",
            Some(json!({"status": "final"})),
        )
        .await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_failing_advisor_uses_placeholder() {
        let state = state_with_failing_advisor(&CLOSED.parse().unwrap());
        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/employee/performance-reviews",
            Some(json!({"employee_id": "emp_002", "reviewer_id": "mgr_1"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["ai_report_generated"], json!(false));
        assert_eq!(body["ai_report"], json!(super::REPORT_UNAVAILABLE));

        let events = state.broker.store().recent(1).await;
        assert_eq!(events[0].payload["ai_report_generated"], json!(false));
    }
}
