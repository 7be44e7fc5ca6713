use axum::{
    Json,
    extract::{Path, State},
};
use integrator_core::entities::employee::{
    DEFAULT_WELLNESS_DAYS, ListWellness, MarkBreakReminder, RecordWellness,
};
use integrator_core::events::{Payload, Priority};
use integrator_sdk::objects::employee::{
    RecordWellnessRequest, ReminderResponse, WellnessQuery, WellnessRecordedResponse,
    WellnessRecordsResponse,
};
use kanau::processor::Processor;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::SOURCE;
use crate::api::extractors::{JsonBody, QueryParams};
use crate::api::{ApiError, publish_primary};
use crate::state::AppState;

const BREAK_MESSAGE: &str =
    "You've been working for 4+ hours. Consider taking a short break to recharge!";

/// Publish a `break_reminder` for `employee_id` and stamp their latest
/// wellness record. Returns the event id and the stamp, if a record existed.
async fn send_break_reminder(
    state: &AppState,
    employee_id: &str,
) -> Result<(String, Option<OffsetDateTime>), ApiError> {
    let stamped = state
        .employees
        .process(MarkBreakReminder {
            employee_id: employee_id.to_string(),
        })
        .await?;
    let timestamp = stamped
        .unwrap_or_else(OffsetDateTime::now_utc)
        .format(&Rfc3339)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut payload = Payload::new();
    payload.insert("employee_id".to_string(), json!(employee_id));
    payload.insert("message".to_string(), json!(BREAK_MESSAGE));
    payload.insert("timestamp".to_string(), json!(timestamp));
    let event_id = publish_primary(
        state,
        "break_reminder",
        SOURCE,
        &["notification"],
        Priority::Medium,
        payload,
    )
    .await?;

    tracing::info!(employee_id, event_id = %event_id, "Break reminder sent");
    Ok((event_id, stamped))
}

/// `POST /wellness/record`: a long day without breaks triggers a reminder.
pub async fn record_wellness(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RecordWellnessRequest>,
) -> Result<Json<WellnessRecordedResponse>, ApiError> {
    let mut record = state.employees.process(RecordWellness(request)).await?;

    let break_reminder_sent = RecordWellness::needs_break_reminder(&record);
    if break_reminder_sent {
        let (_, stamped) = send_break_reminder(&state, &record.employee_id).await?;
        record.last_break_reminder = stamped;
    }

    Ok(Json(WellnessRecordedResponse {
        status: "recorded".to_string(),
        record,
        break_reminder_sent,
    }))
}

/// `GET /wellness/{employee_id}?days=`
pub async fn list_wellness(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    QueryParams(query): QueryParams<WellnessQuery>,
) -> Result<Json<WellnessRecordsResponse>, ApiError> {
    let records = state
        .employees
        .process(ListWellness {
            employee_id,
            days: query.days.unwrap_or(DEFAULT_WELLNESS_DAYS),
        })
        .await?;
    Ok(Json(WellnessRecordsResponse { records }))
}

/// `POST /wellness/break-reminder/{employee_id}`
pub async fn break_reminder(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let (event_id, _) = send_break_reminder(&state, &employee_id).await?;
    Ok(Json(ReminderResponse {
        status: "reminder_sent".to_string(),
        event_id,
    }))
}
