//! Employee management records and request bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::event::Payload;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    #[default]
    Annual,
    MidYear,
    Project,
    Probation,
}

impl std::fmt::Display for ReviewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewType::Annual => write!(f, "annual"),
            ReviewType::MidYear => write!(f, "mid_year"),
            ReviewType::Project => write!(f, "project"),
            ReviewType::Probation => write!(f, "probation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeType {
    Productivity,
    Quality,
    Teamwork,
    Innovation,
    Leadership,
}

impl BadgeType {
    /// Title used when the caller does not name the badge.
    pub fn default_title(&self) -> &'static str {
        match self {
            BadgeType::Productivity => "Productivity Badge",
            BadgeType::Quality => "Quality Badge",
            BadgeType::Teamwork => "Teamwork Badge",
            BadgeType::Innovation => "Innovation Badge",
            BadgeType::Leadership => "Leadership Badge",
        }
    }
}

impl std::fmt::Display for BadgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BadgeType::Productivity => write!(f, "productivity"),
            BadgeType::Quality => write!(f, "quality"),
            BadgeType::Teamwork => write!(f, "teamwork"),
            BadgeType::Innovation => write!(f, "innovation"),
            BadgeType::Leadership => write!(f, "leadership"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningPathStatus {
    Active,
    Completed,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReview {
    pub id: String,
    pub employee_id: String,
    pub reviewer_id: String,
    pub review_type: ReviewType,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    pub metrics: Payload,
    pub ai_report: String,
    pub manager_feedback: String,
    pub employee_feedback: String,
    pub overall_rating: f64,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingModule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    /// Minutes.
    pub estimated_duration: u32,
    pub prerequisites: Vec<String>,
    pub learning_objectives: Vec<String>,
    pub gurukul_pipeline: String,
    pub content_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: String,
    pub employee_id: String,
    pub title: String,
    pub description: String,
    pub modules: Vec<String>,
    /// Module id to completion percentage.
    pub progress: BTreeMap<String, f64>,
    pub status: LearningPathStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub employee_id: String,
    pub badge_type: BadgeType,
    pub title: String,
    pub description: String,
    pub icon_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub earned_at: OffsetDateTime,
    pub criteria: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub employee_id: String,
    pub employee_name: String,
    pub score: f64,
    pub rank: usize,
    pub badges_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessRecord {
    pub id: String,
    pub employee_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub work_hours: f64,
    pub break_count: u32,
    /// 1 to 10.
    pub stress_level: u8,
    /// 1 to 10.
    pub energy_level: u8,
    pub sleep_hours: f64,
    pub exercise_minutes: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_break_reminder: Option<OffsetDateTime>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /employee/performance-reviews`.
///
/// The ids are optional so that a missing id is reported as a validation
/// error by the handler rather than as a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub reviewer_id: Option<String>,
    #[serde(default)]
    pub review_type: ReviewType,
    #[serde(default)]
    pub metrics: Payload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReviewRequest {
    #[serde(default)]
    pub manager_feedback: Option<String>,
    #[serde(default)]
    pub employee_feedback: Option<String>,
    #[serde(default)]
    pub overall_rating: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrainingModuleRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub gurukul_pipeline: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLearningPathRequest {
    pub employee_id: String,
    pub modules: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProgressRequest {
    pub module_id: String,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnBadgeRequest {
    pub employee_id: String,
    pub badge_type: BadgeType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub criteria: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordWellnessRequest {
    pub employee_id: String,
    #[serde(default)]
    pub work_hours: f64,
    #[serde(default)]
    pub break_count: u32,
    #[serde(default = "mid_level")]
    pub stress_level: u8,
    #[serde(default = "mid_level")]
    pub energy_level: u8,
    #[serde(default = "full_night")]
    pub sleep_hours: f64,
    #[serde(default)]
    pub exercise_minutes: u32,
}

fn mid_level() -> u8 {
    5
}

fn full_night() -> f64 {
    8.0
}

/// Query of `GET /employee/training-modules`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleFilter {
    #[serde(default)]
    pub category: Option<String>,
}

/// Query of `GET /employee/leaderboard`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query of `GET /employee/wellness/{employee_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WellnessQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCreatedResponse {
    pub status: String,
    pub review_id: String,
    pub ai_report: String,
    pub ai_report_generated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdatedResponse {
    pub status: String,
    pub review: PerformanceReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewsResponse {
    pub reviews: Vec<PerformanceReview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCreatedResponse {
    pub status: String,
    pub module: TrainingModule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulesResponse {
    pub modules: Vec<TrainingModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResponse {
    pub status: String,
    pub path: LearningPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsResponse {
    pub paths: Vec<LearningPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeEarnedResponse {
    pub status: String,
    pub badge: Badge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgesResponse {
    pub badges: Vec<Badge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessRecordedResponse {
    pub status: String,
    pub record: WellnessRecord,
    pub break_reminder_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessRecordsResponse {
    pub records: Vec<WellnessRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderResponse {
    pub status: String,
    pub event_id: String,
}
