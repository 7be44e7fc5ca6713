//! In-memory employee records: performance reviews, training, badges and
//! wellness.
//!
//! Every operation is a [`Processor`] input type handled by [`EmployeeStore`].
//! Events about these records are published by the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use integrator_sdk::objects::Payload;
use integrator_sdk::objects::employee::{
    Badge, CreateTrainingModuleRequest, EarnBadgeRequest, LeaderboardEntry, LearningPath,
    LearningPathStatus, PerformanceReview, RecordWellnessRequest, ReviewType, TrainingModule,
    UpdateReviewRequest, WellnessRecord,
};
use kanau::processor::Processor;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// Most badges one employee can hold.
pub const MAX_BADGES_PER_EMPLOYEE: usize = 5;
/// Leaderboard points per badge.
pub const POINTS_PER_BADGE: f64 = 10.0;
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
pub const DEFAULT_WELLNESS_DAYS: i64 = 7;
const SECONDS_PER_DAY: i64 = 86_400;
/// Reviews cover the year before they are created.
const REVIEW_PERIOD_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmployeeError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("employee {0} does not qualify for this badge")]
    NotEligible(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Default)]
struct EmployeeData {
    reviews: Vec<PerformanceReview>,
    modules: Vec<TrainingModule>,
    paths: Vec<LearningPath>,
    badges: Vec<Badge>,
    wellness: Vec<WellnessRecord>,
}

/// Shared handle to the employee records.
#[derive(Debug, Clone, Default)]
pub struct EmployeeStore {
    data: Arc<RwLock<EmployeeData>>,
}

impl EmployeeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Performance reviews
// ---------------------------------------------------------------------------

/// Store a new draft review. The report text comes from the advisor or a
/// placeholder.
#[derive(Debug, Clone)]
pub struct CreateReview {
    pub employee_id: String,
    pub reviewer_id: String,
    pub review_type: ReviewType,
    pub metrics: Payload,
    pub ai_report: String,
}

impl Processor<CreateReview> for EmployeeStore {
    type Output = PerformanceReview;
    type Error = EmployeeError;

    async fn process(&self, input: CreateReview) -> Result<PerformanceReview, EmployeeError> {
        if input.employee_id.trim().is_empty() || input.reviewer_id.trim().is_empty() {
            return Err(EmployeeError::Invalid(
                "employee_id and reviewer_id are required".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        let review = PerformanceReview {
            id: format!("review_{}", data.reviews.len() + 1),
            employee_id: input.employee_id,
            reviewer_id: input.reviewer_id,
            review_type: input.review_type,
            period_start: now - Duration::days(REVIEW_PERIOD_DAYS),
            period_end: now,
            metrics: input.metrics,
            ai_report: input.ai_report,
            manager_feedback: String::new(),
            employee_feedback: String::new(),
            overall_rating: 0.0,
            status: "draft".to_string(),
            created_at: now,
            updated_at: now,
        };
        data.reviews.push(review.clone());
        Ok(review)
    }
}

#[derive(Debug, Clone)]
pub struct ListReviews {
    pub employee_id: String,
}

impl Processor<ListReviews> for EmployeeStore {
    type Output = Vec<PerformanceReview>;
    type Error = EmployeeError;

    async fn process(&self, input: ListReviews) -> Result<Vec<PerformanceReview>, EmployeeError> {
        let data = self.data.read().await;
        Ok(data
            .reviews
            .iter()
            .filter(|r| r.employee_id == input.employee_id)
            .cloned()
            .collect())
    }
}

/// Apply the fields present in `update`.
#[derive(Debug, Clone)]
pub struct UpdateReview {
    pub review_id: String,
    pub update: UpdateReviewRequest,
}

impl Processor<UpdateReview> for EmployeeStore {
    type Output = PerformanceReview;
    type Error = EmployeeError;

    async fn process(&self, input: UpdateReview) -> Result<PerformanceReview, EmployeeError> {
        let UpdateReview { review_id, update } = input;
        if let Some(rating) = update.overall_rating.filter(|r| !(0.0..=5.0).contains(r)) {
            return Err(EmployeeError::Invalid(format!(
                "overall_rating must be between 0 and 5, got {rating}"
            )));
        }

        let mut data = self.data.write().await;
        let review = data
            .reviews
            .iter_mut()
            .find(|r| r.id == review_id)
            .ok_or(EmployeeError::NotFound {
                kind: "review",
                id: review_id,
            })?;

        if let Some(feedback) = update.manager_feedback {
            review.manager_feedback = feedback;
        }
        if let Some(feedback) = update.employee_feedback {
            review.employee_feedback = feedback;
        }
        if let Some(rating) = update.overall_rating {
            review.overall_rating = rating;
        }
        if let Some(status) = update.status {
            review.status = status;
        }
        review.updated_at = OffsetDateTime::now_utc();
        Ok(review.clone())
    }
}

// ---------------------------------------------------------------------------
// Training modules and learning paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreateTrainingModule(pub CreateTrainingModuleRequest);

impl Processor<CreateTrainingModule> for EmployeeStore {
    type Output = TrainingModule;
    type Error = EmployeeError;

    async fn process(&self, input: CreateTrainingModule) -> Result<TrainingModule, EmployeeError> {
        let req = input.0;
        if req.title.trim().is_empty() {
            return Err(EmployeeError::Invalid("title is required".to_string()));
        }

        let mut data = self.data.write().await;
        let module = TrainingModule {
            id: format!("module_{}", data.modules.len() + 1),
            title: req.title,
            description: req.description,
            category: req.category,
            difficulty: req.difficulty.unwrap_or_else(|| "intermediate".to_string()),
            estimated_duration: req.estimated_duration.unwrap_or(60),
            prerequisites: req.prerequisites,
            learning_objectives: req.learning_objectives,
            gurukul_pipeline: req.gurukul_pipeline.unwrap_or_else(|| "default".to_string()),
            content_url: req.content_url.unwrap_or_default(),
            created_at: OffsetDateTime::now_utc(),
        };
        data.modules.push(module.clone());
        Ok(module)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListTrainingModules {
    pub category: Option<String>,
}

impl Processor<ListTrainingModules> for EmployeeStore {
    type Output = Vec<TrainingModule>;
    type Error = EmployeeError;

    async fn process(
        &self,
        input: ListTrainingModules,
    ) -> Result<Vec<TrainingModule>, EmployeeError> {
        let data = self.data.read().await;
        Ok(data
            .modules
            .iter()
            .filter(|m| input.category.as_ref().is_none_or(|c| m.category == *c))
            .cloned()
            .collect())
    }
}

/// Store a learning path whose modules are already in their final order.
#[derive(Debug, Clone)]
pub struct CreateLearningPath {
    pub employee_id: String,
    pub modules: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Processor<CreateLearningPath> for EmployeeStore {
    type Output = LearningPath;
    type Error = EmployeeError;

    async fn process(&self, input: CreateLearningPath) -> Result<LearningPath, EmployeeError> {
        if input.modules.is_empty() {
            return Err(EmployeeError::Invalid(
                "a learning path needs at least one module".to_string(),
            ));
        }

        let mut data = self.data.write().await;
        let progress: BTreeMap<String, f64> =
            input.modules.iter().map(|m| (m.clone(), 0.0)).collect();
        let path = LearningPath {
            id: format!("path_{}", data.paths.len() + 1),
            employee_id: input.employee_id,
            title: input
                .title
                .unwrap_or_else(|| "Personalized Learning Path".to_string()),
            description: input.description.unwrap_or_default(),
            modules: input.modules,
            progress,
            status: LearningPathStatus::Active,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        };
        data.paths.push(path.clone());
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct ListLearningPaths {
    pub employee_id: String,
}

impl Processor<ListLearningPaths> for EmployeeStore {
    type Output = Vec<LearningPath>;
    type Error = EmployeeError;

    async fn process(&self, input: ListLearningPaths) -> Result<Vec<LearningPath>, EmployeeError> {
        let data = self.data.read().await;
        Ok(data
            .paths
            .iter()
            .filter(|p| p.employee_id == input.employee_id)
            .cloned()
            .collect())
    }
}

/// Set one module's completion percentage. The path completes once every
/// module reaches 100.
#[derive(Debug, Clone)]
pub struct UpdateLearningProgress {
    pub path_id: String,
    pub module_id: String,
    pub progress: f64,
}

impl Processor<UpdateLearningProgress> for EmployeeStore {
    type Output = LearningPath;
    type Error = EmployeeError;

    async fn process(&self, input: UpdateLearningProgress) -> Result<LearningPath, EmployeeError> {
        if !(0.0..=100.0).contains(&input.progress) {
            return Err(EmployeeError::Invalid(format!(
                "progress must be between 0 and 100, got {}",
                input.progress
            )));
        }

        let mut data = self.data.write().await;
        let path = data
            .paths
            .iter_mut()
            .find(|p| p.id == input.path_id)
            .ok_or(EmployeeError::NotFound {
                kind: "learning path",
                id: input.path_id,
            })?;

        let Some(slot) = path.progress.get_mut(&input.module_id) else {
            return Err(EmployeeError::Invalid(format!(
                "module {} is not part of learning path {}",
                input.module_id, path.id
            )));
        };
        *slot = input.progress;

        let complete = path.progress.values().all(|p| *p >= 100.0);
        match (complete, path.status) {
            (true, LearningPathStatus::Active) => {
                path.status = LearningPathStatus::Completed;
                path.completed_at = Some(OffsetDateTime::now_utc());
            }
            (false, LearningPathStatus::Completed) => {
                path.status = LearningPathStatus::Active;
                path.completed_at = None;
            }
            _ => {}
        }
        Ok(path.clone())
    }
}

// ---------------------------------------------------------------------------
// Badges and leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EarnBadge(pub EarnBadgeRequest);

impl Processor<EarnBadge> for EmployeeStore {
    type Output = Badge;
    type Error = EmployeeError;

    async fn process(&self, input: EarnBadge) -> Result<Badge, EmployeeError> {
        let req = input.0;
        let mut data = self.data.write().await;

        let held = data
            .badges
            .iter()
            .filter(|b| b.employee_id == req.employee_id)
            .count();
        if held >= MAX_BADGES_PER_EMPLOYEE {
            return Err(EmployeeError::NotEligible(req.employee_id));
        }

        let badge = Badge {
            id: format!("badge_{}", data.badges.len() + 1),
            employee_id: req.employee_id,
            badge_type: req.badge_type,
            title: req
                .title
                .unwrap_or_else(|| req.badge_type.default_title().to_string()),
            description: req.description.unwrap_or_default(),
            icon_url: req.icon_url.unwrap_or_default(),
            earned_at: OffsetDateTime::now_utc(),
            criteria: req.criteria,
        };
        data.badges.push(badge.clone());
        Ok(badge)
    }
}

#[derive(Debug, Clone)]
pub struct ListBadges {
    pub employee_id: String,
}

impl Processor<ListBadges> for EmployeeStore {
    type Output = Vec<Badge>;
    type Error = EmployeeError;

    async fn process(&self, input: ListBadges) -> Result<Vec<Badge>, EmployeeError> {
        let data = self.data.read().await;
        Ok(data
            .badges
            .iter()
            .filter(|b| b.employee_id == input.employee_id)
            .cloned()
            .collect())
    }
}

/// Employees ranked by badge points. Equal scores keep the order in which
/// the employees earned their first badge.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    pub limit: usize,
}

impl Processor<Leaderboard> for EmployeeStore {
    type Output = Vec<LeaderboardEntry>;
    type Error = EmployeeError;

    async fn process(&self, input: Leaderboard) -> Result<Vec<LeaderboardEntry>, EmployeeError> {
        let data = self.data.read().await;

        let mut entries: Vec<LeaderboardEntry> = Vec::new();
        for badge in &data.badges {
            match entries
                .iter_mut()
                .find(|e| e.employee_id == badge.employee_id)
            {
                Some(entry) => {
                    entry.score += POINTS_PER_BADGE;
                    entry.badges_count += 1;
                }
                None => entries.push(LeaderboardEntry {
                    employee_id: badge.employee_id.clone(),
                    employee_name: format!("Employee {}", badge.employee_id),
                    score: POINTS_PER_BADGE,
                    rank: 0,
                    badges_count: 1,
                }),
            }
        }

        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries.truncate(input.limit);
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Wellness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordWellness(pub RecordWellnessRequest);

impl RecordWellness {
    /// Long stretches without a break warrant a reminder.
    pub fn needs_break_reminder(record: &WellnessRecord) -> bool {
        record.work_hours > 4.0 && record.break_count == 0
    }
}

impl Processor<RecordWellness> for EmployeeStore {
    type Output = WellnessRecord;
    type Error = EmployeeError;

    async fn process(&self, input: RecordWellness) -> Result<WellnessRecord, EmployeeError> {
        let req = input.0;
        for (name, level) in [
            ("stress_level", req.stress_level),
            ("energy_level", req.energy_level),
        ] {
            if !(1..=10).contains(&level) {
                return Err(EmployeeError::Invalid(format!(
                    "{name} must be between 1 and 10, got {level}"
                )));
            }
        }
        if req.work_hours < 0.0 || req.sleep_hours < 0.0 {
            return Err(EmployeeError::Invalid(
                "hours cannot be negative".to_string(),
            ));
        }

        let mut data = self.data.write().await;
        let record = WellnessRecord {
            id: format!("wellness_{}", data.wellness.len() + 1),
            employee_id: req.employee_id,
            date: OffsetDateTime::now_utc(),
            work_hours: req.work_hours,
            break_count: req.break_count,
            stress_level: req.stress_level,
            energy_level: req.energy_level,
            sleep_hours: req.sleep_hours,
            exercise_minutes: req.exercise_minutes,
            last_break_reminder: None,
        };
        data.wellness.push(record.clone());
        Ok(record)
    }
}

/// Records from the last `days` days. Non-positive values mean the default
/// week; a window reaching past the earliest representable date returns
/// everything.
#[derive(Debug, Clone)]
pub struct ListWellness {
    pub employee_id: String,
    pub days: i64,
}

impl Processor<ListWellness> for EmployeeStore {
    type Output = Vec<WellnessRecord>;
    type Error = EmployeeError;

    async fn process(&self, input: ListWellness) -> Result<Vec<WellnessRecord>, EmployeeError> {
        let days = if input.days > 0 {
            input.days
        } else {
            DEFAULT_WELLNESS_DAYS
        };
        let cutoff = days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|secs| OffsetDateTime::now_utc().checked_sub(Duration::seconds(secs)));

        let data = self.data.read().await;
        Ok(data
            .wellness
            .iter()
            .filter(|r| r.employee_id == input.employee_id)
            .filter(|r| cutoff.is_none_or(|cutoff| r.date >= cutoff))
            .cloned()
            .collect())
    }
}

/// Stamp the employee's most recent wellness record with the reminder time.
#[derive(Debug, Clone)]
pub struct MarkBreakReminder {
    pub employee_id: String,
}

impl Processor<MarkBreakReminder> for EmployeeStore {
    type Output = Option<OffsetDateTime>;
    type Error = EmployeeError;

    async fn process(
        &self,
        input: MarkBreakReminder,
    ) -> Result<Option<OffsetDateTime>, EmployeeError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        let latest = data
            .wellness
            .iter_mut()
            .rev()
            .find(|r| r.employee_id == input.employee_id);
        Ok(latest.map(|record| {
            record.last_break_reminder = Some(now);
            now
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use integrator_sdk::objects::employee::BadgeType;

    fn badge_request(employee_id: &str) -> EarnBadgeRequest {
        EarnBadgeRequest {
            employee_id: employee_id.into(),
            badge_type: BadgeType::Teamwork,
            title: None,
            description: None,
            icon_url: None,
            criteria: Payload::new(),
        }
    }

    #[tokio::test]
    async fn test_review_lifecycle() {
        let store = EmployeeStore::new();
        let review = store
            .process(CreateReview {
                employee_id: "emp_001".into(),
                reviewer_id: "mgr_1".into(),
                review_type: ReviewType::Annual,
                metrics: Payload::new(),
                ai_report: "solid year".into(),
            })
            .await
            .unwrap();
        assert_eq!(review.id, "review_1");
        assert_eq!(review.status, "draft");
        assert!(review.period_end > review.period_start);

        let updated = store
            .process(UpdateReview {
                review_id: "review_1".into(),
                update: UpdateReviewRequest {
                    manager_feedback: Some("great".into()),
                    overall_rating: Some(4.5),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert_eq!(updated.manager_feedback, "great");
        assert_eq!(updated.overall_rating, 4.5);
        assert_eq!(updated.status, "draft");

        let missing = store
            .process(UpdateReview {
                review_id: "review_9".into(),
                update: UpdateReviewRequest::default(),
            })
            .await;
        assert!(matches!(missing, Err(EmployeeError::NotFound { .. })));

        let listed = store
            .process(ListReviews {
                employee_id: "emp_001".into(),
            })
            .await
            .unwrap();
        assert_eq!(listed, vec![updated]);
    }

    #[tokio::test]
    async fn test_module_category_filter() {
        let store = EmployeeStore::new();
        for (title, category) in [("Rust", "engineering"), ("Sales 101", "sales")] {
            store
                .process(CreateTrainingModule(CreateTrainingModuleRequest {
                    title: title.into(),
                    description: String::new(),
                    category: category.into(),
                    difficulty: None,
                    estimated_duration: None,
                    prerequisites: vec![],
                    learning_objectives: vec![],
                    gurukul_pipeline: None,
                    content_url: None,
                }))
                .await
                .unwrap();
        }

        let all = store.process(ListTrainingModules::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].estimated_duration, 60);
        assert_eq!(all[1].id, "module_2");

        let sales = store
            .process(ListTrainingModules {
                category: Some("sales".into()),
            })
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].title, "Sales 101");
    }

    #[tokio::test]
    async fn test_learning_path_completes_at_full_progress() {
        let store = EmployeeStore::new();
        let path = store
            .process(CreateLearningPath {
                employee_id: "emp_002".into(),
                modules: vec!["module_1".into(), "module_2".into()],
                title: None,
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(path.status, LearningPathStatus::Active);
        assert_eq!(path.progress.len(), 2);

        let update = |module: &str, progress: f64| UpdateLearningProgress {
            path_id: path.id.clone(),
            module_id: module.into(),
            progress,
        };

        let half = store.process(update("module_1", 100.0)).await.unwrap();
        assert_eq!(half.status, LearningPathStatus::Active);

        let done = store.process(update("module_2", 100.0)).await.unwrap();
        assert_eq!(done.status, LearningPathStatus::Completed);
        assert!(done.completed_at.is_some());

        let stray = store.process(update("module_7", 50.0)).await;
        assert!(matches!(stray, Err(EmployeeError::Invalid(_))));
        let over = store.process(update("module_1", 150.0)).await;
        assert!(matches!(over, Err(EmployeeError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_badge_limit_and_leaderboard() {
        let store = EmployeeStore::new();
        for _ in 0..MAX_BADGES_PER_EMPLOYEE {
            store.process(EarnBadge(badge_request("emp_a"))).await.unwrap();
        }
        let refused = store.process(EarnBadge(badge_request("emp_a"))).await;
        assert_eq!(refused, Err(EmployeeError::NotEligible("emp_a".into())));

        let first_b = store.process(EarnBadge(badge_request("emp_b"))).await.unwrap();
        assert_eq!(first_b.title, "Teamwork Badge");
        store.process(EarnBadge(badge_request("emp_c"))).await.unwrap();
        store.process(EarnBadge(badge_request("emp_c"))).await.unwrap();

        let board = store.process(Leaderboard { limit: 10 }).await.unwrap();
        let order: Vec<_> = board
            .iter()
            .map(|e| (e.employee_id.as_str(), e.score, e.rank))
            .collect();
        assert_eq!(
            order,
            vec![("emp_a", 50.0, 1), ("emp_c", 20.0, 2), ("emp_b", 10.0, 3)]
        );

        let top = store.process(Leaderboard { limit: 1 }).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_wellness_and_break_reminder() {
        let store = EmployeeStore::new();
        let request: RecordWellnessRequest = serde_json::from_value(serde_json::json!({
            "employee_id": "emp_003",
            "work_hours": 5.5
        }))
        .unwrap();
        let record = store.process(RecordWellness(request)).await.unwrap();
        assert!(RecordWellness::needs_break_reminder(&record));

        let stamped = store
            .process(MarkBreakReminder {
                employee_id: "emp_003".into(),
            })
            .await
            .unwrap();
        assert!(stamped.is_some());

        let records = store
            .process(ListWellness {
                employee_id: "emp_003".into(),
                days: 0,
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_break_reminder, stamped);

        let nobody = store
            .process(MarkBreakReminder {
                employee_id: "emp_404".into(),
            })
            .await
            .unwrap();
        assert_eq!(nobody, None);
    }

    #[tokio::test]
    async fn test_huge_wellness_window_returns_everything() {
        let store = EmployeeStore::new();
        let request: RecordWellnessRequest = serde_json::from_value(serde_json::json!({
            "employee_id": "emp_001",
            "work_hours": 8.0,
            "break_count": 2
        }))
        .unwrap();
        store.process(RecordWellness(request)).await.unwrap();

        for days in [10_000_000, i64::MAX] {
            let records = store
                .process(ListWellness {
                    employee_id: "emp_001".into(),
                    days,
                })
                .await
                .unwrap();
            assert_eq!(records.len(), 1, "days = {days}");
        }
    }
}
