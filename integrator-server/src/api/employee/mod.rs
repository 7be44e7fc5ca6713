//! Employee management API.
//!
//! Records live in the in-process [`EmployeeStore`](integrator_core::entities::EmployeeStore);
//! nothing is proxied.
//!
//! # Endpoints
//!
//! - `POST /performance-reviews`              – create a review with an AI report
//! - `GET  /performance-reviews/{id}`         – reviews of an employee
//! - `PUT  /performance-reviews/{id}`         – update a review
//! - `POST /training-modules`                 – create a training module
//! - `GET  /training-modules`                 – list modules (`?category=`)
//! - `POST /learning-paths`                   – create a personalized path
//! - `GET  /learning-paths/{id}`              – paths of an employee
//! - `PUT  /learning-paths/{id}/progress`     – record module progress
//! - `POST /badges/earn`                      – award a badge
//! - `GET  /badges/{id}`                      – badges of an employee
//! - `GET  /leaderboard`                      – badge leaderboard (`?limit=`)
//! - `POST /wellness/record`                  – record wellness data
//! - `GET  /wellness/{id}`                    – recent wellness records (`?days=`)
//! - `POST /wellness/break-reminder/{id}`     – send a break reminder

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

mod badges;
mod reviews;
mod training;
mod wellness;

/// Source system of every employee event.
const SOURCE: &str = "employee_management";

/// Build the employee router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/performance-reviews", post(reviews::create_review))
        .route(
            "/performance-reviews/{id}",
            get(reviews::list_reviews).put(reviews::update_review),
        )
        .route(
            "/training-modules",
            get(training::list_modules).post(training::create_module),
        )
        .route("/learning-paths", post(training::create_path))
        .route("/learning-paths/{id}", get(training::list_paths))
        .route("/learning-paths/{id}/progress", put(training::update_progress))
        .route("/badges/earn", post(badges::earn_badge))
        .route("/badges/{id}", get(badges::list_badges))
        .route("/leaderboard", get(badges::leaderboard))
        .route("/wellness/record", post(wellness::record_wellness))
        .route("/wellness/{id}", get(wellness::list_wellness))
        .route(
            "/wellness/break-reminder/{id}",
            post(wellness::break_reminder),
        )
}
