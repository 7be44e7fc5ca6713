use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, State},
};
use integrator_core::entities::employee::{
    CreateLearningPath, CreateTrainingModule, ListLearningPaths, ListTrainingModules,
    UpdateLearningProgress,
};
use integrator_core::events::{Payload, Priority};
use integrator_sdk::objects::employee::{
    CreateLearningPathRequest, CreateTrainingModuleRequest, ModuleCreatedResponse, ModuleFilter,
    ModulesResponse, PathResponse, PathsResponse, UpdateProgressRequest,
};
use kanau::processor::Processor;
use serde_json::json;

use super::SOURCE;
use crate::api::extractors::{JsonBody, QueryParams};
use crate::api::{ApiError, publish_primary};
use crate::state::AppState;

/// `POST /training-modules`
pub async fn create_module(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateTrainingModuleRequest>,
) -> Result<Json<ModuleCreatedResponse>, ApiError> {
    let module = state
        .employees
        .process(CreateTrainingModule(request))
        .await?;

    let mut payload = Payload::new();
    payload.insert("module_id".to_string(), json!(module.id));
    payload.insert("title".to_string(), json!(module.title));
    payload.insert("category".to_string(), json!(module.category));
    publish_primary(
        &state,
        "training_module_created",
        SOURCE,
        &[],
        Priority::Medium,
        payload,
    )
    .await?;

    Ok(Json(ModuleCreatedResponse {
        status: "created".to_string(),
        module,
    }))
}

/// `GET /training-modules?category=`
pub async fn list_modules(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<ModuleFilter>,
) -> Result<Json<ModulesResponse>, ApiError> {
    let modules = state
        .employees
        .process(ListTrainingModules {
            category: filter.category,
        })
        .await?;
    Ok(Json(ModulesResponse { modules }))
}

/// `POST /learning-paths`: the advisor decides the module order.
///
/// The advisor's order is used only when it is a reordering of the
/// requested modules; otherwise the requested order stands.
pub async fn create_path(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateLearningPathRequest>,
) -> Result<Json<PathResponse>, ApiError> {
    let modules = match state
        .advisor
        .personalize_learning_path(&request.employee_id, &request.modules)
        .await
    {
        Ok(ordered) if same_modules(&ordered, &request.modules) => ordered,
        Ok(_) => {
            tracing::warn!(
                employee_id = %request.employee_id,
                "Advisor changed the module set, keeping requested order"
            );
            request.modules
        }
        Err(e) => {
            tracing::debug!(employee_id = %request.employee_id, error = %e, "Learning path not personalized");
            request.modules
        }
    };

    let path = state
        .employees
        .process(CreateLearningPath {
            employee_id: request.employee_id,
            modules,
            title: request.title,
            description: request.description,
        })
        .await?;
    Ok(Json(PathResponse {
        status: "created".to_string(),
        path,
    }))
}

fn same_modules(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

/// `GET /learning-paths/{employee_id}`
pub async fn list_paths(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<PathsResponse>, ApiError> {
    let paths = state
        .employees
        .process(ListLearningPaths { employee_id })
        .await?;
    Ok(Json(PathsResponse { paths }))
}

/// `PUT /learning-paths/{path_id}/progress`
pub async fn update_progress(
    State(state): State<AppState>,
    Path(path_id): Path<String>,
    JsonBody(request): JsonBody<UpdateProgressRequest>,
) -> Result<Json<PathResponse>, ApiError> {
    let path = state
        .employees
        .process(UpdateLearningProgress {
            path_id,
            module_id: request.module_id,
            progress: request.progress,
        })
        .await?;
    Ok(Json(PathResponse {
        status: "updated".to_string(),
        path,
    }))
}
