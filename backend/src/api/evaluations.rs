//! Evaluation API endpoints.

use axum::extract::{Path, State};

use super::{created, error, listing, success, ApiResult, JsonBody};
use crate::auth::{policy, AuthUser};
use crate::db::EvaluationFilter;
use crate::errors::AppError;
use crate::models::{
    validate_ai_score, validate_rating, CreateEvaluationRequest, Evaluation, Identity,
    UpdateEvaluationRequest,
};
use crate::AppState;

async fn list_filtered(state: AppState, filter: EvaluationFilter) -> ApiResult<Vec<Evaluation>> {
    let expose = state.config.is_development();

    match state.repo.list_evaluations(&filter).await {
        Ok(evaluations) => listing(evaluations),
        Err(e) => error(e, expose),
    }
}

/// GET /api/evaluations - List all evaluations, newest first.
pub async fn list_evaluations(State(state): State<AppState>) -> ApiResult<Vec<Evaluation>> {
    list_filtered(state, EvaluationFilter::All).await
}

/// GET /api/evaluations/design/:designId - List evaluations of a design.
pub async fn list_evaluations_by_design(
    State(state): State<AppState>,
    Path(design_id): Path<String>,
) -> ApiResult<Vec<Evaluation>> {
    list_filtered(state, EvaluationFilter::Design(design_id)).await
}

/// GET /api/evaluations/user/:userId - List evaluations written by a user.
pub async fn list_evaluations_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Evaluation>> {
    list_filtered(state, EvaluationFilter::User(user_id)).await
}

/// GET /api/evaluations/:id - Get a single evaluation.
pub async fn get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Evaluation> {
    let expose = state.config.is_development();

    match state.repo.get_evaluation(&id).await {
        Ok(Some(evaluation)) => success(evaluation),
        Ok(None) => error(
            AppError::NotFound("Evaluation not found".to_string()),
            expose,
        ),
        Err(e) => error(e, expose),
    }
}

/// POST /api/evaluations - Evaluate a design.
///
/// Evaluations that carry modification data also credit the caller in the
/// contribution ledger.
pub async fn create_evaluation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<CreateEvaluationRequest>,
) -> ApiResult<Evaluation> {
    let expose = state.config.is_development();

    if request.design_id.trim().is_empty() {
        return error(
            AppError::Validation("Design ID is required".to_string()),
            expose,
        );
    }
    if let Err(msg) = validate_rating(request.rating) {
        return error(AppError::Validation(msg), expose);
    }

    match state
        .repo
        .create_evaluation(&identity.id, &request, state.config.contribution_weight)
        .await
    {
        Ok(evaluation) => created(evaluation),
        Err(e) => error(e, expose),
    }
}

/// PUT /api/evaluations/:id - Partially update an evaluation.
pub async fn update_evaluation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateEvaluationRequest>,
) -> ApiResult<Evaluation> {
    let expose = state.config.is_development();

    if let Err(e) = authorize(
        &state,
        &identity,
        &id,
        "Not authorized to update this evaluation",
    )
    .await
    {
        return error(e, expose);
    }
    if let Err(msg) = validate_rating(request.rating).and(validate_ai_score(request.ai_score)) {
        return error(AppError::Validation(msg), expose);
    }

    match state
        .repo
        .update_evaluation(&id, &request, state.config.contribution_weight)
        .await
    {
        Ok(evaluation) => success(evaluation),
        Err(e) => error(e, expose),
    }
}

/// DELETE /api/evaluations/:id - Delete an evaluation and reverse its credit.
pub async fn delete_evaluation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let expose = state.config.is_development();

    if let Err(e) = authorize(
        &state,
        &identity,
        &id,
        "Not authorized to delete this evaluation",
    )
    .await
    {
        return error(e, expose);
    }

    match state.repo.delete_evaluation(&id).await {
        Ok(()) => success(serde_json::json!({})),
        Err(e) => error(e, expose),
    }
}

async fn authorize(
    state: &AppState,
    identity: &Identity,
    evaluation_id: &str,
    denial: &str,
) -> Result<(), AppError> {
    let owner = state
        .repo
        .evaluation_owner(evaluation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Evaluation not found".to_string()))?;
    policy::owner_or_admin(identity, &owner).require(denial)
}
