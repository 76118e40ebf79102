//! Design API endpoints.

use axum::extract::{Path, State};

use super::{created, error, listing, required, success, ApiResult, JsonBody};
use crate::auth::{policy, AuthUser};
use crate::db::DesignFilter;
use crate::errors::AppError;
use crate::models::{CreateDesignRequest, Design, DesignDetail, Identity, UpdateDesignRequest};
use crate::AppState;

/// GET /api/designs - List all designs, newest first.
pub async fn list_designs(State(state): State<AppState>) -> ApiResult<Vec<Design>> {
    let expose = state.config.is_development();

    match state.repo.list_designs(&DesignFilter::All).await {
        Ok(designs) => listing(designs),
        Err(e) => error(e, expose),
    }
}

/// GET /api/designs/ai/generated - List AI-generated designs.
pub async fn list_ai_generated_designs(State(state): State<AppState>) -> ApiResult<Vec<Design>> {
    let expose = state.config.is_development();

    match state.repo.list_designs(&DesignFilter::AiGenerated).await {
        Ok(designs) => listing(designs),
        Err(e) => error(e, expose),
    }
}

/// GET /api/designs/user/:userId - List designs created by a user.
pub async fn list_designs_by_creator(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Design>> {
    let expose = state.config.is_development();

    match state.repo.list_designs(&DesignFilter::Creator(user_id)).await {
        Ok(designs) => listing(designs),
        Err(e) => error(e, expose),
    }
}

/// GET /api/designs/:id - Get a design with its evaluations and contributors.
pub async fn get_design(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DesignDetail> {
    let expose = state.config.is_development();

    match state.repo.get_design_detail(&id).await {
        Ok(Some(design)) => success(design),
        Ok(None) => error(AppError::NotFound("Design not found".to_string()), expose),
        Err(e) => error(e, expose),
    }
}

/// POST /api/designs - Create a design owned by the caller.
pub async fn create_design(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(mut request): JsonBody<CreateDesignRequest>,
) -> ApiResult<Design> {
    let expose = state.config.is_development();

    // Validate required fields
    match required(&request.name, "Name") {
        Ok(name) => request.name = name,
        Err(e) => return error(e, expose),
    }
    if let Err(e) = required(&request.description, "Description") {
        return error(e, expose);
    }
    if let Err(e) = required(&request.image_url, "Image URL") {
        return error(e, expose);
    }
    if request.design_data.as_ref().map_or(true, |d| d.is_null()) {
        return error(
            AppError::Validation("Design data is required".to_string()),
            expose,
        );
    }

    match state.repo.create_design(&identity.id, &request).await {
        Ok(design) => created(design),
        Err(e) => error(e, expose),
    }
}

/// PUT /api/designs/:id - Partially update a design.
pub async fn update_design(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateDesignRequest>,
) -> ApiResult<Design> {
    let expose = state.config.is_development();

    if let Err(e) = authorize(&state, &identity, &id, "Not authorized to update this design").await
    {
        return error(e, expose);
    }
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return error(AppError::Validation("Name is required".to_string()), expose);
        }
    }

    match state.repo.update_design(&id, &request).await {
        Ok(design) => success(design),
        Err(e) => error(e, expose),
    }
}

/// DELETE /api/designs/:id - Delete a design and everything hanging off it.
pub async fn delete_design(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let expose = state.config.is_development();

    if let Err(e) = authorize(&state, &identity, &id, "Not authorized to delete this design").await
    {
        return error(e, expose);
    }

    match state.repo.delete_design(&id).await {
        Ok(()) => {
            tracing::info!(design_id = %id, user_id = %identity.id, "Design removed via API");
            success(serde_json::json!({}))
        }
        Err(e) => error(e, expose),
    }
}

async fn authorize(
    state: &AppState,
    identity: &Identity,
    design_id: &str,
    denial: &str,
) -> Result<(), AppError> {
    let owner = state
        .repo
        .design_owner(design_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Design not found".to_string()))?;
    policy::owner_or_admin(identity, &owner).require(denial)
}
