//! AI design-tool endpoints. Each call is relayed to the configured
//! [`DesignAssistant`](crate::ai::DesignAssistant).

use axum::extract::{Multipart, State};

use super::{error, success, ApiResult, JsonBody};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    ApplyToModelRequest, ApplyToModelResult, DesignProgress, ExtractPatternRequest,
    ExtractPatternResult, ImageUpload, ObjectDetectionResult, RenderTextureRequest,
    RenderTextureResult, UpdateDesignFromEvaluationsRequest,
};
use crate::AppState;

/// Multipart field carrying the image for object detection.
const IMAGE_FIELD: &str = "image";

async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read field: {}", e)))?;

            if bytes.is_empty() {
                break;
            }
            return Ok(ImageUpload {
                file_name,
                content_type,
                bytes,
            });
        }
    }

    Err(AppError::Validation("Image file is required".to_string()))
}

/// POST /api/ai-tools/detect-objects - Find garments in an uploaded image.
pub async fn detect_objects(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    multipart: Multipart,
) -> ApiResult<ObjectDetectionResult> {
    let expose = state.config.is_development();

    let image = match read_image(multipart).await {
        Ok(image) => image,
        Err(e) => return error(e, expose),
    };
    tracing::info!(user_id = %identity.id, bytes = image.bytes.len(), "Object detection requested");

    match state.ai.detect_objects(image).await {
        Ok(result) => success(result),
        Err(e) => error(e, expose),
    }
}

/// POST /api/ai-tools/render-texture - Render a texture onto an object.
pub async fn render_texture(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    JsonBody(request): JsonBody<RenderTextureRequest>,
) -> ApiResult<RenderTextureResult> {
    let expose = state.config.is_development();

    match state.ai.render_texture(request).await {
        Ok(result) => success(result),
        Err(e) => error(e, expose),
    }
}

/// POST /api/ai-tools/apply-to-model - Dress a 3D model.
pub async fn apply_to_model(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    JsonBody(request): JsonBody<ApplyToModelRequest>,
) -> ApiResult<ApplyToModelResult> {
    let expose = state.config.is_development();

    match state.ai.apply_to_model(request).await {
        Ok(result) => success(result),
        Err(e) => error(e, expose),
    }
}

/// POST /api/ai-tools/extract-pattern - Derive sewing pattern pieces.
pub async fn extract_pattern(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    JsonBody(request): JsonBody<ExtractPatternRequest>,
) -> ApiResult<ExtractPatternResult> {
    let expose = state.config.is_development();

    match state.ai.extract_pattern(request).await {
        Ok(result) => success(result),
        Err(e) => error(e, expose),
    }
}

/// POST /api/ai-tools/update-design - Apply evaluations to a stored design.
pub async fn update_design_from_evaluations(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<UpdateDesignFromEvaluationsRequest>,
) -> ApiResult<DesignProgress> {
    let expose = state.config.is_development();

    match state.repo.design_owner(&request.design_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error(AppError::NotFound("Design not found".to_string()), expose),
        Err(e) => return error(e, expose),
    }
    tracing::info!(user_id = %identity.id, design_id = %request.design_id, "Design update requested");

    match state.ai.update_design(request).await {
        Ok(progress) => success(progress),
        Err(e) => error(e, expose),
    }
}
