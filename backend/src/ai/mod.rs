//! External AI design-tool interface.
//!
//! The backend only forwards requests and relays responses; no inference
//! happens in-process. [`SimulatedAssistant`] stands in for the real service.

mod simulated;

pub use simulated::SimulatedAssistant;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{
    ApplyToModelRequest, ApplyToModelResult, DesignProgress, ExtractPatternRequest,
    ExtractPatternResult, ImageUpload, ObjectDetectionResult, RenderTextureRequest,
    RenderTextureResult, UpdateDesignFromEvaluationsRequest,
};

/// The five AI tools exposed under `/api/ai-tools`.
#[async_trait]
pub trait DesignAssistant: Send + Sync {
    /// Find garments in an uploaded image.
    async fn detect_objects(&self, image: ImageUpload) -> Result<ObjectDetectionResult, AppError>;

    /// Render a texture onto a detected object.
    async fn render_texture(
        &self,
        request: RenderTextureRequest,
    ) -> Result<RenderTextureResult, AppError>;

    /// Dress a 3D model in a textured object.
    async fn apply_to_model(
        &self,
        request: ApplyToModelRequest,
    ) -> Result<ApplyToModelResult, AppError>;

    /// Derive sewing pattern pieces from a modeled object.
    async fn extract_pattern(
        &self,
        request: ExtractPatternRequest,
    ) -> Result<ExtractPatternResult, AppError>;

    /// Fold evaluations back into a design and report progress.
    async fn update_design(
        &self,
        request: UpdateDesignFromEvaluationsRequest,
    ) -> Result<DesignProgress, AppError>;
}
