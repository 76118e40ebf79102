//! Canned AI responses behind fixed artificial delays.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;

use super::DesignAssistant;
use crate::errors::AppError;
use crate::models::{
    ApplyToModelRequest, ApplyToModelResult, BoundingBox, DesignProgress, DetectedObject,
    ExtractPatternRequest, ExtractPatternResult, ImageUpload, ObjectDetectionResult,
    PatternPiece, PieceMeasurements, RenderTextureRequest, RenderTextureResult,
    UpdateDesignFromEvaluationsRequest,
};

const DETECT_DELAY: Duration = Duration::from_secs(2);
const RENDER_DELAY: Duration = Duration::from_secs(2);
const MODEL_DELAY: Duration = Duration::from_secs(3);
const PATTERN_DELAY: Duration = Duration::from_secs(4);
const UPDATE_DELAY: Duration = Duration::from_secs(3);

/// Progress gained per update-design call, in percent.
const PROGRESS_STEP: u8 = 15;

/// Stand-in for the AI service.
pub struct SimulatedAssistant {
    latency_factor: f64,
}

impl SimulatedAssistant {
    /// `latency_factor` scales every delay; 0 answers immediately.
    pub fn new(latency_factor: f64) -> Self {
        Self {
            latency_factor: latency_factor.max(0.0),
        }
    }

    async fn simulate(&self, base: Duration) {
        let delay = scaled_delay(base, self.latency_factor);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Scale a delay, saturating instead of overflowing.
fn scaled_delay(base: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(if factor > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

fn label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DesignAssistant for SimulatedAssistant {
    async fn detect_objects(&self, image: ImageUpload) -> Result<ObjectDetectionResult, AppError> {
        tracing::debug!(
            file_name = image.file_name.as_deref().unwrap_or("-"),
            content_type = image.content_type.as_deref().unwrap_or("-"),
            bytes = image.bytes.len(),
            "Simulating object detection"
        );
        self.simulate(DETECT_DELAY).await;

        Ok(ObjectDetectionResult {
            objects: vec![
                DetectedObject {
                    id: 1,
                    name: "top".to_string(),
                    confidence: 0.95,
                    bbox: BoundingBox {
                        x: 100,
                        y: 50,
                        width: 200,
                        height: 300,
                    },
                    mask: None,
                },
                DetectedObject {
                    id: 2,
                    name: "bottom".to_string(),
                    confidence: 0.91,
                    bbox: BoundingBox {
                        x: 120,
                        y: 380,
                        width: 180,
                        height: 250,
                    },
                    mask: None,
                },
            ],
        })
    }

    async fn render_texture(
        &self,
        request: RenderTextureRequest,
    ) -> Result<RenderTextureResult, AppError> {
        self.simulate(RENDER_DELAY).await;

        Ok(RenderTextureResult {
            rendered_image_url: format!(
                "https://source.unsplash.com/random/400x400/?texture,{}",
                label(&request.texture_id)
            ),
            object_id: request.object_id,
            texture_id: request.texture_id,
            settings: request.settings,
        })
    }

    async fn apply_to_model(
        &self,
        request: ApplyToModelRequest,
    ) -> Result<ApplyToModelResult, AppError> {
        self.simulate(MODEL_DELAY).await;

        let model = request.model_type.as_deref().unwrap_or("default");
        Ok(ApplyToModelResult {
            preview_url: format!(
                "https://source.unsplash.com/random/400x600/?fashion,model,{}",
                model
            ),
            recorded_video_url: None,
            object_id: request.object_id,
            texture_id: request.texture_id,
            model_type: request.model_type,
            pose_type: request.pose_type,
        })
    }

    async fn extract_pattern(
        &self,
        request: ExtractPatternRequest,
    ) -> Result<ExtractPatternResult, AppError> {
        self.simulate(PATTERN_DELAY).await;

        Ok(ExtractPatternResult {
            object_id: request.modeled_object_id,
            fabric_type: request.fabric_type,
            pattern_size: request.pattern_size,
            pattern_detail: request.pattern_detail,
            seams_allowance: request.seams_allowance,
            pattern_pieces: vec![
                PatternPiece {
                    id: 1,
                    name: "Front panel".to_string(),
                    image_url: "https://source.unsplash.com/random/300x300/?pattern,sewing"
                        .to_string(),
                    measurements: PieceMeasurements {
                        width: 60,
                        height: 75,
                        notes: "Mind the shoulder seam".to_string(),
                    },
                },
                PatternPiece {
                    id: 2,
                    name: "Back panel".to_string(),
                    image_url: "https://source.unsplash.com/random/300x300/?pattern,fabric"
                        .to_string(),
                    measurements: PieceMeasurements {
                        width: 62,
                        height: 78,
                        notes: "Add ease across the back".to_string(),
                    },
                },
            ],
            download_url: "https://example.com/pattern-download.pdf".to_string(),
            preview_url: "https://source.unsplash.com/random/800x600/?sewing,pattern".to_string(),
        })
    }

    async fn update_design(
        &self,
        request: UpdateDesignFromEvaluationsRequest,
    ) -> Result<DesignProgress, AppError> {
        let previous_progress: u8 = rand::thread_rng().gen_range(0..85);
        self.simulate(UPDATE_DELAY).await;

        Ok(DesignProgress {
            design_id: request.design_id,
            previous_progress,
            new_progress: next_progress(previous_progress),
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message: "Evaluations were applied to the design.".to_string(),
        })
    }
}

fn next_progress(previous: u8) -> u8 {
    previous.saturating_add(PROGRESS_STEP).min(100)
}
