//! Request and response shapes of the AI design tools.

use serde::{Deserialize, Serialize};

/// Axis-aligned box around a detected garment, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedObject {
    pub id: u32,
    pub name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub mask: Option<String>,
}

/// An uploaded image handed to object detection.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: axum::body::Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDetectionResult {
    pub objects: Vec<DetectedObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTextureRequest {
    pub object_id: serde_json::Value,
    pub texture_id: serde_json::Value,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTextureResult {
    pub object_id: serde_json::Value,
    pub texture_id: serde_json::Value,
    pub rendered_image_url: String,
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyToModelRequest {
    pub object_id: serde_json::Value,
    pub texture_id: serde_json::Value,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub pose_type: Option<String>,
    #[serde(default)]
    pub view_settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyToModelResult {
    pub object_id: serde_json::Value,
    pub texture_id: serde_json::Value,
    pub model_type: Option<String>,
    pub pose_type: Option<String>,
    pub preview_url: String,
    pub recorded_video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractPatternRequest {
    pub modeled_object_id: serde_json::Value,
    #[serde(default)]
    pub fabric_type: Option<String>,
    #[serde(default)]
    pub pattern_size: Option<String>,
    #[serde(default)]
    pub pattern_detail: Option<String>,
    #[serde(default)]
    pub seams_allowance: Option<serde_json::Value>,
}

/// Physical size of a pattern piece, in centimeters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PieceMeasurements {
    pub width: u32,
    pub height: u32,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternPiece {
    pub id: u32,
    pub name: String,
    pub image_url: String,
    pub measurements: PieceMeasurements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractPatternResult {
    pub object_id: serde_json::Value,
    pub fabric_type: Option<String>,
    pub pattern_size: Option<String>,
    pub pattern_detail: Option<String>,
    pub seams_allowance: Option<serde_json::Value>,
    pub pattern_pieces: Vec<PatternPiece>,
    pub download_url: String,
    pub preview_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDesignFromEvaluationsRequest {
    pub design_id: String,
    #[serde(default)]
    pub evaluations: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignProgress {
    pub design_id: String,
    pub previous_progress: u8,
    pub new_progress: u8,
    pub updated_at: String,
    pub message: String,
}
