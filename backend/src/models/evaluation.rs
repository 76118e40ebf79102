//! Evaluation model and its request bodies.

use serde::{Deserialize, Serialize};

use super::{DesignSummary, UserSummary};

/// Inclusive bounds for a star rating.
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Inclusive bounds for an AI score.
pub const AI_SCORE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// Moderation status of an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Pending => "pending",
            EvaluationStatus::Approved => "approved",
            EvaluationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EvaluationStatus::Pending),
            "approved" => Some(EvaluationStatus::Approved),
            "rejected" => Some(EvaluationStatus::Rejected),
            _ => None,
        }
    }
}

/// A user's rating and optional modification of a design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    /// Id of the evaluated design
    pub design: String,
    /// Id of the evaluator
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_design_data: Option<serde_json::Value>,
    pub status: EvaluationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f64>,
    /// Populated evaluator, present in listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<UserSummary>,
    /// Populated design, present in listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_summary: Option<DesignSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl Evaluation {
    /// Whether this evaluation earns its author a contribution entry.
    pub fn has_modifications(&self) -> bool {
        carries_modifications(
            self.modifications.as_ref(),
            self.modified_image_url.as_deref(),
            self.modified_design_data.as_ref(),
        )
    }
}

/// True when any of the three modification fields holds content.
///
/// `null`, `{}`, `[]` and blank strings count as empty.
pub fn carries_modifications(
    modifications: Option<&serde_json::Value>,
    modified_image_url: Option<&str>,
    modified_design_data: Option<&serde_json::Value>,
) -> bool {
    modifications.is_some_and(json_has_content)
        || modified_image_url.is_some_and(|url| !url.trim().is_empty())
        || modified_design_data.is_some_and(json_has_content)
}

fn json_has_content(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Request body for creating a new evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationRequest {
    pub design_id: String,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub modifications: Option<serde_json::Value>,
    #[serde(default)]
    pub modified_image_url: Option<String>,
    #[serde(default)]
    pub modified_design_data: Option<serde_json::Value>,
}

impl CreateEvaluationRequest {
    pub fn has_modifications(&self) -> bool {
        carries_modifications(
            self.modifications.as_ref(),
            self.modified_image_url.as_deref(),
            self.modified_design_data.as_ref(),
        )
    }
}

/// Request body for updating an existing evaluation.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvaluationRequest {
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub modifications: Option<serde_json::Value>,
    #[serde(default)]
    pub modified_image_url: Option<String>,
    #[serde(default)]
    pub modified_design_data: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<EvaluationStatus>,
    #[serde(default)]
    pub ai_score: Option<f64>,
}

/// Check an optional rating against [`RATING_RANGE`].
pub fn validate_rating(rating: Option<i64>) -> Result<(), String> {
    match rating {
        Some(r) if !RATING_RANGE.contains(&r) => {
            Err("Rating must be an integer between 1 and 5".to_string())
        }
        _ => Ok(()),
    }
}

/// Check an optional AI score against [`AI_SCORE_RANGE`].
pub fn validate_ai_score(score: Option<f64>) -> Result<(), String> {
    match score {
        Some(s) if !AI_SCORE_RANGE.contains(&s) => {
            Err("AI score must be between 0 and 100".to_string())
        }
        _ => Ok(()),
    }
}
