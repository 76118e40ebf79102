//! Design model and its request bodies.

use serde::{Deserialize, Serialize};

use super::{Evaluation, UserSummary};

/// Review status of a design. Transitions are made by clients, never automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DesignStatus {
    #[default]
    Draft,
    InReview,
    Completed,
    Archived,
}

impl DesignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignStatus::Draft => "draft",
            DesignStatus::InReview => "in_review",
            DesignStatus::Completed => "completed",
            DesignStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DesignStatus::Draft),
            "in_review" => Some(DesignStatus::InReview),
            "completed" => Some(DesignStatus::Completed),
            "archived" => Some(DesignStatus::Archived),
            _ => None,
        }
    }
}

/// A ledger entry as seen from the design: who contributed and how much.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub user: UserSummary,
    pub contribution_weight: f64,
}

/// A ledger entry as seen from the user: which design and how much.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub design: String,
    pub contribution_weight: f64,
}

/// A clothing design.
///
/// `E` is the shape of the `evaluations` list: ids in listings, full
/// evaluations in the detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design<E = String> {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub design_data: serde_json::Value,
    pub creator: UserSummary,
    pub contributors: Vec<Contributor>,
    pub evaluations: Vec<E>,
    pub status: DesignStatus,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_design: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Design detail view with populated evaluations.
pub type DesignDetail = Design<Evaluation>;

/// The subset of a design embedded in evaluation listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignSummary {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

/// Request body for creating a new design.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDesignRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub design_data: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<DesignStatus>,
    #[serde(default, rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub parent_design: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for updating an existing design.
///
/// Creator, contributors and evaluations cannot be changed through this request.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDesignRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub design_data: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<DesignStatus>,
    #[serde(default, rename = "isAIGenerated")]
    pub is_ai_generated: Option<bool>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}
