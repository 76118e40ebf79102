//! Database repository shared by the per-entity operation modules.
//!
//! Multi-row mutations run inside a single transaction so that an evaluation
//! and its ledger entry are written or removed together. Those transactions
//! take the write lock when they begin, so their reads see no concurrent writer.

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{DesignSummary, Evaluation, EvaluationStatus, UserSummary};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Begin a transaction holding the database write lock.
    ///
    /// A second writer waits out the busy timeout here instead of failing
    /// when it upgrades a read snapshot later on.
    pub(super) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

/// Which designs a listing returns.
#[derive(Debug, Clone)]
pub enum DesignFilter {
    All,
    AiGenerated,
    Creator(String),
}

/// Which evaluations a listing returns.
#[derive(Debug, Clone)]
pub enum EvaluationFilter {
    All,
    Design(String),
    User(String),
}

/// Current time as a sortable RFC 3339 string.
pub(super) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(super) fn to_json_column(value: Option<&serde_json::Value>) -> Result<Option<String>, serde_json::Error> {
    value.map(serde_json::to_string).transpose()
}

pub(super) fn parse_json_value(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or(serde_json::Value::Null)
}

pub(super) fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Columns selected by every evaluation read, with populated evaluator and design.
pub(super) const EVALUATION_COLUMNS: &str = r#"
    e.id, e.design_id, e.user_id, e.rating, e.comment, e.modifications,
    e.modified_image_url, e.modified_design_data, e.status, e.ai_score,
    e.created_at, e.updated_at,
    u.username AS evaluator_username, u.profile_image AS evaluator_profile_image,
    d.name AS design_name, d.image_url AS design_image_url
"#;

pub(super) const EVALUATION_JOINS: &str = r#"
    FROM evaluations e
    JOIN users u ON u.id = e.user_id
    JOIN designs d ON d.id = e.design_id
"#;

/// Load one evaluation on an open connection or transaction.
pub(super) async fn fetch_evaluation(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Evaluation>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {EVALUATION_COLUMNS} {EVALUATION_JOINS} WHERE e.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(evaluation_from_row))
}

pub(super) fn evaluation_from_row(row: &sqlx::sqlite::SqliteRow) -> Evaluation {
    let modifications: Option<String> = row.get("modifications");
    let modified_design_data: Option<String> = row.get("modified_design_data");
    let status: String = row.get("status");
    let design_id: String = row.get("design_id");
    let user_id: String = row.get("user_id");

    Evaluation {
        id: row.get("id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        modifications: modifications.map(|s| parse_json_value(&s)),
        modified_image_url: row.get("modified_image_url"),
        modified_design_data: modified_design_data.map(|s| parse_json_value(&s)),
        status: EvaluationStatus::from_str(&status).unwrap_or_default(),
        ai_score: row.get("ai_score"),
        evaluator: Some(UserSummary {
            id: user_id.clone(),
            username: row.get("evaluator_username"),
            profile_image: row.get("evaluator_profile_image"),
        }),
        design_summary: Some(DesignSummary {
            id: design_id.clone(),
            name: row.get("design_name"),
            image_url: row.get("design_image_url"),
        }),
        design: design_id,
        user: user_id,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
