//! Evaluation operations.
//!
//! Create, update and delete each run in one transaction together with the
//! ledger write they imply, so after any sequence of calls a design's
//! contributors are exactly the evaluators whose current evaluation carries
//! modification data.

use sqlx::Row;

use super::ledger;
use super::repository::{
    evaluation_from_row, fetch_evaluation, new_id, timestamp, to_json_column, EvaluationFilter,
    Repository, EVALUATION_COLUMNS, EVALUATION_JOINS,
};
use crate::errors::{AppError, DUPLICATE_EVALUATION};
use crate::models::{
    carries_modifications, CreateEvaluationRequest, Evaluation, EvaluationStatus,
    UpdateEvaluationRequest,
};

impl Repository {
    /// List evaluations matching a filter, newest first.
    pub async fn list_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, AppError> {
        let order = "ORDER BY e.created_at DESC, e.rowid DESC";
        let rows = match filter {
            EvaluationFilter::All => {
                sqlx::query(&format!(
                    "SELECT {EVALUATION_COLUMNS} {EVALUATION_JOINS} {order}"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            EvaluationFilter::Design(design_id) => {
                sqlx::query(&format!(
                    "SELECT {EVALUATION_COLUMNS} {EVALUATION_JOINS} WHERE e.design_id = ? {order}"
                ))
                .bind(design_id)
                .fetch_all(&self.pool)
                .await?
            }
            EvaluationFilter::User(user_id) => {
                sqlx::query(&format!(
                    "SELECT {EVALUATION_COLUMNS} {EVALUATION_JOINS} WHERE e.user_id = ? {order}"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(evaluation_from_row).collect())
    }

    /// Get an evaluation by ID.
    pub async fn get_evaluation(&self, id: &str) -> Result<Option<Evaluation>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_evaluation(&mut *conn, id).await
    }

    /// Record `evaluator_id`'s evaluation of a design.
    ///
    /// Fails with not-found when the design is missing and with a validation
    /// error when the evaluator already evaluated it. When the evaluation
    /// carries modification data a ledger entry of `contribution_weight` is
    /// written in the same transaction.
    pub async fn create_evaluation(
        &self,
        evaluator_id: &str,
        request: &CreateEvaluationRequest,
        contribution_weight: f64,
    ) -> Result<Evaluation, AppError> {
        let mut tx = self.begin_write().await?;

        let design = sqlx::query("SELECT id FROM designs WHERE id = ?")
            .bind(&request.design_id)
            .fetch_optional(&mut *tx)
            .await?;
        if design.is_none() {
            return Err(AppError::NotFound("Design not found".to_string()));
        }

        let existing = sqlx::query("SELECT id FROM evaluations WHERE design_id = ? AND user_id = ?")
            .bind(&request.design_id)
            .bind(evaluator_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AppError::Validation(DUPLICATE_EVALUATION.to_string()));
        }

        let id = new_id();
        let now = timestamp();
        let modifications = to_json_column(request.modifications.as_ref())?;
        let modified_design_data = to_json_column(request.modified_design_data.as_ref())?;

        sqlx::query(
            r#"INSERT INTO evaluations (id, design_id, user_id, rating, comment, modifications,
                   modified_image_url, modified_design_data, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.design_id)
        .bind(evaluator_id)
        .bind(request.rating)
        .bind(&request.comment)
        .bind(&modifications)
        .bind(&request.modified_image_url)
        .bind(&modified_design_data)
        .bind(EvaluationStatus::default().as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let contributed = request.has_modifications();
        if contributed {
            ledger::record_contribution(
                &mut *tx,
                &id,
                &request.design_id,
                evaluator_id,
                contribution_weight,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            evaluation_id = %id,
            design_id = %request.design_id,
            evaluator_id,
            contributed,
            "Created evaluation"
        );

        self.get_evaluation(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Evaluation vanished after insert".to_string()))
    }

    /// Replace the supplied fields of an evaluation.
    ///
    /// The ledger follows the modification data as written: gaining it records
    /// an entry, losing it reverses the entry.
    pub async fn update_evaluation(
        &self,
        id: &str,
        request: &UpdateEvaluationRequest,
        contribution_weight: f64,
    ) -> Result<Evaluation, AppError> {
        let mut tx = self.begin_write().await?;

        let existing = fetch_evaluation(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Evaluation not found".to_string()))?;

        let rating = request.rating.or(existing.rating);
        let comment = request.comment.clone().or(existing.comment.clone());
        let modifications = request
            .modifications
            .clone()
            .or(existing.modifications.clone());
        let modified_image_url = request
            .modified_image_url
            .clone()
            .or(existing.modified_image_url.clone());
        let modified_design_data = request
            .modified_design_data
            .clone()
            .or(existing.modified_design_data.clone());
        let status = request.status.unwrap_or(existing.status);
        let ai_score = request.ai_score.or(existing.ai_score);

        let result = sqlx::query(
            r#"UPDATE evaluations SET
                rating = ?, comment = ?, modifications = ?, modified_image_url = ?,
                modified_design_data = ?, status = ?, ai_score = ?, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(rating)
        .bind(&comment)
        .bind(to_json_column(modifications.as_ref())?)
        .bind(&modified_image_url)
        .bind(to_json_column(modified_design_data.as_ref())?)
        .bind(status.as_str())
        .bind(ai_score)
        .bind(timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Evaluation not found".to_string()));
        }

        let has_modifications = carries_modifications(
            modifications.as_ref(),
            modified_image_url.as_deref(),
            modified_design_data.as_ref(),
        );
        let has_entry = ledger::has_contribution(&mut *tx, id).await?;

        match (has_entry, has_modifications) {
            (false, true) => {
                ledger::record_contribution(
                    &mut *tx,
                    id,
                    &existing.design,
                    &existing.user,
                    contribution_weight,
                )
                .await?;
            }
            (true, false) => {
                ledger::reverse_contribution(&mut *tx, id).await?;
            }
            _ => {}
        }

        let updated = fetch_evaluation(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Evaluation not found".to_string()))?;

        tx.commit().await?;

        tracing::info!(
            evaluation_id = %id,
            contributed = has_modifications,
            "Updated evaluation"
        );

        Ok(updated)
    }

    /// Delete an evaluation and reverse its ledger entry.
    pub async fn delete_evaluation(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;

        let reversed = ledger::reverse_contribution(&mut *tx, id).await?;

        let result = sqlx::query("DELETE FROM evaluations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Evaluation not found".to_string()));
        }

        tx.commit().await?;

        tracing::info!(evaluation_id = %id, contributions = reversed, "Deleted evaluation");
        Ok(())
    }

    /// Id of the evaluation's author, if the evaluation exists.
    pub async fn evaluation_owner(&self, id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT user_id FROM evaluations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("user_id")))
    }
}
