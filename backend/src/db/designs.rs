//! Design operations, including the delete cascade.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Row, Sqlite};

use super::ledger;
use super::repository::{
    new_id, parse_json_array, parse_json_value, timestamp, DesignFilter, EvaluationFilter,
    Repository,
};
use super::users::id_list;
use crate::errors::AppError;
use crate::models::{
    Contributor, CreateDesignRequest, Design, DesignDetail, DesignStatus, UpdateDesignRequest,
    UserSummary,
};

const DESIGN_SELECT: &str = r#"
    SELECT d.id, d.name, d.description, d.image_url, d.thumbnail_url, d.design_data,
           d.creator_id, d.status, d.is_ai_generated, d.version, d.parent_design_id,
           d.tags, d.created_at, d.updated_at,
           u.username AS creator_username, u.profile_image AS creator_profile_image
    FROM designs d
    JOIN users u ON u.id = d.creator_id
"#;

impl Repository {
    /// List designs matching a filter, newest first.
    pub async fn list_designs(&self, filter: &DesignFilter) -> Result<Vec<Design>, AppError> {
        let order = "ORDER BY d.created_at DESC, d.rowid DESC";
        let rows = match filter {
            DesignFilter::All => {
                sqlx::query(&format!("{DESIGN_SELECT} {order}"))
                    .fetch_all(&self.pool)
                    .await?
            }
            DesignFilter::AiGenerated => {
                sqlx::query(&format!(
                    "{DESIGN_SELECT} WHERE d.is_ai_generated = 1 {order}"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            DesignFilter::Creator(creator_id) => {
                sqlx::query(&format!("{DESIGN_SELECT} WHERE d.creator_id = ? {order}"))
                    .bind(creator_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let ids: Vec<String> = rows.iter().map(|row| row.get("id")).collect();
        let mut contributors = self.contributors_for_designs(&ids).await?;
        let mut evaluations = self.evaluation_ids_for_designs(&ids).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                design_from_row(
                    row,
                    contributors.remove(&id).unwrap_or_default(),
                    evaluations.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    /// Get a design by ID.
    pub async fn get_design(&self, id: &str) -> Result<Option<Design>, AppError> {
        let row = sqlx::query(&format!("{DESIGN_SELECT} WHERE d.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let contributors = self.contributors_for_design(id).await?;
        let evaluations = id_list(
            &self.pool,
            "SELECT id FROM evaluations WHERE design_id = ? ORDER BY created_at, rowid",
            id,
        )
        .await?;

        Ok(Some(design_from_row(&row, contributors, evaluations)))
    }

    /// Get a design with its evaluations populated.
    pub async fn get_design_detail(&self, id: &str) -> Result<Option<DesignDetail>, AppError> {
        let Some(design) = self.get_design(id).await? else {
            return Ok(None);
        };
        let evaluations = self
            .list_evaluations(&EvaluationFilter::Design(id.to_string()))
            .await?;

        Ok(Some(DesignDetail {
            id: design.id,
            name: design.name,
            description: design.description,
            image_url: design.image_url,
            thumbnail_url: design.thumbnail_url,
            design_data: design.design_data,
            creator: design.creator,
            contributors: design.contributors,
            evaluations,
            status: design.status,
            is_ai_generated: design.is_ai_generated,
            version: design.version,
            parent_design: design.parent_design,
            tags: design.tags,
            created_at: design.created_at,
            updated_at: design.updated_at,
        }))
    }

    /// Id of the design's creator, if the design exists.
    pub async fn design_owner(&self, id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT creator_id FROM designs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("creator_id")))
    }

    /// Create a new design owned by `creator_id`.
    pub async fn create_design(
        &self,
        creator_id: &str,
        request: &CreateDesignRequest,
    ) -> Result<Design, AppError> {
        let mut tx = self.begin_write().await?;

        if let Some(parent_id) = &request.parent_design {
            let parent = sqlx::query("SELECT id FROM designs WHERE id = ?")
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await?;
            if parent.is_none() {
                return Err(AppError::Validation(format!(
                    "Parent design {} not found",
                    parent_id
                )));
            }
        }

        let id = new_id();
        let now = timestamp();
        let design_data = serde_json::to_string(
            request
                .design_data
                .as_ref()
                .unwrap_or(&serde_json::Value::Null),
        )?;
        let tags_json = serde_json::to_string(&request.tags)?;
        let status = request.status.unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO designs (id, name, description, image_url, thumbnail_url, design_data,
                   creator_id, status, is_ai_generated, version, parent_design_id, tags,
                   created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.image_url)
        .bind(&request.thumbnail_url)
        .bind(&design_data)
        .bind(creator_id)
        .bind(status.as_str())
        .bind(request.is_ai_generated as i32)
        .bind(request.version.unwrap_or(1))
        .bind(&request.parent_design)
        .bind(&tags_json)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(design_id = %id, creator_id, "Created design");

        self.get_design(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Design vanished after insert".to_string()))
    }

    /// Replace the supplied fields of a design.
    pub async fn update_design(
        &self,
        id: &str,
        request: &UpdateDesignRequest,
    ) -> Result<Design, AppError> {
        let existing = self
            .get_design(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Design not found".to_string()))?;

        let name = request.name.as_ref().unwrap_or(&existing.name);
        let description = request
            .description
            .as_ref()
            .unwrap_or(&existing.description);
        let image_url = request.image_url.as_ref().unwrap_or(&existing.image_url);
        let thumbnail_url = request
            .thumbnail_url
            .clone()
            .or(existing.thumbnail_url.clone());
        let design_data = request
            .design_data
            .as_ref()
            .unwrap_or(&existing.design_data);
        let status = request.status.unwrap_or(existing.status);
        let is_ai_generated = request.is_ai_generated.unwrap_or(existing.is_ai_generated);
        let version = request.version.unwrap_or(existing.version);
        let tags = request.tags.as_ref().unwrap_or(&existing.tags);

        let design_json = serde_json::to_string(design_data)?;
        let tags_json = serde_json::to_string(tags)?;
        let now = timestamp();

        sqlx::query(
            r#"UPDATE designs SET
                name = ?, description = ?, image_url = ?, thumbnail_url = ?, design_data = ?,
                status = ?, is_ai_generated = ?, version = ?, tags = ?, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(name)
        .bind(description)
        .bind(image_url)
        .bind(&thumbnail_url)
        .bind(&design_json)
        .bind(status.as_str())
        .bind(is_ai_generated as i32)
        .bind(version)
        .bind(&tags_json)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        tracing::info!(design_id = %id, "Updated design");

        self.get_design(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Design not found".to_string()))
    }

    /// Delete a design together with its evaluations and ledger entries.
    pub async fn delete_design(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;

        let reversed = ledger::reverse_design_contributions(&mut *tx, id).await?;

        let evaluations = sqlx::query("DELETE FROM evaluations WHERE design_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM designs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Design not found".to_string()));
        }

        tx.commit().await?;

        tracing::info!(
            design_id = %id,
            evaluations = evaluations.rows_affected(),
            contributions = reversed,
            "Deleted design"
        );
        Ok(())
    }

    /// Evaluation ids of several designs in one query, grouped by design id.
    async fn evaluation_ids_for_designs(
        &self,
        design_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, AppError> {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        if design_ids.is_empty() {
            return Ok(grouped);
        }

        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT id, design_id FROM evaluations WHERE design_id IN (");
        let mut ids = query.separated(", ");
        for id in design_ids {
            ids.push_bind(id);
        }
        query.push(") ORDER BY created_at, rowid");

        for row in query.build().fetch_all(&self.pool).await? {
            grouped
                .entry(row.get("design_id"))
                .or_default()
                .push(row.get("id"));
        }
        Ok(grouped)
    }
}

fn design_from_row(
    row: &sqlx::sqlite::SqliteRow,
    contributors: Vec<Contributor>,
    evaluations: Vec<String>,
) -> Design {
    let id: String = row.get("id");
    let design_data: String = row.get("design_data");
    let status: String = row.get("status");
    let is_ai_generated: i32 = row.get("is_ai_generated");
    let tags: Option<String> = row.get("tags");

    Design {
        name: row.get("name"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        thumbnail_url: row.get("thumbnail_url"),
        design_data: parse_json_value(&design_data),
        creator: UserSummary {
            id: row.get("creator_id"),
            username: row.get("creator_username"),
            profile_image: row.get("creator_profile_image"),
        },
        contributors,
        evaluations,
        status: DesignStatus::from_str(&status).unwrap_or_default(),
        is_ai_generated: is_ai_generated != 0,
        version: row.get("version"),
        parent_design: row.get("parent_design_id"),
        tags: tags.map(|s| parse_json_array(&s)).unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        id,
    }
}
