//! Contribution ledger.
//!
//! Each entry is keyed by the evaluation that earned it, so `Design.contributors`
//! and `User.contributions` are two projections of the same rows and cannot
//! drift apart. Entries are only written by the evaluation operations, always
//! on the caller's open transaction.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::repository::{timestamp, Repository};
use crate::errors::AppError;
use crate::models::{Contribution, Contributor, UserSummary};

/// Append a ledger entry for an evaluation that carries modification data.
pub(super) async fn record_contribution(
    conn: &mut SqliteConnection,
    evaluation_id: &str,
    design_id: &str,
    user_id: &str,
    weight: f64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO contributions (evaluation_id, design_id, user_id, weight, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(evaluation_id)
    .bind(design_id)
    .bind(user_id)
    .bind(weight)
    .bind(timestamp())
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        evaluation_id,
        design_id,
        user_id,
        weight,
        "Recorded contribution"
    );
    Ok(())
}

/// Remove the ledger entry earned by an evaluation, if any.
///
/// Returns the number of entries removed (0 or 1).
pub(super) async fn reverse_contribution(
    conn: &mut SqliteConnection,
    evaluation_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM contributions WHERE evaluation_id = ?")
        .bind(evaluation_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() > 0 {
        tracing::debug!(evaluation_id, "Reversed contribution");
    }
    Ok(result.rows_affected())
}

/// Whether an evaluation currently has a ledger entry.
pub(super) async fn has_contribution(
    conn: &mut SqliteConnection,
    evaluation_id: &str,
) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM contributions WHERE evaluation_id = ?")
        .bind(evaluation_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Remove every ledger entry against a design.
pub(super) async fn reverse_design_contributions(
    conn: &mut SqliteConnection,
    design_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM contributions WHERE design_id = ?")
        .bind(design_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

impl Repository {
    /// Contributors of a design, oldest entry first.
    pub async fn contributors_for_design(
        &self,
        design_id: &str,
    ) -> Result<Vec<Contributor>, AppError> {
        let rows = sqlx::query(
            r#"SELECT c.user_id, c.weight, u.username, u.profile_image
               FROM contributions c
               JOIN users u ON u.id = c.user_id
               WHERE c.design_id = ?
               ORDER BY c.created_at, c.rowid"#,
        )
        .bind(design_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(contributor_from_row).collect())
    }

    /// Contributors of several designs in one query, grouped by design id.
    pub async fn contributors_for_designs(
        &self,
        design_ids: &[String],
    ) -> Result<HashMap<String, Vec<Contributor>>, AppError> {
        let mut grouped: HashMap<String, Vec<Contributor>> = HashMap::new();
        if design_ids.is_empty() {
            return Ok(grouped);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r#"SELECT c.design_id, c.user_id, c.weight, u.username, u.profile_image
               FROM contributions c
               JOIN users u ON u.id = c.user_id
               WHERE c.design_id IN ("#,
        );
        let mut ids = query.separated(", ");
        for id in design_ids {
            ids.push_bind(id);
        }
        query.push(") ORDER BY c.created_at, c.rowid");

        for row in query.build().fetch_all(&self.pool).await? {
            grouped
                .entry(row.get("design_id"))
                .or_default()
                .push(contributor_from_row(&row));
        }
        Ok(grouped)
    }

    /// Contributions made by a user, oldest entry first.
    pub async fn contributions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Contribution>, AppError> {
        let rows = sqlx::query(
            "SELECT design_id, weight FROM contributions WHERE user_id = ? ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Contribution {
                design: row.get("design_id"),
                contribution_weight: row.get("weight"),
            })
            .collect())
    }
}

fn contributor_from_row(row: &sqlx::sqlite::SqliteRow) -> Contributor {
    Contributor {
        user: UserSummary {
            id: row.get("user_id"),
            username: row.get("username"),
            profile_image: row.get("profile_image"),
        },
        contribution_weight: row.get("weight"),
    }
}
