//! User account operations.

use sqlx::{Row, SqlitePool};

use super::repository::{new_id, timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    Identity, RegisterRequest, Role, UpdateProfileRequest, User, UserCredentials,
    UserPreferences,
};

const USER_COLUMNS: &str = "id, username, email, profile_image, bio, role, wallet_address, preferences, last_login_at, created_at, updated_at";

impl Repository {
    /// List all users, newest first.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(self.hydrate_user(row).await?);
        }
        Ok(users)
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_user(&row).await?)),
            None => Ok(None),
        }
    }

    /// Resolve a credential subject to the caller's identity.
    pub async fn find_identity(&self, id: &str) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query("SELECT id, username, role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let role: String = row.get("role");
            Identity {
                id: row.get("id"),
                username: row.get("username"),
                role: Role::from_str(&role).unwrap_or_default(),
            }
        }))
    }

    /// Look up login material by (normalized) email.
    pub async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| UserCredentials {
            id: row.get("id"),
            password_hash: row.get("password_hash"),
        }))
    }

    /// Create a new user. `request` must already be validated and normalized.
    pub async fn create_user(
        &self,
        request: &RegisterRequest,
        password_hash: &str,
    ) -> Result<User, AppError> {
        if self
            .identity_taken(&request.username, &request.email, None)
            .await?
        {
            return Err(AppError::Validation("User already exists".to_string()));
        }

        let id = new_id();
        let now = timestamp();
        let preferences = serde_json::to_string(&UserPreferences::default())?;

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, profile_image, bio, role, preferences, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(password_hash)
        .bind(&request.profile_image)
        .bind(&request.bio)
        .bind(Role::default().as_str())
        .bind(&preferences)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(map_account_conflict)?;

        tracing::info!(user_id = %id, username = %request.username, "Registered user");

        self.get_user(&id)
            .await?
            .ok_or_else(|| AppError::Internal("User vanished after insert".to_string()))
    }

    /// Stamp a successful login.
    pub async fn record_login(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update the caller's own profile. `request` must already be normalized.
    pub async fn update_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
        password_hash: Option<&str>,
    ) -> Result<User, AppError> {
        let existing = self
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let username = request.username.as_ref().unwrap_or(&existing.username);
        let email = request.email.as_ref().unwrap_or(&existing.email);
        if (username != &existing.username || email != &existing.email)
            && self.identity_taken(username, email, Some(id)).await?
        {
            return Err(AppError::Validation(
                "Username or email already in use".to_string(),
            ));
        }

        let profile_image = request
            .profile_image
            .clone()
            .or(existing.profile_image.clone());
        let bio = request.bio.clone().or(existing.bio.clone());
        let wallet_address = request
            .wallet_address
            .clone()
            .or(existing.wallet_address.clone());
        let preferences = request
            .preferences
            .clone()
            .unwrap_or(existing.preferences.clone());
        let preferences_json = serde_json::to_string(&preferences)?;
        let now = timestamp();

        sqlx::query(
            "UPDATE users SET username = ?, email = ?, password_hash = COALESCE(?, password_hash), profile_image = ?, bio = ?, wallet_address = ?, preferences = ?, updated_at = ? WHERE id = ?"
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(&profile_image)
        .bind(&bio)
        .bind(&wallet_address)
        .bind(&preferences_json)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_account_conflict)?;

        tracing::info!(user_id = %id, "Updated profile");

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Change a user's role.
    pub async fn set_role(&self, id: &str, role: Role) -> Result<User, AppError> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id = %id, role = role.as_str(), "Changed user role");

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Whether another account already uses this username or email.
    async fn identity_taken(
        &self,
        username: &str,
        email: &str,
        except_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM users WHERE (username = ? OR email = ?) AND id IS NOT ?",
        )
        .bind(username)
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Attach the owned and derived lists to a user row.
    async fn hydrate_user(&self, row: &sqlx::sqlite::SqliteRow) -> Result<User, AppError> {
        let id: String = row.get("id");
        let role: String = row.get("role");
        let preferences: Option<String> = row.get("preferences");

        let designs = id_list(
            &self.pool,
            "SELECT id FROM designs WHERE creator_id = ? ORDER BY created_at, rowid",
            &id,
        )
        .await?;
        let evaluations = id_list(
            &self.pool,
            "SELECT id FROM evaluations WHERE user_id = ? ORDER BY created_at, rowid",
            &id,
        )
        .await?;
        let contributions = self.contributions_for_user(&id).await?;

        Ok(User {
            username: row.get("username"),
            email: row.get("email"),
            profile_image: row.get("profile_image"),
            bio: row.get("bio"),
            role: Role::from_str(&role).unwrap_or_default(),
            designs,
            evaluations,
            contributions,
            wallet_address: row.get("wallet_address"),
            preferences: preferences
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            last_login_at: row.get("last_login_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            id,
        })
    }
}

/// Fetch a single-column list of ids keyed by one parameter.
pub(super) async fn id_list(
    pool: &SqlitePool,
    sql: &str,
    key: &str,
) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query(sql).bind(key).fetch_all(pool).await?;
    Ok(rows.iter().map(|row| row.get("id")).collect())
}

/// Unique-index races on username/email surface as validation errors.
fn map_account_conflict(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Validation("Username or email already in use".to_string());
        }
    }
    AppError::from(err)
}
