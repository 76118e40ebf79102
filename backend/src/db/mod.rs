//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for users, designs, evaluations and the
//! contribution ledger.

mod designs;
mod evaluations;
mod ledger;
mod repository;
mod users;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            profile_image TEXT,
            bio TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            wallet_address TEXT,
            preferences TEXT,
            last_login_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS designs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            image_url TEXT NOT NULL,
            thumbnail_url TEXT,
            design_data TEXT NOT NULL,
            creator_id TEXT NOT NULL REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'draft',
            is_ai_generated INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1,
            parent_design_id TEXT REFERENCES designs(id) ON DELETE SET NULL,
            tags TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // One evaluation per (design, user); the unique index settles concurrent creates.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evaluations (
            id TEXT PRIMARY KEY,
            design_id TEXT NOT NULL REFERENCES designs(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            rating INTEGER CHECK (rating BETWEEN 1 AND 5),
            comment TEXT,
            modifications TEXT,
            modified_image_url TEXT,
            modified_design_data TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            ai_score REAL CHECK (ai_score BETWEEN 0 AND 100),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (design_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Contribution ledger: at most one entry per evaluation.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contributions (
            evaluation_id TEXT PRIMARY KEY REFERENCES evaluations(id),
            design_id TEXT NOT NULL REFERENCES designs(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            weight REAL NOT NULL CHECK (weight >= 0 AND weight <= 1),
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_designs_creator ON designs(creator_id);
        CREATE INDEX IF NOT EXISTS idx_designs_created_at ON designs(created_at);
        CREATE INDEX IF NOT EXISTS idx_designs_ai ON designs(is_ai_generated);
        CREATE INDEX IF NOT EXISTS idx_evaluations_user ON evaluations(user_id);
        CREATE INDEX IF NOT EXISTS idx_evaluations_created_at ON evaluations(created_at);
        CREATE INDEX IF NOT EXISTS idx_contributions_design ON contributions(design_id);
        CREATE INDEX IF NOT EXISTS idx_contributions_user ON contributions(user_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
