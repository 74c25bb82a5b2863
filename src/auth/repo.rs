use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::repo_types::User;

const USER_COLUMNS: &str =
    "id, email, password_hash, profile_completed, terms_accepted, settings_completed, created_at";

impl User {
    /// Find a user by (already lower-cased) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. Onboarding flags start false.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn mark_profile_completed<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET profile_completed = TRUE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn accept_terms(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET terms_accepted = TRUE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn mark_settings_completed(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET settings_completed = TRUE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
