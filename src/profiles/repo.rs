use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::repo_types::Profile;

impl Profile {
    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, name, age, bio, updated_at
              FROM profiles
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(profile)
    }

    /// Insert or replace name, age and bio.
    pub async fn upsert<'e, E: PgExecutor<'e>>(
        db: E,
        user_id: Uuid,
        name: &str,
        age: Option<i32>,
        bio: &str,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, name, age, bio)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
               SET name = EXCLUDED.name,
                   age = EXCLUDED.age,
                   bio = EXCLUDED.bio,
                   updated_at = now()
            RETURNING user_id, name, age, bio, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(age)
        .bind(bio)
        .fetch_one(db)
        .await?;
        Ok(profile)
    }

    /// Insert or update only name and bio; age is left alone.
    pub async fn upsert_display(
        db: &PgPool,
        user_id: Uuid,
        name: &str,
        bio: &str,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, name, bio)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
               SET name = EXCLUDED.name,
                   bio = EXCLUDED.bio,
                   updated_at = now()
            RETURNING user_id, name, age, bio, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(bio)
        .fetch_one(db)
        .await?;
        Ok(profile)
    }
}
