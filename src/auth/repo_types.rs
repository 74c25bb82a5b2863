use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                           // unique user ID
    pub email: String,                      // lower-cased, unique
    #[serde(skip_serializing)]
    pub password_hash: String,              // Argon2 hash, not exposed in JSON
    pub profile_completed: bool,
    pub terms_accepted: bool,
    pub settings_completed: Option<bool>,   // NULL until the settings step is visited
    pub created_at: OffsetDateTime,
}
