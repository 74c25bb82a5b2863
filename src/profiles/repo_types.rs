use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Profile row; one per user, created lazily by the first upsert.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Profile {
    pub const DEFAULT_DISPLAY_NAME: &'static str = "User";

    pub fn display_name(profile: Option<&Profile>) -> String {
        profile
            .and_then(|p| p.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(Self::DEFAULT_DISPLAY_NAME)
            .to_string()
    }
}
