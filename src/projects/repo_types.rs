use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// A scored upload. Records are append-only; `seq` orders them by insertion.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Project {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub seq: i64,
    pub user_id: Uuid,
    pub filename: String,
    pub folder: String,
    pub score: i32,
    pub categories: BTreeMap<String, i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Project {
    /// Last component of the storage path, as shown by the folder listing.
    pub fn folder_name(&self) -> Option<&str> {
        std::path::Path::new(&self.folder)
            .file_name()
            .and_then(|n| n.to_str())
    }
}

/// Everything needed to record a project once extraction and scoring passed.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: Uuid,
    pub filename: String,
    pub folder: String,
    pub score: i32,
    pub categories: BTreeMap<String, i32>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ProjectRow {
    pub id: Uuid,
    pub seq: i64,
    pub user_id: Uuid,
    pub filename: String,
    pub folder: String,
    pub score: i32,
    pub categories: Json<BTreeMap<String, i32>>,
    pub created_at: OffsetDateTime,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Self {
            id: r.id,
            seq: r.seq,
            user_id: r.user_id,
            filename: r.filename,
            folder: r.folder,
            score: r.score,
            categories: r.categories.0,
            created_at: r.created_at,
        }
    }
}
