use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{NewProject, Project, ProjectRow};

/// Append-only store of scored projects, the source of truth for "what a
/// user has uploaded".
#[async_trait]
pub trait ProjectRegistry: Send + Sync {
    async fn record_project(&self, project: NewProject) -> anyhow::Result<Project>;
    async fn latest_project(&self, owner: Uuid) -> anyhow::Result<Option<Project>>;
    /// Newest first.
    async fn list_projects(&self, owner: Uuid) -> anyhow::Result<Vec<Project>>;
    async fn find_project(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Project>>;
}

const PROJECT_COLUMNS: &str = "id, seq, user_id, filename, folder, score, categories, created_at";

#[derive(Clone)]
pub struct PgProjectRegistry {
    db: PgPool,
}

impl PgProjectRegistry {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectRegistry for PgProjectRegistry {
    async fn record_project(&self, p: NewProject) -> anyhow::Result<Project> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO projects (id, user_id, filename, folder, score, categories)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(p.user_id)
        .bind(&p.filename)
        .bind(&p.folder)
        .bind(p.score)
        .bind(Json(&p.categories))
        .fetch_one(&self.db)
        .await
        .context("insert project")?;
        Ok(row.into())
    }

    async fn latest_project(&self, owner: Uuid) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS}
              FROM projects
             WHERE user_id = $1
             ORDER BY seq DESC
             LIMIT 1
            "#
        ))
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("latest project")?;
        Ok(row.map(Into::into))
    }

    async fn list_projects(&self, owner: Uuid) -> anyhow::Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS}
              FROM projects
             WHERE user_id = $1
             ORDER BY seq DESC
            "#
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list projects")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_project(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("find project")?;
        Ok(row.map(Into::into))
    }
}

#[cfg(test)]
pub use memory::MemoryProjectRegistry;


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn new_project(owner: Uuid, filename: &str, score: i32) -> NewProject {
        NewProject {
            user_id: owner,
            filename: filename.into(),
            folder: format!("uploads/{owner}/{}", filename.trim_end_matches(".zip")),
            score,
            categories: BTreeMap::from([("Tests".to_string(), 0)]),
        }
    }

    #[tokio::test]
    async fn latest_is_none_without_uploads() {
        let registry = MemoryProjectRegistry::default();
        assert!(registry.latest_project(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_follows_insertion_order_per_owner() {
        let registry = MemoryProjectRegistry::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        registry.record_project(new_project(alice, "one.zip", 10)).await.unwrap();
        let second = registry.record_project(new_project(alice, "two.zip", 20)).await.unwrap();
        registry.record_project(new_project(bob, "bob.zip", 30)).await.unwrap();

        let latest = registry.latest_project(alice).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        let names: Vec<String> = registry
            .list_projects(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.filename)
            .collect();
        assert_eq!(names, vec!["two.zip", "one.zip"]);
    }

    #[tokio::test]
    async fn find_is_scoped_to_owner() {
        let registry = MemoryProjectRegistry::default();
        let alice = Uuid::new_v4();
        let p = registry.record_project(new_project(alice, "a.zip", 1)).await.unwrap();

        assert!(registry.find_project(alice, p.id).await.unwrap().is_some());
        assert!(registry.find_project(Uuid::new_v4(), p.id).await.unwrap().is_none());
    }

    #[test]
    fn folder_name_is_last_component() {
        let owner = Uuid::new_v4();
        let p = Project {
            id: Uuid::new_v4(),
            seq: 1,
            user_id: owner,
            filename: "demo.zip".into(),
            folder: format!("uploads/{owner}/demo"),
            score: 0,
            categories: BTreeMap::new(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        assert_eq!(p.folder_name(), Some("demo"));
    }
}
