use std::collections::BTreeSet;

use anyhow::Context;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::ReconcileReport,
    repo_types::{NewProject, Project},
};
use crate::{error::AppError, scoring, state::AppState};

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking task failed")?
}

/// Extract, score, record. Nothing is recorded unless the first two succeed.
pub async fn upload_project(
    state: &AppState,
    owner: Uuid,
    declared_filename: &str,
    archive: Bytes,
) -> Result<Project, AppError> {
    state.extractor.check_extension(declared_filename)?;

    let extractor = state.extractor.clone();
    let declared = declared_filename.to_string();
    let (extracted, report) = blocking(move || {
        let extracted = extractor.extract(&archive, owner, &declared)?;
        let report = scoring::score(&extracted.storage_path)?;
        Ok((extracted, report))
    })
    .await?;

    let project = state
        .projects
        .record_project(NewProject {
            user_id: owner,
            filename: extracted.filename,
            folder: extracted.storage_path.display().to_string(),
            score: report.total,
            categories: report.categories,
        })
        .await?;

    info!(
        user_id = %owner,
        project_id = %project.id,
        filename = %project.filename,
        score = project.score,
        "project uploaded"
    );
    Ok(project)
}

pub async fn list_project_folders(state: &AppState, owner: Uuid) -> Result<Vec<String>, AppError> {
    let storage = state.storage.clone();
    blocking(move || Ok(storage.list_project_folders(owner)?)).await
}

pub async fn list_folder_files(
    state: &AppState,
    owner: Uuid,
    folder: String,
) -> Result<Vec<String>, AppError> {
    let storage = state.storage.clone();
    blocking(move || Ok(storage.list_files(owner, &folder)?)).await
}

pub async fn read_project_file(
    state: &AppState,
    owner: Uuid,
    folder: String,
    path: String,
) -> Result<String, AppError> {
    let storage = state.storage.clone();
    blocking(move || Ok(storage.read_text(owner, &folder, &path)?)).await
}

pub async fn reconcile(state: &AppState, owner: Uuid) -> Result<ReconcileReport, AppError> {
    let folders = list_project_folders(state, owner).await?;
    let projects = state.projects.list_projects(owner).await?;
    Ok(compare(&folders, &projects))
}

fn compare(folders: &[String], projects: &[Project]) -> ReconcileReport {
    let on_disk: BTreeSet<&str> = folders.iter().map(String::as_str).collect();
    let recorded: BTreeSet<&str> = projects.iter().filter_map(Project::folder_name).collect();

    ReconcileReport {
        orphaned_folders: on_disk
            .difference(&recorded)
            .map(|s| s.to_string())
            .collect(),
        missing_folders: recorded
            .difference(&on_disk)
            .map(|s| s.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        scoring::Category,
        test_support::{rich_project_entries, zip_bytes, zip_owned},
    };

    #[tokio::test]
    async fn upload_extracts_scores_and_records() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::fake(tmp.path());
        let owner = uuid::Uuid::new_v4();
        let archive = zip_bytes(&[("a.py", b""), ("b.py", b""), ("README.md", b"")]);

        let project = upload_project(&state, owner, "demo.zip", archive.into())
            .await
            .expect("upload");

        assert_eq!(project.filename, "demo.zip");
        assert_eq!(project.score, 45);
        assert_eq!(project.categories[Category::CodeDiversity.label()], 15);
        assert_eq!(project.categories[Category::Documentation.label()], 20);
        assert_eq!(project.categories[Category::FileStructure.label()], 5);
        assert_eq!(project.categories[Category::Tests.label()], 0);
        assert_eq!(project.categories[Category::Complexity.label()], 5);

        let latest = state.projects.latest_project(owner).await.unwrap().unwrap();
        assert_eq!(latest.id, project.id);
        assert_eq!(list_project_folders(&state, owner).await.unwrap(), vec!["demo"]);
    }

    #[tokio::test]
    async fn rich_project_scores_85() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::fake(tmp.path());
        let archive = zip_owned(&rich_project_entries());

        let project = upload_project(&state, uuid::Uuid::new_v4(), "rich.zip", archive.into())
            .await
            .unwrap();

        assert_eq!(project.score, 85);
        assert_eq!(project.categories.len(), 5);
        assert_eq!(project.categories[Category::FileStructure.label()], 15);
        assert_eq!(project.categories[Category::Complexity.label()], 10);
    }

    #[tokio::test]
    async fn reupload_appends_records_but_keeps_one_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::fake(tmp.path());
        let owner = uuid::Uuid::new_v4();

        let first = upload_project(&state, owner, "proj.zip", zip_bytes(&[("v1.py", b"1")]).into())
            .await
            .unwrap();
        let second = upload_project(
            &state,
            owner,
            "proj.zip",
            zip_bytes(&[("v2.py", b"2"), ("v2_test.py", b"")]).into(),
        )
        .await
        .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.folder, second.folder);
        assert_eq!(state.projects.list_projects(owner).await.unwrap().len(), 2);
        assert_eq!(list_project_folders(&state, owner).await.unwrap(), vec!["proj"]);
        assert_eq!(
            list_folder_files(&state, owner, "proj".into()).await.unwrap(),
            vec!["v2.py", "v2_test.py"]
        );
        assert!(!std::path::Path::new(&second.folder).join("v1.py").exists());
    }

    #[tokio::test]
    async fn failed_extraction_records_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::fake(tmp.path());
        let owner = uuid::Uuid::new_v4();
        let archive = zip_bytes(&[("../../evil.sh", b"boom")]);

        let err = upload_project(&state, owner, "evil.zip", archive.into())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Extract(crate::archive::ExtractError::Archive(_))));
        assert!(state.projects.latest_project(owner).await.unwrap().is_none());
        assert!(!tmp.path().join("evil.sh").exists());
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected_up_front() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::fake(tmp.path());
        let owner = uuid::Uuid::new_v4();

        let err = upload_project(&state, owner, "project.rar", Bytes::from_static(b"Rar!"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Extract(crate::archive::ExtractError::UnsupportedFileType(_))
        ));
        assert!(!tmp.path().join(owner.to_string()).exists());
    }

    #[tokio::test]
    async fn reconcile_reports_both_directions() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::fake(tmp.path());
        let owner = uuid::Uuid::new_v4();

        let kept = upload_project(&state, owner, "kept.zip", zip_bytes(&[("a.py", b"")]).into())
            .await
            .unwrap();
        let gone = upload_project(&state, owner, "gone.zip", zip_bytes(&[("b.py", b"")]).into())
            .await
            .unwrap();
        fs::remove_dir_all(&gone.folder).unwrap();
        fs::create_dir_all(state.storage.owner_dir(owner).join("manual")).unwrap();

        let report = reconcile(&state, owner).await.unwrap();
        assert_eq!(report.orphaned_folders, vec!["manual"]);
        assert_eq!(report.missing_folders, vec!["gone"]);
        assert!(std::path::Path::new(&kept.folder).exists());
    }

    #[test]
    fn compare_dedups_repeated_uploads() {
        let owner = uuid::Uuid::new_v4();
        let project = |folder: &str| Project {
            id: uuid::Uuid::new_v4(),
            seq: 0,
            user_id: owner,
            filename: format!("{folder}.zip"),
            folder: format!("/srv/uploads/{owner}/{folder}"),
            score: 0,
            categories: Default::default(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let report = compare(
            &["a".to_string()],
            &[project("a"), project("a"), project("b")],
        );
        assert_eq!(
            report,
            ReconcileReport {
                orphaned_folders: vec![],
                missing_folders: vec!["b".into()],
            }
        );
    }
}
