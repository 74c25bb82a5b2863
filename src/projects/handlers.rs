use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{FileContent, FileList, FolderList, ReconcileReport},
    repo_types::Project,
    services,
};
use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/latest", get(latest_project))
        .route("/projects/reconcile", get(reconcile))
        .route("/projects/folders", get(list_folders))
        .route("/projects/folders/:folder", get(list_folder_files))
        .route("/projects/folders/:folder/file/*path", get(read_file))
        .route("/projects/:id", get(get_project))
}

pub fn write_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/projects", post(upload_project))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// POST /projects (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn upload_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload.filter(|(name, _)| !name.is_empty()) else {
        warn!(%user_id, "upload without file");
        return Err(AppError::BadRequest("No file selected".into()));
    };

    let project = services::upload_project(&state, user_id, &filename, data).await?;
    let location = format!("/api/v1/projects/{}", project.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(project),
    ))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.projects.list_projects(user_id).await?))
}

#[instrument(skip(state))]
pub async fn latest_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Option<Project>>, AppError> {
    Ok(Json(state.projects.latest_project(user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    state
        .projects
        .find_project(user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Project".into()))
}

#[instrument(skip(state))]
pub async fn reconcile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ReconcileReport>, AppError> {
    Ok(Json(services::reconcile(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn list_folders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<FolderList>, AppError> {
    let folders = services::list_project_folders(&state, user_id).await?;
    Ok(Json(FolderList { folders }))
}

#[instrument(skip(state))]
pub async fn list_folder_files(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(folder): Path<String>,
) -> Result<Json<FileList>, AppError> {
    let files = services::list_folder_files(&state, user_id, folder.clone()).await?;
    Ok(Json(FileList { folder, files }))
}

#[instrument(skip(state))]
pub async fn read_file(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((folder, path)): Path<(String, String)>,
) -> Result<Json<FileContent>, AppError> {
    let content =
        services::read_project_file(&state, user_id, folder.clone(), path.clone()).await?;
    Ok(Json(FileContent {
        folder,
        path,
        content,
    }))
}
