use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{HomeView, SettingsView};
use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser, repo_types::User},
    error::AppError,
    profiles::repo_types::Profile,
    state::AppState,
};

pub fn onboarding_routes() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/terms", post(accept_terms))
        .route("/settings", get(get_settings).post(complete_settings))
}

async fn load_user(state: &AppState, user_id: uuid::Uuid) -> Result<User, AppError> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

#[instrument(skip(state))]
pub async fn home(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<HomeView>, AppError> {
    let user = load_user(&state, user_id).await?;
    let profile = Profile::find_by_user(&state.db, user_id).await?;
    let last_project = state.projects.latest_project(user_id).await?;
    Ok(Json(HomeView::for_user(&user, profile.as_ref(), last_project)))
}

#[instrument(skip(state))]
pub async fn accept_terms(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    User::accept_terms(&state.db, user_id).await?;
    info!(%user_id, "terms accepted");
    Ok(Json(MessageResponse::new("Terms accepted")))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SettingsView>, AppError> {
    Ok(Json(load_user(&state, user_id).await?.into()))
}

#[instrument(skip(state))]
pub async fn complete_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    User::mark_settings_completed(&state.db, user_id).await?;
    info!(%user_id, "settings completed");
    Ok(Json(MessageResponse::new("Settings updated successfully.")))
}
