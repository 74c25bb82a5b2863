use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{DisplayUpdate, ProfileForm},
    repo_types::Profile,
};
use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser, repo_types::User},
    error::AppError,
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route(
        "/profile",
        get(get_profile).put(put_profile).patch(patch_profile),
    )
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Option<Profile>>, AppError> {
    Ok(Json(Profile::find_by_user(&state.db, user_id).await?))
}

/// Saves the profile and marks the onboarding step as done.
#[instrument(skip(state, form))]
pub async fn put_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(form): Json<ProfileForm>,
) -> Result<Json<Profile>, AppError> {
    form.validate()?;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    let profile =
        Profile::upsert(&mut *tx, user_id, form.name.trim(), form.age, &form.bio).await?;
    User::mark_profile_completed(&mut *tx, user_id).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(%user_id, "profile completed");
    Ok(Json(profile))
}

#[instrument(skip(state, update))]
pub async fn patch_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(update): Json<DisplayUpdate>,
) -> Result<Json<MessageResponse>, AppError> {
    Profile::upsert_display(&state.db, user_id, update.display_name.trim(), &update.bio).await?;
    info!(%user_id, "profile display updated");
    Ok(Json(MessageResponse::new("Profile updated successfully")))
}
