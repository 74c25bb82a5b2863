use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MessageResponse, PublicUser, RefreshRequest,
            RegisterRequest, TokenKind, UpdatePasswordRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo_types::User,
        services::{check_password_strength, is_valid_email, issue_tokens, normalize_email},
    },
    error::{is_unique_violation, AppError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/password", post(update_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    check_password_strength(&payload.password)?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let hash = hash_password(&payload.password)?;
    // a concurrent registration can still win the insert
    let user = match User::create(&state.db, &payload.email, &hash).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email registered concurrently");
            return Err(AppError::Conflict("User already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    let keys = JwtKeys::from_ref(&state);
    Ok((StatusCode::CREATED, Json(issue_tokens(&keys, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = normalize_email(&payload.email);

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .decode_as(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AppError::Unauthorized("Invalid refresh token".into())
        })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(%user_id, "password change with wrong current password");
        return Err(AppError::BadRequest("Current password incorrect".into()));
    }
    check_password_strength(&payload.new_password)?;

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user_id, &hash).await?;

    info!(%user_id, "password updated");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}
