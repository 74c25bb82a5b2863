mod app;
mod archive;
mod auth;
mod config;
mod error;
mod onboarding;
mod profiles;
mod projects;
mod scoring;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "project_scorer=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .map_err(|e| anyhow::anyhow!("database migration failed: {e}"))?;

    tracing::info!(
        upload_root = %app_state.config.uploads.root.display(),
        "upload storage ready"
    );
    app::serve(app::build_app(app_state)).await
}
