use anyhow::Context;

mod app;
mod auth;
mod config;
mod error;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "enroll=debug,axum=info,tower_http=info".to_string());
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

    // The listener binds only after the store is reachable and migrated;
    // a failure here aborts startup instead of serving 503s forever.
    let app_state = state::AppState::init().await?;
    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;
    tracing::info!("database ready");

    let app = app::build_app(app_state);
    app::serve(app).await
}
