//! Database bootstrap: migrations, default plans, default site settings and
//! the first admin account.
//!
//! Usage: `KT_ADMIN_EMAIL=... KT_ADMIN_PASSWORD=... cargo run --bin kt-init`

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kitchentech::{api::AppState, config::Config, db};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kitchentech=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_with_env(Path::new("config.yml"))?;
    for problem in config.validate_for_startup()? {
        tracing::warn!("Configuration problem: {}", problem);
    }

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let state = AppState::new(pool.clone(), config)?;

    let plans = state.plan_service.init_defaults().await?;
    tracing::info!("Created {} default plans", plans);

    let settings = state.settings_service.init_defaults().await?;
    tracing::info!("Created {} default settings", settings);

    match (
        std::env::var("KT_ADMIN_EMAIL"),
        std::env::var("KT_ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => {
            match state.user_service.ensure_admin(&email, &password).await? {
                Some(admin) => tracing::info!("Admin account created: {}", admin.email),
                None => tracing::info!("Admin account already exists"),
            }
        }
        _ => tracing::warn!("KT_ADMIN_EMAIL / KT_ADMIN_PASSWORD not set, skipping admin account"),
    }

    pool.close().await;
    Ok(())
}
