//! LearnHub - A learning-platform backend

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnhub::{
    api::{self, AppState},
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnhub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LearnHub...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let state = AppState::new(pool, &config);

    // Seed the superuser when configured
    if let (Some(email), Some(password)) = (
        &config.auth.superuser_email,
        &config.auth.superuser_password,
    ) {
        let created = state
            .user_service
            .ensure_superuser(email, &config.auth.superuser_name, password)
            .await?;
        if created.is_none() {
            tracing::debug!("Superuser {} already exists", email);
        }
    }

    if config.auth.uses_default_secret() {
        tracing::warn!("SECRET_KEY not set, tokens are signed with the placeholder key");
    }

    if !config.mail.is_enabled() {
        tracing::warn!("SMTP not configured, password reset mails will only be logged");
    }

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
