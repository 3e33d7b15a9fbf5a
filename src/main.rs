//! Storefront - GraphQL shop backend

use anyhow::Result;
use std::path::Path;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{
    api::{self, AppState},
    config::Config,
    db,
    services::mailer_from_config,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting storefront...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    if config.auth.uses_default_secret() {
        tracing::warn!(
            "auth.jwt_secret is the built-in default; set STOREFRONT_AUTH_JWT_SECRET in production"
        );
    }
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    #[cfg(feature = "demo")]
    seed_demo_admin(&pool).await?;

    let mailer = mailer_from_config(&config.mail)?;
    let state = AppState::new(pool.clone(), &config, mailer);

    let app = api::build_router(state, &config.server.frontend_url)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::warn!("Received SIGTERM, shutting down"),
    }
}

/// Demo mode: create an admin holding every permission if none exists yet
#[cfg(feature = "demo")]
async fn seed_demo_admin(pool: &db::DynDatabasePool) -> Result<()> {
    use storefront::db::repositories::{SqlxUserRepository, UserRepository};
    use storefront::models::{CreateUserInput, Permission};
    use storefront::services::hash_password;

    const DEMO_EMAIL: &str = "demo@storefront.local";

    let users = SqlxUserRepository::new(pool.clone());
    if users.get_by_email(DEMO_EMAIL).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Demo mode: Creating default admin user ({}/demo123)", DEMO_EMAIL);
    users
        .create(&CreateUserInput {
            name: "Demo Admin".to_string(),
            email: DEMO_EMAIL.to_string(),
            password_hash: hash_password("demo123")?,
            permissions: Permission::ALL.to_vec(),
        })
        .await?;
    Ok(())
}
