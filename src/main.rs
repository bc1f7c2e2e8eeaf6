mod access;
mod api;
mod auth;
mod config;
mod db;
mod error;
mod services;
#[cfg(test)]
mod test_support;
mod validation;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::ServerConfig;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(ServerConfig::from_env()).await {
        tracing::error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::init_database(&config.database_path, config.db_max_connections).await?;
    tracing::info!("Database initialized at {:?}", config.database_path);

    let state = Arc::new(AppState::new(db, &config));

    // Ensure an admin exists (for bootstrapping)
    if let Some(admin) = &config.bootstrap_admin {
        state.auth.ensure_admin_user(&admin.email, &admin.password).await?;
    }
    let purged = state.auth.purge_expired().await?;
    if purged > 0 {
        tracing::info!("Removed {} expired sessions", purged);
    }

    let app = api::router(state).layer(TraceLayer::new_for_http());

    tracing::info!("CRM server starting on http://{}", config.bind_addr);
    tracing::info!(
        "Session TTL: {} minutes, cookie '{}'",
        config.session.ttl.as_secs() / 60,
        config.session.cookie_name
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
