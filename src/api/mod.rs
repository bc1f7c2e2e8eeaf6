//! HTTP API: shared state, handlers and routes.

mod extract;
pub mod handlers;
mod routes;

use sea_orm::DatabaseConnection;

use crate::auth::SessionManager;
use crate::config::ServerConfig;

pub use routes::router;

/// Application state shared across handlers
pub struct AppState {
    pub db: DatabaseConnection,
    pub auth: SessionManager,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &ServerConfig) -> Self {
        let auth = SessionManager::new(db.clone(), config.session.clone(), config.allow_admin_signup);
        Self { db, auth }
    }
}
