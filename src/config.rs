//! Server configuration.
//!
//! Every setting has a default; `ServerConfig::from_env` overrides them from
//! `CRM_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Account created on first start when the directory has no admin yet
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity window; every authenticated request renews it
    pub ttl: Duration,
    pub cookie_name: String,
    /// Add the `Secure` attribute to the session cookie
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(25 * 60),
            cookie_name: "crm_session".to_string(),
            secure_cookie: false,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub db_max_connections: u32,
    pub session: SessionConfig,
    /// Whether public sign-up may create admin accounts
    pub allow_admin_signup: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_path: std::env::temp_dir().join("crm-server").join("crm.db"),
            db_max_connections: 8,
            session: SessionConfig::default(),
            allow_admin_signup: false,
            bootstrap_admin: Some(BootstrapAdmin {
                email: "admin@crm.local".to_string(),
                password: "admin123".to_string(),
            }),
        }
    }
}

impl ServerConfig {
    /// Build config from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("CRM_BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => tracing::warn!("Ignoring invalid CRM_BIND_ADDR: {}", addr),
            }
        }

        if let Some(path) = lookup("CRM_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(max) = parse_number::<u32>(&lookup, "CRM_DB_MAX_CONNECTIONS") {
            config.db_max_connections = max.max(1);
        }

        if let Some(minutes) = parse_number::<u64>(&lookup, "CRM_SESSION_TTL_MINUTES") {
            if minutes > 0 {
                config.session.ttl = Duration::from_secs(minutes * 60);
            }
        }

        if let Some(name) = lookup("CRM_SESSION_COOKIE") {
            if !name.trim().is_empty() {
                config.session.cookie_name = name.trim().to_string();
            }
        }

        if let Some(flag) = lookup("CRM_SECURE_COOKIE") {
            config.session.secure_cookie = is_truthy(&flag);
        }

        if let Some(flag) = lookup("CRM_ALLOW_ADMIN_SIGNUP") {
            config.allow_admin_signup = is_truthy(&flag);
        }

        match (
            lookup("CRM_BOOTSTRAP_ADMIN_EMAIL"),
            lookup("CRM_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) if email.is_empty() || password.is_empty() => {
                config.bootstrap_admin = None;
            }
            (Some(email), Some(password)) => {
                config.bootstrap_admin = Some(BootstrapAdmin { email, password });
            }
            (None, None) => {}
            _ => tracing::warn!(
                "CRM_BOOTSTRAP_ADMIN_EMAIL and CRM_BOOTSTRAP_ADMIN_PASSWORD must be set together; using defaults"
            ),
        }

        config
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}: {}", key, raw);
            None
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.session.ttl, Duration::from_secs(25 * 60));
        assert_eq!(config.session.cookie_name, "crm_session");
        assert!(!config.allow_admin_signup);
        assert!(config.bootstrap_admin.is_some());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CRM_BIND_ADDR", "0.0.0.0:9000"),
            ("CRM_SESSION_TTL_MINUTES", "5"),
            ("CRM_ALLOW_ADMIN_SIGNUP", "true"),
            ("CRM_DB_MAX_CONNECTIONS", "3"),
        ]);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.session.ttl, Duration::from_secs(300));
        assert!(config.allow_admin_signup);
        assert_eq!(config.db_max_connections, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("CRM_BIND_ADDR", "not-an-address"),
            ("CRM_SESSION_TTL_MINUTES", "soon"),
        ]);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.session.ttl, Duration::from_secs(25 * 60));
    }

    #[test]
    fn test_empty_bootstrap_disables_admin_seed() {
        let config = config_from(&[
            ("CRM_BOOTSTRAP_ADMIN_EMAIL", ""),
            ("CRM_BOOTSTRAP_ADMIN_PASSWORD", ""),
        ]);
        assert!(config.bootstrap_admin.is_none());
    }
}
