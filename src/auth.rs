//! Authentication: Argon2 password hashes and server-side login sessions.
//!
//! A session token is 32 random bytes, hex encoded, handed to the client
//! once in a cookie (and the login response). Only its SHA-256 is stored.
//! Every authenticated request pushes the expiry forward by the configured
//! TTL, so sessions end after a period of inactivity.

use argon2::{
    password_hash::{rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header, HeaderMap};
use rand::{rngs::OsRng, RngCore};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, Set,
};
use sha2::{Digest, Sha256};

use crate::access::Principal;
use crate::config::SessionConfig;
use crate::db::{
    self,
    entities::{
        session,
        user::{self, Role},
    },
};
use crate::error::{Result, ServerError};
use crate::services::users::{self, NewUser, UserView};

/// Hash a password into a PHC string with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServerError::Internal(format!("password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserView,
}

/// Session manager over the `sessions` table
pub struct SessionManager {
    db: DatabaseConnection,
    config: SessionConfig,
    allow_admin_signup: bool,
}

impl SessionManager {
    pub fn new(db: DatabaseConnection, config: SessionConfig, allow_admin_signup: bool) -> Self {
        Self {
            db,
            config,
            allow_admin_signup,
        }
    }

    fn ttl_secs(&self) -> i64 {
        self.config.ttl.as_secs() as i64
    }

    /// Public sign-up
    pub async fn register(&self, input: NewUser) -> Result<UserView> {
        if input.role == Role::Admin && !self.allow_admin_signup {
            tracing::warn!("Rejected admin sign-up for {}", input.email);
            return Err(ServerError::forbidden("Admin accounts cannot be self-registered"));
        }
        let user = users::create_account(&self.db, input).await?;
        Ok(user.into())
    }

    /// Check credentials and open a session
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = email.trim().to_lowercase();
        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;

        let user = match user {
            Some(u) if verify_password(password, &u.password_hash) => u,
            _ => {
                tracing::warn!("Failed login for {}", email);
                return Err(ServerError::Unauthenticated);
            }
        };
        if !user.is_active {
            tracing::warn!("Login refused for deactivated user {}", user.id);
            return Err(ServerError::forbidden("This account has been deactivated"));
        }

        self.purge_expired().await?;
        let token = self.start_session(user.id).await?;
        tracing::info!("User {} ({}) logged in", user.id, user.role);
        Ok(LoginOutcome {
            token,
            user: user.into(),
        })
    }

    /// Open a session for a user and return the raw token
    pub async fn start_session(&self, user_id: i32) -> Result<String> {
        let token = generate_token();
        let now = db::now();
        session::ActiveModel {
            user_id: Set(user_id),
            token_hash: Set(hash_token(&token)),
            created_at: Set(now),
            expires_at: Set(now + self.ttl_secs()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(token)
    }

    /// Resolve a token to the current principal and slide its expiry.
    ///
    /// The role comes from the user row, so role changes apply to open
    /// sessions immediately.
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        let session = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .one(&self.db)
            .await?
            .ok_or(ServerError::Unauthenticated)?;

        let now = db::now();
        if session.expires_at <= now {
            tracing::debug!("Session {} for user {} expired", session.id, session.user_id);
            session.delete(&self.db).await?;
            return Err(ServerError::Unauthenticated);
        }

        let user = match user::Entity::find_by_id(session.user_id).one(&self.db).await? {
            Some(u) if u.is_active => u,
            _ => {
                session.delete(&self.db).await?;
                return Err(ServerError::Unauthenticated);
            }
        };

        let mut active: session::ActiveModel = session.into();
        active.expires_at = Set(now + self.ttl_secs());
        active.update(&self.db).await?;

        Ok(Principal::of(&user))
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let result = session::Entity::delete_many()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            tracing::debug!("Session closed");
        }
        Ok(())
    }

    /// Drop every expired session
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(db::now()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Create the first admin account if the directory has none
    pub async fn ensure_admin_user(&self, email: &str, password: &str) -> Result<()> {
        let admins = user::Entity::find()
            .filter(user::Column::Role.eq(Role::Admin))
            .count(&self.db)
            .await?;
        if admins > 0 {
            return Ok(());
        }

        let admin = users::create_account(
            &self.db,
            NewUser {
                name: "Administrator".to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::Admin,
                manager_id: None,
            },
        )
        .await?;
        tracing::info!("Created bootstrap admin {} ({})", admin.id, admin.email);
        Ok(())
    }

    /// `Set-Cookie` value carrying a fresh session token
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.config.cookie_name,
            token,
            self.ttl_secs()
        );
        if self.config.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.config.cookie_name)
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }
}
