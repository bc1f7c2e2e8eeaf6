use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Coarse error categories exposed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    ValidationFailed,
    Conflict,
    Internal,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl ServerError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ServerError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServerError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServerError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServerError::Conflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Unauthenticated => ErrorKind::Unauthenticated,
            ServerError::Forbidden(_) => ErrorKind::Forbidden,
            ServerError::NotFound(_) => ErrorKind::NotFound,
            ServerError::Validation(_) => ErrorKind::ValidationFailed,
            ServerError::Conflict(_) => ErrorKind::Conflict,
            ServerError::Internal(_) | ServerError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
