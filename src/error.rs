//! Application error taxonomy shared by services and HTTP handlers.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;

/// Errors surfaced by domain workflows.
///
/// Validation and lookup failures are detected before any side effect and
/// are returned to the caller as-is. `Server` wraps persistence or unexpected
/// failures; its detail is logged but never shown to clients.
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid input.
    Validation(String),
    /// Referenced entity does not exist.
    NotFound(String),
    /// No valid credentials were supplied.
    Authentication(String),
    /// Actor lacks the role or ownership required.
    Authorization(String),
    /// Duplicate of something that must be unique.
    Conflict(String),
    /// Persistence or unexpected failure.
    Server(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Authorization(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    /// Message safe to show to API clients.
    pub fn public_message(&self) -> &str {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Conflict(msg) => msg,
            AppError::Server(_) => "Server error",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            AppError::Authorization(msg) => write!(f, "Authorization error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Server(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DbErr> for AppError {
    fn from(e: DbErr) -> Self {
        match e {
            DbErr::RecordNotFound(msg) => AppError::NotFound(msg),
            e => AppError::Server(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Duplicate applications and follows are reported as bad requests.
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Server(detail) = self {
            log::error!("{}", detail);
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "message": self.public_message(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::conflict("Already applied.").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Authentication("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = AppError::from(DbErr::Custom("connection refused".to_string()));
        assert_eq!(err.public_message(), "Server error");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let err = AppError::from(DbErr::RecordNotFound("User".to_string()));
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
