//! Unified application error model and mapping helpers.
//! Every trust decision (token, policy, ownership, validation) reports through `AppError`,
//! and the HTTP layer renders it as `{"code": <status>, "message": <text>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Internal { code: String, message: String },
}

/// Generic login failure; identical for unknown identifiers and wrong secrets.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";
/// Generic token failure; does not say whether the token was missing, forged or expired.
pub const INVALID_TOKEN: &str = "Missing or invalid token.";
/// Route-level denial from the policy gate.
pub const ROUTE_FORBIDDEN: &str = "You do not have permission to access this resource.";

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn invalid_credentials() -> Self { Self::auth("invalid_credentials", INVALID_CREDENTIALS) }
    pub fn invalid_token() -> Self { Self::auth("invalid_token", INVALID_TOKEN) }
    pub fn route_forbidden() -> Self { Self::forbidden("route_forbidden", ROUTE_FORBIDDEN) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        let message = match err {
            // Infrastructure detail stays in the logs
            AppError::Internal { .. } => "Something went wrong. Please try again later.".to_string(),
            other => other.message().to_string(),
        };
        ErrorBody { code: err.http_status(), message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal { code, message } = &self {
            tracing::error!(target: "http", code = %code, "internal error: {}", message);
        }
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
        assert_eq!(AppError::auth("auth", "no").http_status(), 401);
        assert_eq!(AppError::forbidden("forbidden", "nope").http_status(), 403);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn error_body_hides_internal_detail() {
        let body = ErrorBody::from(&AppError::internal("policy_unreadable", "open /etc/policy.csv: EACCES"));
        assert_eq!(body.code, 500);
        assert!(!body.message.contains("EACCES"));

        let body = ErrorBody::from(&AppError::user("invalid_email", "Invalid email"));
        assert_eq!(body, ErrorBody { code: 400, message: "Invalid email".into() });
    }

    #[test]
    fn generic_auth_errors_are_identical() {
        assert_eq!(AppError::invalid_credentials(), AppError::invalid_credentials());
        assert_eq!(AppError::invalid_credentials().http_status(), 401);
        assert_eq!(AppError::invalid_token().message(), INVALID_TOKEN);
    }
}
