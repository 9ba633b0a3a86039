//! Unified application error model and mapping helpers.
//! One enum is shared by the HTTP handlers, the file-manager adapters and the
//! backend client layer, with a mapper to HTTP status codes and a JSON body
//! shape used by every error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Client supplied an invalid or incomplete request.
    BadRequest { code: String, message: String },
    /// A remote entry does not exist. Benign on existence probes; a normal
    /// negative result at the boundary.
    NotFound { code: String, message: String },
    /// Route named a resource outside the closed backend set.
    UnknownResource { code: String, message: String },
    /// Body named an operation outside the closed operation set.
    UnknownOperation { code: String, message: String },
    /// Missing or invalid session.
    Auth { code: String, message: String },
    /// Any non-404 failure from a backend call. Always fatal, propagated
    /// unchanged to the caller.
    Backend { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::UnknownResource { code, .. }
            | AppError::UnknownOperation { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Backend { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::UnknownResource { message, .. }
            | AppError::UnknownOperation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Backend { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn bad_request<S: Into<String>>(code: S, msg: S) -> Self { AppError::BadRequest { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn unknown_resource(name: &str) -> Self {
        AppError::UnknownResource { code: "unknown_resource".into(), message: format!("unknown resource '{}'", name) }
    }
    pub fn unknown_operation(name: &str) -> Self {
        AppError::UnknownOperation { code: "unknown_operation".into(), message: format!("unknown operation '{}'", name) }
    }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn backend<S: Into<String>>(code: S, msg: S) -> Self { AppError::Backend { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// True for the benign absence case used by existence probes.
    pub fn is_not_found(&self) -> bool { matches!(self, AppError::NotFound { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::BadRequest { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::UnknownResource { .. } => 400,
            AppError::UnknownOperation { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Backend { .. } => 502,
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

impl From<crate::clients::ClientError> for AppError {
    fn from(err: crate::clients::ClientError) -> Self {
        use crate::clients::ClientError;
        match err {
            ClientError::NotFound(what) => AppError::not_found("not_found".into(), what),
            ClientError::Http { status, message } => AppError::Backend {
                code: "backend_error".into(),
                message: format!("backend returned {}: {}", status, message),
            },
            ClientError::Transport(e) => AppError::Backend {
                code: "backend_unreachable".into(),
                message: e.to_string(),
            },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}
