//! Error handling for the authorization core.
//!
//! This module provides:
//! - [`AuthorizationError`], the structured denial returned by `require`
//! - [`AuthzError`], the crate-wide error with stable machine-readable codes
//! - HTTP status mapping and a uniform access-denied response body
//!
//! Denials never expose why they happened. Every forbidden response carries
//! the same message; the reason is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error};

use crate::rbac::permissions::Permission;
use crate::rbac::roles::TableError;
use crate::store::StoreError;

/// Message returned to callers for every denial, whatever the cause.
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied";

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Forbidden,
    InvalidIdentifier,
    InvalidInput,
    StoreUnavailable,
    InvalidRoleTable,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidIdentifier | Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRoleTable | Self::ConfigurationError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidIdentifier => "INVALID_IDENTIFIER",
            Self::InvalidInput => "INVALID_INPUT",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::InvalidRoleTable => "INVALID_ROLE_TABLE",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Denial
// ═══════════════════════════════════════════════════════════════════════════════

/// A denied permission check.
///
/// Produced by `AccessEvaluator::require`; callers propagate it as an
/// access-denied response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Permission denied: {permission}")]
pub struct AuthorizationError {
    pub permission: Permission,
}

impl AuthorizationError {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the authorization core.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The caller is not allowed to perform the action.
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    /// A caller passed a malformed identifier (contract violation).
    #[error("Invalid {kind}: {reason}")]
    InvalidIdentifier { kind: &'static str, reason: String },

    /// A value outside a closed set (role, status, permission).
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    /// The membership store could not be reached or set up.
    #[error("Membership store error: {0}")]
    Store(#[from] StoreError),

    /// The role-permission table violates the role hierarchy.
    #[error("Invalid role table: {0}")]
    InvalidRoleTable(#[from] TableError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthzError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn invalid_identifier(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            kind,
            reason: reason.into(),
        }
    }

    pub fn unknown_value(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownValue {
            kind,
            value: value.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            Self::UnknownValue { .. } => ErrorCode::InvalidInput,
            Self::Store(_) => ErrorCode::StoreUnavailable,
            Self::InvalidRoleTable(_) => ErrorCode::InvalidRoleTable,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code().http_status()
    }

    /// Message that is safe to show to an unprivileged caller.
    pub fn user_message(&self) -> String {
        match self {
            Self::Forbidden(_) => ACCESS_DENIED_MESSAGE.to_string(),
            Self::InvalidIdentifier { .. } | Self::UnknownValue { .. } => self.to_string(),
            Self::Store(_) => "Service temporarily unavailable".to_string(),
            Self::InvalidRoleTable(_) | Self::Configuration(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    /// Log this error; caller mistakes and denials at debug, system faults at error.
    pub fn log(&self) {
        let code = self.code();
        match self {
            Self::Forbidden(_) | Self::InvalidIdentifier { .. } | Self::UnknownValue { .. } => {
                debug!(error_code = %code, detail = %self, "Request rejected");
            }
            _ => {
                error!(error_code = %code, detail = %self, "Authorization subsystem error");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    pub error: ErrorInfo,
}

/// Error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// User-friendly error message
    pub message: String,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&AuthzError> for ErrorResponse {
    fn from(error: &AuthzError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code(),
                message: error.user_message(),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        AuthzError::from(self).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
