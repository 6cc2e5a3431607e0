//! Error types for user sync operations.
//!
//! Defines error variants for network, API, serialization, and configuration
//! failures that can occur during an upsert. The reconciler does not
//! distinguish between them; they are kept separate for logging and for
//! hosts that inspect failures.

use thiserror::Error;

/// Error type for all user sync operations.
///
/// Supports automatic conversion from reqwest and serde_json errors via
/// #[from].
#[derive(Debug, Error)]
pub enum UserSyncError {
    /// Network or transport-level HTTP error from reqwest.
    ///
    /// Includes connection failures, timeouts, and TLS errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The user store returned a non-success HTTP status.
    ///
    /// Contains the HTTP status code and response body for debugging.
    /// Common causes: expired access token, row-level policy violation,
    /// schema mismatch.
    #[error("user store error: {status} - {message}")]
    Api {
        /// The HTTP status code returned by the store.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration or initialization error.
    ///
    /// Used for missing credentials (no sync context) or invalid API URLs.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience Result type alias for user sync operations.
pub type UserSyncResult<T> = Result<T, UserSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = UserSyncError::Api {
            status: 401,
            message: "JWT expired".to_string(),
        };
        assert_eq!(format!("{}", err), "user store error: 401 - JWT expired");
    }

    #[test]
    fn config_error_display() {
        let err = UserSyncError::Config("sync context not set".to_string());
        assert_eq!(
            format!("{}", err),
            "configuration error: sync context not set"
        );
    }

    #[test]
    fn json_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json {{{").unwrap_err();
        let err: UserSyncError = serde_err.into();
        assert!(format!("{}", err).starts_with("JSON error:"));
    }
}
