use thiserror::Error;

use crate::user::errors::StoreError;

/// Detailed reasons a federated token was rejected.
///
/// Only ever logged. Callers of the authentication service see a single
/// `AuthError::InvalidFederatedToken` regardless of the variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FederatedTokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid token signature: {0}")]
    InvalidSignature(String),

    #[error("token has expired")]
    Expired,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("token missing email claim")]
    MissingEmail,

    #[error("email is not verified")]
    UnverifiedEmail,

    #[error("no matching key for kid '{0}'")]
    NoMatchingKey(String),

    #[error("failed to fetch provider keys: {0}")]
    KeyFetch(String),

    #[error("verification timed out")]
    Timeout,
}

/// Outcome of a failed authentication operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown username or wrong password; the two are indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Invalid federated token")]
    InvalidFederatedToken,

    #[error("Invalid session token")]
    InvalidSessionToken,

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Signing, hashing or data-integrity failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error is caused by the caller's input (vs. infrastructure).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::UsernameTaken(_)
                | AuthError::InvalidFederatedToken
                | AuthError::InvalidSessionToken
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AuthError::PersistenceUnavailable(msg),
            StoreError::Conflict { .. } | StoreError::Corrupt(_) => {
                AuthError::Internal(err.to_string())
            }
        }
    }
}

impl From<auth::PasswordError> for AuthError {
    fn from(err: auth::PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
