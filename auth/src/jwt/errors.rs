use thiserror::Error;

/// Error type for JWT operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Signing key is missing")]
    MissingSigningKey,

    #[error("Signing key too short: minimum {min} bytes, got {actual}")]
    WeakSigningKey { min: usize, actual: usize },

    #[error("Session lifetime must be between 1 and {max_hours} hours")]
    InvalidLifetime { max_hours: i64 },

    #[error("Token issuer does not match")]
    InvalidIssuer,

    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Failed to decode token: {0}")]
    DecodingFailed(String),

    #[error("Token is expired")]
    TokenExpired,

    #[error("Missing required claim: {0}")]
    MissingClaim(String),
}
