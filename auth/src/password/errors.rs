use thiserror::Error;

/// Error type for password operations.
///
/// Verification never fails; only hashing can, when the system cannot
/// provide entropy or memory.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}
