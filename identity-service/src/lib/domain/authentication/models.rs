use std::fmt;

use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Password;
use crate::domain::user::models::Role;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;

/// Username and plaintext password submitted at login.
///
/// Consumed by the login call and dropped once verified.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Command to register a new password-backed user
#[derive(Debug)]
pub struct RegisterCommand {
    pub username: Username,
    pub email: EmailAddress,
    pub password: Password,
}

impl RegisterCommand {
    /// Construct a new registration command.
    ///
    /// # Arguments
    /// * `username` - Validated username
    /// * `email` - Validated email address
    /// * `password` - Plaintext password meeting the policy (hashed by the service)
    pub fn new(username: Username, email: EmailAddress, password: Password) -> Self {
        Self {
            username,
            email,
            password,
        }
    }
}

/// Verified claims extracted from a third-party identity token.
///
/// Never persisted; only the email is used to find or create a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: String,
    pub audience: String,
    pub expires_at: DateTime<Utc>,
}

/// Returned on every successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Compact signed session token
    pub token: String,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl AuthResult {
    pub fn new(user: &User, issued: auth::IssuedToken) -> Self {
        let expires_at = issued.expires_at();
        Self {
            token: issued.access_token,
            username: user.username.as_str().to_string(),
            role: user.role,
            expires_at,
        }
    }
}
