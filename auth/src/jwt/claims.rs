use chrono::DateTime;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Session token claims.
///
/// Standard RFC 7519 registered claims plus the identity attributes a
/// session carries: the user's `name` and `role`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Username
    pub name: String,

    /// Role name
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// JWT ID, unique per issued token
    pub jti: String,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Create claims for a user session issued now.
    ///
    /// # Arguments
    /// * `user_id` - Unique user identifier
    /// * `username` - Username at issue time
    /// * `role` - Role name at issue time
    /// * `lifetime` - Time until the token expires
    pub fn for_user(
        user_id: impl ToString,
        username: impl Into<String>,
        role: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        Self::for_user_at(Utc::now(), user_id, username, role, lifetime)
    }

    /// Same as [`Claims::for_user`] with an explicit issue instant.
    pub fn for_user_at(
        issued_at: DateTime<Utc>,
        user_id: impl ToString,
        username: impl Into<String>,
        role: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        // Saturates instead of overflowing; the issuer bounds real lifetimes.
        let expiration = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            sub: user_id.to_string(),
            name: username.into(),
            role: role.into(),
            iat: issued_at.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: None,
        }
    }

    /// Set issuer.
    pub fn with_issuer(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Expiration as a UTC instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Check if token is expired.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}
