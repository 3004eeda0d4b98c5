use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;

/// Issues and validates stateless session tokens.
///
/// Every token carries subject, username and role, and expires a fixed
/// `lifetime` after issue. Validity is decided purely by signature and
/// expiry; nothing is stored server-side.
pub struct SessionIssuer {
    jwt_handler: JwtHandler,
    lifetime: Duration,
    issuer: Option<String>,
}

/// A freshly signed session token together with the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact JWT, suitable for an `Authorization: Bearer` header
    pub access_token: String,
    pub claims: Claims,
}

impl IssuedToken {
    /// Expiration instant of the token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

impl SessionIssuer {
    /// Default session lifetime.
    pub const DEFAULT_LIFETIME_HOURS: i64 = 1;

    /// Longest accepted session lifetime (30 days).
    pub const MAX_LIFETIME_HOURS: i64 = 24 * 30;

    /// Create an issuer signing with `secret`.
    ///
    /// # Errors
    /// * `MissingSigningKey` / `WeakSigningKey` - Secret unusable for HS256
    /// * `InvalidLifetime` - Lifetime not positive or above `MAX_LIFETIME_HOURS`
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, JwtError> {
        if lifetime <= Duration::zero() || lifetime > Duration::hours(Self::MAX_LIFETIME_HOURS) {
            return Err(JwtError::InvalidLifetime {
                max_hours: Self::MAX_LIFETIME_HOURS,
            });
        }

        Ok(Self {
            jwt_handler: JwtHandler::new(secret)?,
            lifetime,
            issuer: None,
        })
    }

    /// Stamp every issued token with an `iss` claim.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Session lifetime applied to every token.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a new session token for the given identity.
    ///
    /// # Errors
    /// * `EncodingFailed` - Signing failed
    pub fn issue(
        &self,
        subject: impl ToString,
        username: &str,
        role: &str,
    ) -> Result<IssuedToken, JwtError> {
        let mut claims = Claims::for_user(subject, username, role, self.lifetime);
        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer.clone());
        }

        let access_token = self.jwt_handler.encode(&claims)?;

        Ok(IssuedToken {
            access_token,
            claims,
        })
    }

    /// Validate a presented session token and return its claims.
    ///
    /// # Errors
    /// * `TokenExpired` - Token lifetime elapsed
    /// * `DecodingFailed` / `MissingClaim` - Token not issued by this key
    /// * `InvalidIssuer` - `iss` differs from the configured issuer
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        match &self.issuer {
            Some(issuer) => self.jwt_handler.decode_issued_by(token, issuer),
            None => self.jwt_handler.decode(token),
        }
    }
}
