use async_trait::async_trait;

use crate::domain::authentication::errors::AuthError;
use crate::domain::authentication::errors::FederatedTokenError;
use crate::domain::authentication::models::AuthResult;
use crate::domain::authentication::models::Credentials;
use crate::domain::authentication::models::FederatedIdentity;
use crate::domain::authentication::models::RegisterCommand;

/// Port for authentication operations.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Sign in with username and password.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown username, wrong password, or federation-only account
    /// * `PersistenceUnavailable` - User store unreachable
    async fn authenticate_with_password(
        &self,
        credentials: Credentials,
    ) -> Result<AuthResult, AuthError>;

    /// Create a password-backed user and sign them in.
    ///
    /// # Errors
    /// * `UsernameTaken` - Username exists, or the insert lost a race
    /// * `PersistenceUnavailable` - User store unreachable
    async fn register(&self, command: RegisterCommand) -> Result<AuthResult, AuthError>;

    /// Sign in with a third-party identity token, creating the user on first use.
    ///
    /// # Errors
    /// * `InvalidFederatedToken` - Token rejected for any reason, including audience
    /// * `UsernameTaken` - Onboarding kept losing username races
    /// * `PersistenceUnavailable` - User store unreachable
    async fn authenticate_with_federated_provider(
        &self,
        raw_token: &str,
    ) -> Result<AuthResult, AuthError>;

    /// Check a session token previously issued by this service.
    ///
    /// # Errors
    /// * `InvalidSessionToken` - Bad signature, malformed, or expired
    fn validate_session_token(&self, token: &str) -> Result<auth::Claims, AuthError>;
}

/// Verifies identity tokens issued by a trusted third-party provider.
///
/// Checks signature and expiry; the audience is returned for the caller to
/// match against its own client id.
#[async_trait]
pub trait FederatedTokenVerifier: Send + Sync + 'static {
    async fn verify(&self, raw_token: &str) -> Result<FederatedIdentity, FederatedTokenError>;
}
