use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::authentication::errors::AuthError;
use crate::domain::authentication::models::AuthResult;
use crate::domain::authentication::models::Credentials;
use crate::domain::authentication::models::FederatedIdentity;
use crate::domain::authentication::models::RegisterCommand;
use crate::domain::authentication::ports::AuthServicePort;
use crate::domain::authentication::ports::FederatedTokenVerifier;
use crate::domain::authentication::username::UsernameResolver;
use crate::domain::user::errors::StoreError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserStore;

/// Settings for the federated sign-in flow.
#[derive(Debug, Clone)]
pub struct FederationSettings {
    /// Expected audience of provider tokens
    pub client_id: String,
    /// Upper bound on a single verification, key fetches included
    pub verification_timeout: Duration,
}

/// Domain service implementation for authentication flows.
///
/// Stateless: the only shared mutable state is behind the `UserStore`, so a
/// single instance serves any number of concurrent requests.
pub struct AuthService<S, V>
where
    S: UserStore,
    V: FederatedTokenVerifier,
{
    store: Arc<S>,
    verifier: Arc<V>,
    username_resolver: UsernameResolver<S>,
    password_hasher: auth::PasswordHasher,
    session_issuer: Arc<auth::SessionIssuer>,
    federation: FederationSettings,
}

impl<S, V> AuthService<S, V>
where
    S: UserStore,
    V: FederatedTokenVerifier,
{
    /// Attempts to onboard a federated user before giving up on username races.
    pub const MAX_ONBOARDING_ATTEMPTS: usize = 3;

    /// Create a new authentication service with injected dependencies.
    ///
    /// # Arguments
    /// * `store` - User persistence implementation
    /// * `verifier` - Identity provider token verifier
    /// * `session_issuer` - Signs session tokens
    /// * `federation` - Expected audience and verification timeout
    pub fn new(
        store: Arc<S>,
        verifier: Arc<V>,
        session_issuer: Arc<auth::SessionIssuer>,
        federation: FederationSettings,
    ) -> Self {
        Self {
            username_resolver: UsernameResolver::new(Arc::clone(&store)),
            store,
            verifier,
            password_hasher: auth::PasswordHasher::new(),
            session_issuer,
            federation,
        }
    }

    fn sign(&self, user: &User) -> Result<auth::IssuedToken, AuthError> {
        self.session_issuer
            .issue(user.id, user.username.as_str(), user.role.as_str())
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Failed to sign session token");
                AuthError::Internal(format!("Token generation failed: {e}"))
            })
    }

    /// Verify the provider token within the configured timeout and check
    /// its audience. Every failure is reported the same way.
    async fn verify_federated(&self, raw_token: &str) -> Result<FederatedIdentity, AuthError> {
        let timeout = self.federation.verification_timeout;

        let identity = match tokio::time::timeout(timeout, self.verifier.verify(raw_token)).await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Federated token rejected");
                return Err(AuthError::InvalidFederatedToken);
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Federated token verification timed out"
                );
                return Err(AuthError::InvalidFederatedToken);
            }
        };

        if identity.audience != self.federation.client_id {
            tracing::warn!(
                audience = %identity.audience,
                "Federated token issued for another client"
            );
            return Err(AuthError::InvalidFederatedToken);
        }

        Ok(identity)
    }

    /// Create the user for a first federated sign-in.
    ///
    /// A conflicting insert means a concurrent request got there first: if a
    /// user with this email now exists, sign that one in; otherwise someone
    /// else took the derived username and another one is picked.
    async fn onboard(&self, email: EmailAddress) -> Result<AuthResult, AuthError> {
        for attempt in 1..=Self::MAX_ONBOARDING_ATTEMPTS {
            let username = self.username_resolver.resolve_from_email(&email).await?;
            let user = User::federated(username, email.clone());
            let issued = self.sign(&user)?;

            match self.store.insert(user).await {
                Ok(user) => {
                    tracing::info!(
                        user_id = %user.id,
                        username = %user.username,
                        "Federated user onboarded"
                    );
                    return Ok(AuthResult::new(&user, issued));
                }
                Err(StoreError::Conflict { field, value }) => {
                    if let Some(existing) = self.store.find_by_email(&email).await? {
                        tracing::debug!(
                            user_id = %existing.id,
                            "Federated user created concurrently, reusing it"
                        );
                        let issued = self.sign(&existing)?;
                        return Ok(AuthResult::new(&existing, issued));
                    }

                    tracing::warn!(
                        attempt,
                        field = %field,
                        value = %value,
                        "Federated onboarding lost a username race"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::UsernameTaken(email.local_part().to_string()))
    }
}

#[async_trait]
impl<S, V> AuthServicePort for AuthService<S, V>
where
    S: UserStore,
    V: FederatedTokenVerifier,
{
    async fn authenticate_with_password(
        &self,
        credentials: Credentials,
    ) -> Result<AuthResult, AuthError> {
        let Credentials { username, password } = credentials;

        // A name that could never have been registered cannot match anyone.
        let Ok(username) = Username::new(username) else {
            return Err(AuthError::InvalidCredentials);
        };

        let Some(user) = self.store.find_by_username(&username).await? else {
            tracing::info!(username = %username, "Login for unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.password_hasher.verify(&password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.sign(&user)?;
        Ok(AuthResult::new(&user, issued))
    }

    async fn register(&self, command: RegisterCommand) -> Result<AuthResult, AuthError> {
        let requested = command.username.as_str().to_string();

        if self.store.exists_username(&command.username).await? {
            return Err(AuthError::UsernameTaken(requested));
        }

        let password_hash = self.password_hasher.hash(command.password.expose())?;
        let user = User::with_password(command.username, command.email, password_hash);

        // Signed before the insert so nothing is persisted if signing fails.
        let issued = self.sign(&user)?;

        let user = match self.store.insert(user).await {
            Ok(user) => user,
            Err(StoreError::Conflict { field, .. }) => {
                tracing::warn!(
                    username = %requested,
                    field = %field,
                    "Registration lost a uniqueness race"
                );
                return Err(AuthError::UsernameTaken(requested));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(AuthResult::new(&user, issued))
    }

    async fn authenticate_with_federated_provider(
        &self,
        raw_token: &str,
    ) -> Result<AuthResult, AuthError> {
        let identity = self.verify_federated(raw_token).await?;

        let email = EmailAddress::new(identity.email).map_err(|e| {
            tracing::warn!(error = %e, "Federated token carries an unusable email");
            AuthError::InvalidFederatedToken
        })?;

        match self.store.find_by_email(&email).await? {
            // Existing accounts are used as stored; role and email are not re-synced.
            Some(user) => {
                let issued = self.sign(&user)?;
                Ok(AuthResult::new(&user, issued))
            }
            None => self.onboard(email).await,
        }
    }

    fn validate_session_token(&self, token: &str) -> Result<auth::Claims, AuthError> {
        self.session_issuer.validate(token).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            AuthError::InvalidSessionToken
        })
    }
}
