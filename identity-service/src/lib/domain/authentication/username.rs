use std::sync::Arc;

use crate::domain::authentication::errors::AuthError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserStore;

/// Derives unused usernames from email addresses for federated sign-ups.
///
/// The result is only a suggestion: another request can claim the same name
/// before it is inserted, so the store's insert remains the authority.
pub struct UsernameResolver<S>
where
    S: UserStore,
{
    store: Arc<S>,
}

impl<S> UsernameResolver<S>
where
    S: UserStore,
{
    /// Suffixes tried before giving up (`name`, `name1` .. `name999`).
    pub const MAX_CANDIDATES: u32 = 1000;

    const FALLBACK_BASE: &'static str = "user";

    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Pick the first unused username among `local`, `local1`, `local2`, ...
    ///
    /// # Errors
    /// * `UsernameTaken` - Every candidate is in use
    /// * `PersistenceUnavailable` - User store unreachable
    pub async fn resolve_from_email(&self, email: &EmailAddress) -> Result<Username, AuthError> {
        let base = Self::base_candidate(email);

        for n in 0..Self::MAX_CANDIDATES {
            let candidate = Username::new(Self::candidate(&base, n))
                .map_err(|e| AuthError::Internal(format!("Derived username invalid: {e}")))?;

            if !self.store.exists_username(&candidate).await? {
                return Ok(candidate);
            }
        }

        tracing::warn!(base = %base, "No free username left for email local part");
        Err(AuthError::UsernameTaken(base))
    }

    /// Local part restricted to the username alphabet, leaving room for a suffix.
    fn base_candidate(email: &EmailAddress) -> String {
        let suffix_width = (Self::MAX_CANDIDATES - 1).to_string().len();
        let base: String = email
            .local_part()
            .chars()
            .filter(|c| Username::is_allowed_char(*c))
            .take(Username::MAX_LENGTH - suffix_width)
            .collect();

        if base.is_empty() {
            Self::FALLBACK_BASE.to_string()
        } else {
            base
        }
    }

    fn candidate(base: &str, n: u32) -> String {
        if n == 0 {
            base.to_string()
        } else {
            format!("{base}{n}")
        }
    }
}
