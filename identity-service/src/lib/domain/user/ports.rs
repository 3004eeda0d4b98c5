use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;
use crate::user::errors::StoreError;

/// Persistence operations for the user aggregate.
///
/// Implementations must enforce uniqueness of `username` and `email`
/// atomically inside [`UserStore::insert`]; a preceding existence check is
/// never sufficient on its own.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Retrieve user by username (exact, case-sensitive match).
    ///
    /// # Errors
    /// * `Unavailable` - Store could not be reached
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError>;

    /// Retrieve user by email address.
    ///
    /// # Errors
    /// * `Unavailable` - Store could not be reached
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError>;

    /// Persist a new user, failing if its username or email is taken.
    ///
    /// # Returns
    /// The stored user
    ///
    /// # Errors
    /// * `Conflict` - Uniqueness constraint violated at commit time; nothing was written
    /// * `Unavailable` - Store could not be reached
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    /// Whether a user with this username exists.
    ///
    /// # Errors
    /// * `Unavailable` - Store could not be reached
    async fn exists_username(&self, username: &Username) -> Result<bool, StoreError>;
}
