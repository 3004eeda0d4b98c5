use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserStore;
use crate::user::errors::StoreError;
use crate::user::errors::UniqueField;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    by_username: HashMap<String, UserId>,
    by_email: HashMap<String, UserId>,
}

/// Process-local user store.
///
/// Both uniqueness checks and the write happen under one lock, so concurrent
/// inserts behave like a database with unique constraints.
#[derive(Default)]
pub struct InMemoryUserStore {
    tables: Mutex<Tables>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    ///
    /// # Panics
    ///
    /// Panics if a writer panicked while holding the store lock.
    pub fn len(&self) -> usize {
        self.tables.lock().expect("user store lock poisoned").users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("user store lock poisoned".to_string()))
    }

    fn find_by_key(
        &self,
        index: impl Fn(&Tables) -> &HashMap<String, UserId>,
        key: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.lock()?;
        Ok(index(&tables)
            .get(key)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        self.find_by_key(|t| &t.by_username, username.as_str())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        self.find_by_key(|t| &t.by_email, email.as_str())
    }

    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.lock()?;

        if tables.by_username.contains_key(user.username.as_str()) {
            return Err(StoreError::Conflict {
                field: UniqueField::Username,
                value: user.username.as_str().to_string(),
            });
        }
        if tables.by_email.contains_key(user.email.as_str()) {
            return Err(StoreError::Conflict {
                field: UniqueField::Email,
                value: user.email.as_str().to_string(),
            });
        }

        tables
            .by_username
            .insert(user.username.as_str().to_string(), user.id);
        tables.by_email.insert(user.email.as_str().to_string(), user.id);
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn exists_username(&self, username: &Username) -> Result<bool, StoreError> {
        Ok(self.lock()?.by_username.contains_key(username.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::user::models::Role;

    fn user(username: &str, email: &str) -> User {
        User::with_password(
            Username::new(username.to_string()).unwrap(),
            EmailAddress::new(email.to_string()).unwrap(),
            "$argon2id$stub".to_string(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::new();
        let alice = store.insert(user("alice", "alice@x.com")).await.unwrap();

        let by_name = store.find_by_username(&alice.username).await.unwrap();
        let by_email = store.find_by_email(&alice.email).await.unwrap();

        assert_eq!(by_name, Some(alice.clone()));
        assert_eq!(by_email, Some(alice.clone()));
        assert!(store.exists_username(&alice.username).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_admin_role_round_trips() {
        let store = InMemoryUserStore::new();
        let admin = User {
            role: Role::Admin,
            ..user("root", "root@x.com")
        };
        store.insert(admin).await.unwrap();

        let email = EmailAddress::new("root@x.com".to_string()).unwrap();
        let found = store.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.role, Role::Admin);
    }

    fn poisoned_store() -> Arc<InMemoryUserStore> {
        let store = Arc::new(InMemoryUserStore::new());
        let holder = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = holder.tables.lock().unwrap();
            panic!("writer died");
        })
        .join();
        store
    }

    #[tokio::test]
    async fn test_poisoned_lock_reports_unavailable() {
        let store = poisoned_store();
        let name = Username::new("alice".to_string()).unwrap();

        assert!(matches!(
            store.find_by_username(&name).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    #[should_panic(expected = "user store lock poisoned")]
    fn test_len_panics_on_poisoned_lock() {
        poisoned_store().len();
    }

    #[tokio::test]
    async fn test_find_missing_user() {
        let store = InMemoryUserStore::new();
        let username = Username::new("ghost".to_string()).unwrap();

        assert_eq!(store.find_by_username(&username).await.unwrap(), None);
        assert!(!store.exists_username(&username).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_duplicate_username_conflicts() {
        let store = InMemoryUserStore::new();
        store.insert(user("alice", "alice@x.com")).await.unwrap();

        let result = store.insert(user("alice", "other@x.com")).await;
        assert_eq!(
            result,
            Err(StoreError::Conflict {
                field: UniqueField::Username,
                value: "alice".to_string()
            })
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_duplicate_email_conflicts() {
        let store = InMemoryUserStore::new();
        store.insert(user("alice", "alice@x.com")).await.unwrap();

        let result = store.insert(user("alice2", "alice@x.com")).await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict {
                field: UniqueField::Email,
                ..
            })
        ));

        let taken = Username::new("alice2".to_string()).unwrap();
        assert!(!store.exists_username(&taken).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_admit_one() {
        let store = Arc::new(InMemoryUserStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.insert(user("carol", &format!("carol{i}@x.com"))).await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.len(), 1);
    }
}
