use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Role;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserStore;
use crate::user::errors::StoreError;
use crate::user::errors::UniqueField;

const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            username: Username::new(row.username)?,
            email: EmailAddress::new(row.email)?,
            password_hash: row.password_hash,
            role: row.role.parse::<Role>()?,
            created_at: row.created_at,
        })
    }
}

/// User store backed by the `users` table.
///
/// Uniqueness is enforced by the table's constraints; a violated constraint
/// surfaces as `StoreError::Conflict`.
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        // `column` is one of our fixed column names, never caller input.
        let query = format!(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE {column} = $1"
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.map(User::try_from).transpose()
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, StoreError> {
        self.find_one("username", username.as_str()).await
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        self.find_one("email", email.as_str()).await
    }

    async fn insert(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    match db_err.constraint() {
                        Some(USERNAME_CONSTRAINT) => {
                            return StoreError::Conflict {
                                field: UniqueField::Username,
                                value: user.username.as_str().to_string(),
                            };
                        }
                        Some(EMAIL_CONSTRAINT) => {
                            return StoreError::Conflict {
                                field: UniqueField::Email,
                                value: user.email.as_str().to_string(),
                            };
                        }
                        other => {
                            tracing::error!(
                                constraint = ?other,
                                "Unique violation on unexpected constraint"
                            );
                        }
                    }
                }
            }
            unavailable(e)
        })?;

        Ok(user)
    }

    async fn exists_username(&self, username: &Username) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)
    }
}
