use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::authentication::service::AuthService;
use crate::authentication::service::FederationSettings;
use crate::config::Config;
use crate::identity::GoogleIdTokenVerifier;
use crate::repositories::PostgresUserStore;

/// The authentication service as deployed: Postgres users, Google sign-in.
pub type IdentityService = AuthService<PostgresUserStore, GoogleIdTokenVerifier>;

/// Build the session issuer described by `config`.
///
/// Fails when the signing secret is too weak or the lifetime out of range.
pub fn session_issuer(config: &Config) -> Result<auth::SessionIssuer, auth::JwtError> {
    let lifetime = chrono::Duration::try_hours(config.jwt.expiration_hours).ok_or(
        auth::JwtError::InvalidLifetime {
            max_hours: auth::SessionIssuer::MAX_LIFETIME_HOURS,
        },
    )?;
    let issuer = auth::SessionIssuer::new(config.jwt.secret.as_bytes(), lifetime)?;

    Ok(match &config.jwt.issuer {
        Some(name) => issuer.with_issuer(name.clone()),
        None => issuer,
    })
}

/// Connect to the database, migrate it and assemble the service.
pub async fn build(config: &Config) -> Result<IdentityService, anyhow::Error> {
    let session_issuer = Arc::new(session_issuer(config)?);
    tracing::info!(
        expiration_hours = config.jwt.expiration_hours,
        "Session issuer configured"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    let store = Arc::new(PostgresUserStore::new(pg_pool));
    store.migrate().await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let verifier = Arc::new(GoogleIdTokenVerifier::new(
        config.google.jwks_url.clone(),
        config.google.verification_timeout(),
    )?);
    tracing::info!(jwks_url = %config.google.jwks_url, "Google token verifier configured");

    Ok(AuthService::new(
        store,
        verifier,
        session_issuer,
        FederationSettings {
            client_id: config.google.client_id.clone(),
            verification_timeout: config.google.verification_timeout(),
        },
    ))
}
