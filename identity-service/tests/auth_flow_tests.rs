mod common;

use std::sync::Arc;

use common::register_command;
use common::GoogleClaims;
use common::TestApp;
use futures::future::join_all;
use identity_service::authentication::errors::AuthError;
use identity_service::authentication::models::Credentials;
use identity_service::authentication::ports::AuthServicePort;
use identity_service::user::models::EmailAddress;
use identity_service::user::models::Role;
use identity_service::user::models::Username;
use identity_service::user::ports::UserStore;

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new();

    let registered = app
        .service
        .register(register_command("alice", "alice@x.com", "secret1"))
        .await
        .expect("Registration failed");

    assert_eq!(registered.username, "alice");
    assert_eq!(registered.role, Role::User);

    let wrong = app
        .service
        .authenticate_with_password(Credentials::new("alice", "wrong"))
        .await;
    assert_eq!(wrong, Err(AuthError::InvalidCredentials));

    let login = app
        .service
        .authenticate_with_password(Credentials::new("alice", "secret1"))
        .await
        .expect("Login failed");

    assert_ne!(login.token, registered.token);

    let first = app.service.validate_session_token(&registered.token).unwrap();
    let second = app.service.validate_session_token(&login.token).unwrap();
    assert_eq!(first.sub, second.sub);
    assert_eq!(first.name, second.name);
    assert_eq!(second.role, Role::User.as_str());
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_alike() {
    let app = TestApp::new();
    app.service
        .register(register_command("alice", "alice@x.com", "secret1"))
        .await
        .unwrap();

    let unknown = app
        .service
        .authenticate_with_password(Credentials::new("nobody", "secret1"))
        .await;
    let wrong = app
        .service
        .authenticate_with_password(Credentials::new("alice", "secret2"))
        .await;

    assert_eq!(unknown, wrong);
    assert_eq!(unknown, Err(AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_register_existing_username_leaves_record_unchanged() {
    let app = TestApp::new();
    app.service
        .register(register_command("alice", "alice@x.com", "secret1"))
        .await
        .unwrap();

    let username = Username::new("alice".to_string()).unwrap();
    let before = app.store.find_by_username(&username).await.unwrap();

    let result = app
        .service
        .register(register_command("alice", "imposter@x.com", "hijacked"))
        .await;
    assert_eq!(result, Err(AuthError::UsernameTaken("alice".to_string())));

    let after = app.store.find_by_username(&username).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(app.store.len(), 1);

    // The original password still works, the second one never took.
    assert!(app
        .service
        .authenticate_with_password(Credentials::new("alice", "secret1"))
        .await
        .is_ok());
    assert_eq!(
        app.service
            .authenticate_with_password(Credentials::new("alice", "hijacked"))
            .await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_one_winner() {
    let app = TestApp::new();
    let attempts = 8;

    let handles = (0..attempts).map(|i| {
        let service = Arc::clone(&app.service);
        tokio::spawn(async move {
            service
                .register(register_command(
                    "carol",
                    &format!("carol{i}@x.com"),
                    "secret1",
                ))
                .await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("Registration task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let taken = results
        .iter()
        .filter(|r| **r == Err(AuthError::UsernameTaken("carol".to_string())))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(taken, attempts - 1);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_federated_login_creates_user_once() {
    let app = TestApp::new();
    let token = GoogleClaims::for_email("bob@x.com").sign();

    let first = app
        .service
        .authenticate_with_federated_provider(&token)
        .await
        .expect("First federated login failed");
    assert_eq!(first.username, "bob");
    assert_eq!(first.role, Role::User);
    assert_eq!(app.store.len(), 1);

    let second = app
        .service
        .authenticate_with_federated_provider(&token)
        .await
        .expect("Second federated login failed");
    assert_eq!(second.username, "bob");
    assert_eq!(app.store.len(), 1);

    let email = EmailAddress::new("bob@x.com".to_string()).unwrap();
    let stored = app.store.find_by_email(&email).await.unwrap().unwrap();
    assert!(!stored.has_password());
}

#[tokio::test]
async fn test_federated_user_cannot_log_in_with_password() {
    let app = TestApp::new();
    let token = GoogleClaims::for_email("bob@x.com").sign();
    app.service
        .authenticate_with_federated_provider(&token)
        .await
        .unwrap();

    let result = app
        .service
        .authenticate_with_password(Credentials::new("bob", ""))
        .await;
    assert_eq!(result, Err(AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_federated_username_avoids_existing_names() {
    let app = TestApp::new();
    app.service
        .register(register_command("bob", "bob@other.com", "secret1"))
        .await
        .unwrap();

    let token = GoogleClaims::for_email("bob@x.com").sign();
    let result = app
        .service
        .authenticate_with_federated_provider(&token)
        .await
        .unwrap();

    assert_eq!(result.username, "bob1");
    assert_eq!(app.store.len(), 2);
}

#[tokio::test]
async fn test_federated_login_reuses_registered_account() {
    let app = TestApp::new();
    let registered = app
        .service
        .register(register_command("alice", "alice@x.com", "secret1"))
        .await
        .unwrap();

    let token = GoogleClaims::for_email("alice@x.com").sign();
    let federated = app
        .service
        .authenticate_with_federated_provider(&token)
        .await
        .unwrap();

    assert_eq!(federated.username, "alice");
    assert_eq!(app.store.len(), 1);

    let registered_claims = app.service.validate_session_token(&registered.token).unwrap();
    let federated_claims = app.service.validate_session_token(&federated.token).unwrap();
    assert_eq!(registered_claims.sub, federated_claims.sub);
}

#[tokio::test]
async fn test_federated_audience_mismatch() {
    let app = TestApp::new();
    let mut claims = GoogleClaims::for_email("bob@x.com");
    claims.aud = "someone-else.apps.googleusercontent.com".to_string();

    let result = app
        .service
        .authenticate_with_federated_provider(&claims.sign())
        .await;

    assert_eq!(result, Err(AuthError::InvalidFederatedToken));
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_federated_expired_token() {
    let app = TestApp::new();
    let mut claims = GoogleClaims::for_email("bob@x.com");
    claims.exp = chrono::Utc::now().timestamp() - 60;

    let result = app
        .service
        .authenticate_with_federated_provider(&claims.sign())
        .await;

    assert_eq!(result, Err(AuthError::InvalidFederatedToken));
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_federated_email_longer_than_column() {
    let app = TestApp::new();
    let label = "b".repeat(60);
    let email = format!("{}@{label}.{label}.{label}.{label}.com", "a".repeat(64));
    let token = GoogleClaims::for_email(&email).sign();

    let result = app.service.authenticate_with_federated_provider(&token).await;

    assert_eq!(result, Err(AuthError::InvalidFederatedToken));
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_federated_garbage_token() {
    let app = TestApp::new();

    let result = app
        .service
        .authenticate_with_federated_provider("definitely-not-a-jwt")
        .await;

    assert_eq!(result, Err(AuthError::InvalidFederatedToken));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_federated_logins_create_one_user() {
    let app = TestApp::new();
    let token = GoogleClaims::for_email("bob@x.com").sign();

    let handles = (0..2).map(|_| {
        let service = Arc::clone(&app.service);
        let token = token.clone();
        tokio::spawn(async move { service.authenticate_with_federated_provider(&token).await })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            joined
                .expect("Federated login task panicked")
                .expect("Federated login failed")
        })
        .collect();

    assert_eq!(app.store.len(), 1);

    let subjects: Vec<_> = results
        .iter()
        .map(|r| {
            assert_eq!(r.username, "bob");
            app.service.validate_session_token(&r.token).unwrap().sub
        })
        .collect();
    assert_eq!(subjects[0], subjects[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_federated_logins_distinct_emails_same_local_part() {
    let app = TestApp::new();
    let emails = ["dave@a.com", "dave@b.com", "dave@c.com"];

    let handles = emails.iter().map(|email| {
        let service = Arc::clone(&app.service);
        let token = GoogleClaims::for_email(email).sign();
        tokio::spawn(async move { service.authenticate_with_federated_provider(&token).await })
    });

    let mut usernames: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().map(|r| r.username))
        .collect::<Result<_, _>>()
        .expect("Federated login failed");
    usernames.sort();
    usernames.dedup();

    assert_eq!(usernames.len(), emails.len());
    assert_eq!(app.store.len(), emails.len());
}

#[tokio::test]
async fn test_session_token_from_other_key_rejected() {
    let app = TestApp::new();
    let foreign = auth::SessionIssuer::new(
        b"another-secret-key-that-is-at-least-32-bytes",
        chrono::Duration::hours(1),
    )
    .unwrap();
    let issued = foreign.issue("user-1", "alice", "User").unwrap();

    assert_eq!(
        app.service.validate_session_token(&issued.access_token),
        Err(AuthError::InvalidSessionToken)
    );

    let own = app.session_issuer.issue("user-1", "alice", "User").unwrap();
    assert!(app.service.validate_session_token(&own.access_token).is_ok());
}
