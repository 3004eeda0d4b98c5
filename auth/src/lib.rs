//! Authentication utilities library
//!
//! Provides the domain-agnostic building blocks of the identity service:
//! - Password hashing (Argon2id)
//! - JWT encoding and validation (HS256)
//! - Session token issuing with a fixed lifetime
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! assert!(!hasher.verify("not_my_password", &hash));
//! ```
//!
//! ## Session Tokens
//! ```
//! use auth::SessionIssuer;
//! use chrono::Duration;
//!
//! let issuer = SessionIssuer::new(b"secret_key_at_least_32_bytes_long!", Duration::hours(1))
//!     .unwrap();
//!
//! let issued = issuer.issue("user123", "alice", "User").unwrap();
//! let claims = issuer.validate(&issued.access_token).unwrap();
//! assert_eq!(claims.name, "alice");
//! ```

pub mod issuer;
pub mod jwt;
pub mod password;

pub use issuer::IssuedToken;
pub use issuer::SessionIssuer;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::PasswordError;
pub use password::PasswordHasher;
