pub mod google;

pub use google::GoogleIdTokenVerifier;
pub use google::Jwk;
