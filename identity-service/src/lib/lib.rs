pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod outbound;
pub mod telemetry;

pub use domain::authentication;
pub use domain::user;
pub use outbound::identity;
pub use outbound::repositories;
