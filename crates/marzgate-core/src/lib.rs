//! Core library for marzgate.
//!
//! An authenticated client for the Marzban VPN panel REST API. The client
//! obtains an admin token with the configured credentials, caches it for
//! the process lifetime, and transparently re-authenticates when the panel
//! rejects it.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, Endpoint, SessionClient};
pub use auth::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use models::{UserFields, UserStatus, UsersQuery};
