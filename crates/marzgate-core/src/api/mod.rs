//! REST API client module for the Marzban panel.
//!
//! This module provides the `SessionClient` for managing users, nodes and
//! system statistics on a panel.
//!
//! The panel uses bearer tokens obtained from its admin token endpoint.
//! Every call goes through `SessionClient::execute`, which attaches the
//! cached token and recovers once from a 401 by re-authenticating.

pub mod client;
pub mod endpoint;
pub mod error;

pub use client::SessionClient;
pub use endpoint::Endpoint;
pub use error::ApiError;
