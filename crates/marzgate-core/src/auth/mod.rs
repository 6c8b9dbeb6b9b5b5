//! Token lifecycle for the panel API.
//!
//! This module provides:
//! - `Credential`: a bearer token with a client-side expiry
//! - `TokenCache`: the shared, single-flight holder of the current credential
//! - `Clock`: the time source expiry is measured against
//!
//! Credentials live only in process memory and are reacquired after restart.

pub mod clock;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{Credential, TokenCache, DEFAULT_TOKEN_TTL_SECS};
