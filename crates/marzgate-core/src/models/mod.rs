//! Data models for the panel API.
//!
//! Records returned by the panel are kept as `serde_json::Value` and handed
//! to callers verbatim. This module holds the request-side shapes:
//!
//! - `UserFields`: caller-supplied fields for create/update
//! - `UsersQuery`, `UserStatus`: listing filter and pagination

pub mod user;

pub use user::{
    merge_user_fields, new_user_defaults, username_of, UserFields, UserStatus, UsersQuery,
    DEFAULT_DATA_LIMIT_BYTES, DEFAULT_PAGE_LIMIT,
};
