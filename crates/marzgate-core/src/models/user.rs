//! User payloads and list queries for the panel's user endpoints.
//!
//! User records are passed through as JSON objects; only the fields the
//! client needs to validate or default are known here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Caller-supplied fields for a user, keyed by panel field name.
pub type UserFields = Map<String, Value>;

/// Default data limit for new users: 1 GiB.
pub const DEFAULT_DATA_LIMIT_BYTES: u64 = 1_073_741_824;

/// Default page size for user listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Account status as reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Disabled,
    Limited,
    Expired,
    OnHold,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
            UserStatus::Limited => "limited",
            UserStatus::Expired => "expired",
            UserStatus::OnHold => "on_hold",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "disabled" => Ok(UserStatus::Disabled),
            "limited" => Ok(UserStatus::Limited),
            "expired" => Ok(UserStatus::Expired),
            "on_hold" => Ok(UserStatus::OnHold),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

/// Pagination and filter for `/api/users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsersQuery {
    pub status: Option<UserStatus>,
    pub offset: u32,
    pub limit: u32,
}

impl Default for UsersQuery {
    fn default() -> Self {
        Self {
            status: None,
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl UsersQuery {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("offset".to_string(), self.offset.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status".to_string(), status.to_string()));
        }
        pairs
    }
}

/// Defaults applied to every new user: VLESS over TCP REALITY, 1 GiB quota
/// with no reset, no expiry, active.
pub fn new_user_defaults() -> UserFields {
    let defaults = json!({
        "proxies": { "vless": { "id": "" } },
        "inbounds": { "vless": ["VLESS TCP REALITY"] },
        "data_limit": DEFAULT_DATA_LIMIT_BYTES,
        "data_limit_reset_strategy": "no_reset",
        "expire": null,
        "status": "active",
        "note": "",
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Shallow merge: every top-level key in `overrides` replaces the default.
pub fn merge_user_fields(mut defaults: UserFields, overrides: UserFields) -> UserFields {
    defaults.extend(overrides);
    defaults
}

/// Extract a non-empty string `username` from user fields.
pub fn username_of(fields: &UserFields) -> Option<&str> {
    fields
        .get("username")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
}
