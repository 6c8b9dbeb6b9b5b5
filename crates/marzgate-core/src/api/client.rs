//! API client for the Marzban panel REST API.
//!
//! This module provides the `SessionClient` struct, which caches an admin
//! bearer token and issues authenticated requests for users, nodes and
//! system statistics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{Clock, SystemClock, TokenCache};
use crate::config::ClientConfig;
use crate::models::{merge_user_fields, new_user_defaults, username_of, UserFields, UsersQuery};

use super::endpoint::{user_path, Endpoint};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Admin token endpoint (OAuth2 password grant)
const TOKEN_PATH: &str = "/api/admin/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// API client for a Marzban panel.
/// Clone is cheap and clones share the cached token and connection pool.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    tokens: Arc<TokenCache>,
}

impl SessionClient {
    /// Create a new client using the system clock
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new client measuring token expiry against `clock`
    pub fn with_clock(config: &ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let ttl = chrono::Duration::try_seconds(config.token_ttl_secs)
            .ok_or_else(|| anyhow::anyhow!("Token TTL out of range: {}", config.token_ttl_secs))?;
        info!(base_url = %config.base_url, "Panel client initialized");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            tokens: Arc::new(TokenCache::new(clock, ttl)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ===== Token Lifecycle =====

    /// Whether a cached token exists and has not passed its assumed expiry
    pub async fn is_token_valid(&self) -> bool {
        self.tokens.is_valid().await
    }

    /// Expiry of the cached token, if one is held
    pub async fn token_expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.tokens.expires_at().await
    }

    /// Authenticate now, replacing any cached token
    pub async fn acquire_token(&self) -> Result<(), ApiError> {
        self.tokens.invalidate().await;
        self.tokens
            .get_or_acquire(|| self.request_token())
            .await
            .map(|_| ())
    }

    async fn request_token(&self) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        debug!(url = %url, "Requesting admin token");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token request rejected");
            return Err(ApiError::Authentication(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Authentication(format!("malformed token response: {e}")))?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                info!("Obtained admin access token");
                Ok(token)
            }
            _ => Err(ApiError::Authentication(
                "token response has no access_token".to_string(),
            )),
        }
    }

    // ===== Request Execution =====

    /// Perform an authenticated call, re-authenticating and retrying once on 401.
    pub async fn execute<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, ApiError> {
        let token = self.tokens.get_or_acquire(|| self.request_token()).await?;
        let response = self.send(endpoint, &token).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::decode(endpoint, response).await;
        }

        warn!(method = %endpoint.method, path = %endpoint.path, "Token rejected, re-authenticating");
        let token = self
            .tokens
            .replace_rejected(&token, || self.request_token())
            .await?;

        let response = self.send(endpoint, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // Fresh token rejected too; don't keep trusting it.
            self.tokens.discard(&token).await;
        }
        Self::decode(endpoint, response).await
    }

    async fn send(&self, endpoint: &Endpoint, token: &str) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint.path);
        debug!(method = %endpoint.method, url = %url, "Sending request");

        let mut request = self
            .client
            .request(endpoint.method.clone(), &url)
            .bearer_auth(token);
        if !endpoint.query.is_empty() {
            request = request.query(&endpoint.query);
        }
        if let Some(ref body) = endpoint.body {
            request = request.json(body);
        }

        request.send().await.map_err(ApiError::Connectivity)
    }

    /// Map an error status to `Remote`, otherwise parse the body as JSON.
    /// An empty success body parses as `null`.
    async fn decode<T: DeserializeOwned>(endpoint: &Endpoint, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), path = %endpoint.path, "Panel returned error status");
            return Err(ApiError::from_status(status, body));
        }

        let text = response.text().await.map_err(ApiError::Connectivity)?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse(format!("{} {}: {e}", endpoint.method, endpoint.path))
        })
    }

    // ===== User Operations =====

    /// Create a user. `fields` are merged over the new-user defaults and
    /// must include a `username`.
    pub async fn create_user(&self, fields: UserFields) -> Result<Value, ApiError> {
        let payload = merge_user_fields(new_user_defaults(), fields);
        let username = username_of(&payload)
            .ok_or_else(|| ApiError::Validation("username is required".to_string()))?;
        debug!(username = username, "Creating user");

        let endpoint = Endpoint::post("/api/user").with_json(Value::Object(payload));
        self.execute(&endpoint).await
    }

    /// Fetch a user, returning `None` if the panel has no such user
    pub async fn get_user(&self, username: &str) -> Result<Option<Value>, ApiError> {
        let endpoint = Endpoint::get(user_path(require_username(username)?, ""));
        match self.execute(&endpoint).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => {
                debug!(username = username, "User not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Update fields of an existing user
    pub async fn update_user(&self, username: &str, fields: UserFields) -> Result<Value, ApiError> {
        let endpoint = Endpoint::put(user_path(require_username(username)?, ""))
            .with_json(Value::Object(fields));
        self.execute(&endpoint).await
    }

    /// Delete a user. Returns `false` if the user did not exist.
    pub async fn delete_user(&self, username: &str) -> Result<bool, ApiError> {
        let endpoint = Endpoint::delete(user_path(require_username(username)?, ""));
        match self.execute::<Value>(&endpoint).await {
            Ok(_) => {
                info!(username = username, "User deleted");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List one page of users
    pub async fn list_users(&self, query: &UsersQuery) -> Result<Vec<Value>, ApiError> {
        let endpoint = Endpoint::get("/api/users").with_query(query.to_query());
        let response: Value = self.execute(&endpoint).await?;
        Ok(extract_list(response, "users"))
    }

    /// Revoke a user's subscription link and issue a new one
    pub async fn revoke_subscription(&self, username: &str) -> Result<Value, ApiError> {
        let endpoint = Endpoint::post(user_path(require_username(username)?, "/revoke_sub"));
        self.execute(&endpoint).await
    }

    /// Reset a user's used traffic to zero
    pub async fn reset_traffic(&self, username: &str) -> Result<Value, ApiError> {
        let endpoint = Endpoint::post(user_path(require_username(username)?, "/reset_traffic"));
        self.execute(&endpoint).await
    }

    /// Fetch a user's traffic usage per node
    pub async fn get_usage(&self, username: &str) -> Result<Value, ApiError> {
        let endpoint = Endpoint::get(user_path(require_username(username)?, "/usage"));
        self.execute(&endpoint).await
    }

    // ===== System & Nodes =====

    /// Fetch panel-wide system statistics
    pub async fn get_system_stats(&self) -> Result<Value, ApiError> {
        self.execute(&Endpoint::get("/api/system")).await
    }

    /// Fetch all nodes attached to the panel
    pub async fn list_nodes(&self) -> Result<Vec<Value>, ApiError> {
        let response: Value = self.execute(&Endpoint::get("/api/nodes")).await?;
        Ok(extract_list(response, "nodes"))
    }

    /// Fetch a single node by id
    pub async fn get_node(&self, node_id: i64) -> Result<Value, ApiError> {
        self.execute(&Endpoint::get(format!("/api/node/{node_id}"))).await
    }
}

fn require_username(username: &str) -> Result<&str, ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    Ok(username)
}

/// Accept both a bare array and an object wrapping the array under `key`.
fn extract_list(response: Value, key: &str) -> Vec<Value> {
    match response {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => {
                debug!(key = key, "Listing response has no array under key");
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}
