use crate::error::RemoteError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use watch_state_models::Owner;

/// Tokens handed over by the auth provider when a sign-in completes.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

/// Auth session against the backend's GoTrue endpoints.
///
/// The embedding application stores tokens here on sign-in and clears them on
/// sign-out. The *owner* is never cached: every `current_owner` call asks the
/// auth endpoint again, refreshing the access token first when it is expired
/// or about to expire.
pub struct Session {
    http: Client,
    base_url: String,
    anon_key: String,
    tokens: RwLock<Option<SessionTokens>>,
}

impl Session {
    pub fn new(http: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            tokens: RwLock::new(None),
        }
    }

    pub async fn set_tokens(&self, tokens: SessionTokens) {
        *self.tokens.write().await = Some(tokens);
    }

    pub async fn clear(&self) {
        *self.tokens.write().await = None;
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// A usable access token, refreshed first if it expires within a minute.
    /// `None` when there is no session or the refresh fails.
    pub async fn access_token(&self) -> Option<String> {
        let current = self.tokens.read().await.clone()?;

        let expiring = current
            .expires_at
            .map(|at| at <= Utc::now() + Duration::minutes(1))
            .unwrap_or(false);
        if !expiring {
            return Some(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token else {
            debug!("Access token expired and no refresh token available");
            return None;
        };

        match self.refresh(&refresh_token).await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                *self.tokens.write().await = Some(fresh);
                info!("Refreshed expired access token");
                Some(token)
            }
            Err(e) => {
                warn!("Token refresh failed, treating session as signed out: {}", e);
                None
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, RemoteError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::from_response(response).await);
        }

        let body: RefreshResponse = response.json().await?;
        Ok(SessionTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: body.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }

    /// Resolve the signed-in owner, or `None` for anonymous sessions.
    ///
    /// Total contract: transport errors, expired sessions, and undecodable
    /// responses all resolve to `None`.
    pub async fn current_owner(&self) -> Option<Owner> {
        let token = self.access_token().await?;

        let response = match self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Owner lookup failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Owner lookup rejected with status {}", response.status());
            return None;
        }

        match response.json::<UserResponse>().await {
            Ok(user) => Some(Owner::new(user.id)),
            Err(e) => {
                debug!("Owner lookup returned undecodable body: {}", e);
                None
            }
        }
    }
}
