//! Third-party login: authorization redirect, code exchange and user lookup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;

use crate::models::OAuthTokens;

const STATE_TTL: Duration = Duration::from_secs(600);

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the request with status {0}")]
    Status(u16),
    #[error("provider response missing user id")]
    MissingUserId,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
}

impl OAuthConfig {
    /// `None` unless both client id and secret are set.
    pub fn from_env() -> Option<Self> {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());
        let client_id = var("OAUTH_CLIENT_ID")?;
        let client_secret = var("OAUTH_CLIENT_SECRET")?;
        Some(Self {
            provider: var("OAUTH_PROVIDER").unwrap_or_else(|| "kakao".into()),
            client_id,
            client_secret,
            authorize_url: var("OAUTH_AUTHORIZE_URL").unwrap_or_else(|| "https://kauth.kakao.com/oauth/authorize".into()),
            token_url: var("OAUTH_TOKEN_URL").unwrap_or_else(|| "https://kauth.kakao.com/oauth/token".into()),
            userinfo_url: var("OAUTH_USERINFO_URL").unwrap_or_else(|| "https://kapi.kakao.com/v2/user/me".into()),
            redirect_uri: var("OAUTH_REDIRECT_URI")
                .unwrap_or_else(|| "http://localhost:8080/api/v1/auth/oauth/callback".into()),
            scope: var("OAUTH_SCOPE"),
        })
    }

    pub fn authorize_redirect(&self, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
        );
        if let Some(scope) = &self.scope {
            url.push_str(&format!("&scope={}", urlencoding::encode(scope)));
        }
        url
    }

    /// Application user ids are namespaced by provider, e.g. `kakao:12345`.
    pub fn app_user_id(&self, provider_user_id: &str) -> String {
        format!("{}:{}", self.provider, provider_user_id)
    }
}

/// One-shot CSRF `state` values (pod local).
#[derive(Clone, Default)]
pub struct OAuthStateStore {
    pending: Arc<DashMap<String, Instant>>,
}

impl OAuthStateStore {
    pub fn issue(&self) -> String {
        let now = Instant::now();
        self.pending.retain(|_, issued| now.duration_since(*issued) < STATE_TTL);
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.pending.insert(state.clone(), now);
        state
    }

    /// True at most once per issued state, and only before it expires.
    pub fn consume(&self, state: &str) -> bool {
        self.pending
            .remove(state)
            .is_some_and(|(_, issued)| issued.elapsed() < STATE_TTL)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Clone)]
pub struct OAuthClient {
    cfg: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(cfg: OAuthConfig) -> Self {
        Self { cfg, http: reqwest::Client::new() }
    }

    pub fn config(&self) -> &OAuthConfig { &self.cfg }

    /// Exchanges an authorization code and resolves the provider account.
    /// Returns the tokens keyed by the application user id.
    pub async fn complete_login(&self, code: &str) -> Result<OAuthTokens, OAuthError> {
        let resp = self
            .http
            .post(&self.cfg.token_url)
            .form(&[
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.cfg.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Status(resp.status().as_u16()));
        }
        let token: TokenResponse = resp.json().await?;

        let resp = self.http.get(&self.cfg.userinfo_url).bearer_auth(&token.access_token).send().await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Status(resp.status().as_u16()));
        }
        let user: serde_json::Value = resp.json().await?;
        let provider_id = match user.get("id") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(OAuthError::MissingUserId),
        };

        Ok(OAuthTokens {
            user_id: self.cfg.app_user_id(&provider_id),
            provider: self.cfg.provider.clone(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|s| Utc::now() + chrono::Duration::seconds(s)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_single_use() {
        let store = OAuthStateStore::default();
        let s = store.issue();
        assert!(store.consume(&s));
        assert!(!store.consume(&s));
        assert!(!store.consume("never-issued"));
    }
}
