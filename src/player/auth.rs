//! Spotify authorization-code flow with an in-memory token store.
//!
//! Tokens only live as long as the process. A refresh token handed in through
//! configuration seeds the store so the service can run without a browser
//! login.

use crate::error::{Error, Result};
use rand::{distr::Alphanumeric, Rng};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
pub const SCOPES: &str = "user-read-currently-playing user-read-playback-position";

/// Tokens are treated as stale this long before Spotify says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const STATE_LEN: usize = 24;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct Token {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

impl Token {
    fn from_response(resp: TokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: resp.access_token,
            // Refresh responses usually omit the refresh token; keep the old one
            refresh_token: resp.refresh_token.or(previous_refresh),
            expires_at: Instant::now() + Duration::from_secs(resp.expires_in),
        }
    }

    fn is_fresh(&self) -> bool {
        !self.access_token.is_empty() && Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

pub struct SpotifyAuth {
    client: Client,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token: Mutex<Option<Token>>,
    pending_state: Mutex<Option<String>>,
}

impl SpotifyAuth {
    pub fn new(
        client: Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client,
            accounts_base: ACCOUNTS_BASE.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token: Mutex::new(None),
            pending_state: Mutex::new(None),
        }
    }

    /// Point at a different accounts host (tests, proxies).
    pub fn with_accounts_base(mut self, base: impl Into<String>) -> Self {
        self.accounts_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Seed the store with a long-lived refresh token. The first call to
    /// [`access_token`](Self::access_token) exchanges it.
    pub fn with_refresh_token(self, refresh_token: impl Into<String>) -> Self {
        let seeded = Token {
            access_token: String::new(),
            refresh_token: Some(refresh_token.into()),
            expires_at: Instant::now(),
        };
        Self {
            token: Mutex::new(Some(seeded)),
            ..self
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub async fn is_connected(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| t.is_fresh() || t.refresh_token.is_some())
    }

    /// Build the authorize URL and remember its `state` for the callback.
    pub async fn authorize_url(&self) -> Result<Url> {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();

        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| Error::config(format!("invalid accounts URL: {}", e)))?;

        *self.pending_state.lock().await = Some(state);
        Ok(url)
    }

    /// Finish the login started by [`authorize_url`](Self::authorize_url).
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<()> {
        // The state is single-use, whatever the outcome
        let expected = self.pending_state.lock().await.take();
        if expected.as_deref() != Some(state) {
            return Err(Error::Auth("login state does not match, start again from /login".into()));
        }

        let resp = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;

        *self.token.lock().await = Some(Token::from_response(resp, None));
        info!("Spotify account connected");
        Ok(())
    }

    /// A usable access token, refreshing it first if needed.
    pub async fn access_token(&self) -> Result<String> {
        // Held across the refresh so concurrent polls refresh only once
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = guard
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or(Error::NotAuthorized)?;

        debug!("Refreshing Spotify access token");
        let resp = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await?;

        let token = Token::from_response(resp, Some(refresh_token));
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let resp = self
            .client
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("{}: {}", status, body.trim())));
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> SpotifyAuth {
        SpotifyAuth::new(
            Client::new(),
            "client-id",
            "client-secret",
            "http://127.0.0.1:5002/callback",
        )
    }

    #[tokio::test]
    async fn test_authorize_url_carries_scopes_and_state() {
        let auth = auth();
        let url = auth.authorize_url().await.unwrap();

        assert_eq!(url.path(), "/authorize");
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], SCOPES);
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:5002/callback");
        assert_eq!(params["state"].len(), STATE_LEN);
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_state() {
        let auth = auth();
        auth.authorize_url().await.unwrap();

        let err = auth.complete_login("code", "forged").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_no_token_means_not_authorized() {
        let auth = auth();
        assert!(!auth.is_connected().await);
        assert!(matches!(auth.access_token().await, Err(Error::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_seeded_refresh_token_counts_as_connected() {
        let auth = auth().with_refresh_token("refresh");
        assert!(auth.is_connected().await);
    }

    #[test]
    fn test_token_freshness() {
        let token = Token::from_response(
            TokenResponse {
                access_token: "abc".into(),
                expires_in: 3600,
                refresh_token: None,
            },
            Some("old-refresh".into()),
        );
        assert!(token.is_fresh());
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));

        let nearly_expired = Token {
            expires_at: Instant::now() + Duration::from_secs(30),
            ..token
        };
        assert!(!nearly_expired.is_fresh());
    }
}
