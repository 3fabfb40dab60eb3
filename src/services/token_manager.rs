/// Token Manager
/// Owns the OAuth access token for one upstream integration: refresh-token
/// exchange, in-memory reuse, and transparent refresh once stale.
use super::transport::{HttpTransport, UpstreamRequest};
use crate::config::CredentialSet;
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Upstream tokens last an hour; refresh five minutes early.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);

pub const AUTH_SCHEME: &str = "Zoho-oauthtoken";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    fn issued_now(value: String) -> Self {
        Self {
            value,
            expires_at: Instant::now() + TOKEN_LIFETIME,
        }
    }

    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Token endpoint response. The endpoint answers 200 with an `error` field
/// when the refresh token is rejected.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

pub struct TokenManager {
    service: &'static str,
    credentials: CredentialSet,
    transport: Arc<dyn HttpTransport>,
    token: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(
        service: &'static str,
        credentials: CredentialSet,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            service,
            credentials,
            transport,
            token: RwLock::new(None),
        }
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    /// Return the cached token while it is valid, otherwise refresh.
    ///
    /// Concurrent callers that find the token stale may each refresh; the
    /// refresh token is reusable so the only cost is an extra upstream call.
    pub async fn ensure_valid_token(&self) -> AppResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_valid()) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.refresh().await?;
        let value = fresh.value.clone();
        *self.token.write().await = Some(fresh);
        Ok(value)
    }

    /// `Authorization` header value with a valid token.
    pub async fn authorization(&self) -> AppResult<String> {
        let token = self.ensure_valid_token().await?;
        Ok(format!("{} {}", AUTH_SCHEME, token))
    }

    async fn refresh(&self) -> AppResult<AccessToken> {
        debug!("Refreshing {} access token", self.service);

        let request = UpstreamRequest::post(format!(
            "{}/oauth/v2/token",
            self.credentials.accounts_domain
        ))
        .query("refresh_token", self.credentials.refresh_token.as_str())
        .query("client_id", self.credentials.client_id.as_str())
        .query("client_secret", self.credentials.client_secret.as_str())
        .query("grant_type", "refresh_token");

        let response = self.transport.execute(request).await.map_err(|e| {
            error!("Error getting {} access token: {}", self.service, e);
            self.auth_error()
        })?;

        if !response.is_success() {
            error!(
                "Error getting {} access token: {} - {}",
                self.service,
                response.status,
                response.json_value()
            );
            return Err(self.auth_error());
        }

        let parsed: TokenResponse = response.json().map_err(|_| self.auth_error())?;
        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                info!("Obtained new {} access token", self.service);
                Ok(AccessToken::issued_now(token))
            }
            None => {
                error!(
                    "{} token endpoint returned no access token: {}",
                    self.service,
                    parsed.error.as_deref().unwrap_or("unknown error")
                );
                Err(self.auth_error())
            }
        }
    }

    fn auth_error(&self) -> AppError {
        AppError::Auth(format!("Failed to authenticate with {}", self.service))
    }
}
