//! Token exchange requests.
//!
//! Two independent exchanges, each a single outbound HTTP request with no
//! retry and no timeout override:
//! - Refresh exchange: form-encoded POST to the OAuth token endpoint
//! - Session exchange: JSON POST to the session token endpoint, authorized
//!   by the freshly obtained access token

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::ApiConfig;
use crate::model::{AccessToken, SessionToken};

/// Header carrying the vendor API key on the session exchange.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Lifetime requested for issued session tokens.
const SESSION_EXPIRE_AFTER: &str = "3600s";

/// Error type for token exchange operations.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The request could not be sent or the connection failed.
    #[error("exchange request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("exchange endpoint returned {status}")]
    Status { status: StatusCode },

    /// The response body did not contain the expected token field.
    #[error("malformed exchange response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct RefreshGrant {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SessionGrant {
    jwt: String,
}

/// Performs the two token exchanges against the vendor endpoints.
///
/// Stateless apart from the shared HTTP connection pool; caching lives in
/// [`CredentialStore`](crate::auth::CredentialStore).
pub struct TokenExchanger {
    http: reqwest::Client,
    config: ApiConfig,
}

impl TokenExchanger {
    /// Create an exchanger with a fresh HTTP client.
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create an exchanger reusing an existing HTTP client.
    pub fn with_http_client(config: ApiConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    /// Exchange the long-lived refresh credential for an access token.
    ///
    /// Form-encoded POST carrying `refresh_token`, `client_id`, and
    /// `grant_type=refresh_token`.
    pub async fn exchange_refresh_token(&self) -> Result<AccessToken, ExchangeError> {
        let params = [
            ("refresh_token", self.config.refresh_token.expose()),
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(self.config.endpoints.oauth_token_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::Status { status });
        }

        let grant: RefreshGrant = response.json().await.map_err(ExchangeError::Decode)?;

        debug!("obtained fresh access token");
        Ok(AccessToken::new(grant.access_token))
    }

    /// Exchange an access token for a vendor session token.
    ///
    /// JSON POST authorized with `Authorization: Bearer <access>` plus the
    /// API-key header; the access token is embedded in the body as well.
    pub async fn exchange_session_token(
        &self,
        access: &AccessToken,
    ) -> Result<SessionToken, ExchangeError> {
        let body = serde_json::json!({
            "embed_google_oauth_access_token": true,
            "expire_after": SESSION_EXPIRE_AFTER,
            "google_oauth_access_token": access.expose(),
            "policy_id": self.config.policy_id,
        });

        let response = self
            .http
            .post(self.config.endpoints.session_token_url.clone())
            .bearer_auth(access.expose())
            .header(API_KEY_HEADER, self.config.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::Status { status });
        }

        let grant: SessionGrant = response.json().await.map_err(ExchangeError::Decode)?;

        debug!("obtained fresh session token");
        Ok(SessionToken::new(grant.jwt))
    }
}
