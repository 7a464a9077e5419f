//! Camera resource fetches.
//!
//! Every fetch requires a session token from the [`CredentialProvider`]; an
//! absent token fails synchronously with [`FetchError::CredentialMissing`]
//! before any network I/O. A failed fetch clears the cached credentials so
//! the next cycle re-authenticates.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use crate::auth::CredentialProvider;
use crate::config::ApiConfig;
use crate::model::{CameraEvent, SessionToken};

/// Error type for resource fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No session token was available; nothing was sent upstream.
    #[error("no session token available; acquire credentials before fetching")]
    CredentialMissing,

    /// The snapshot id failed validation; nothing was sent upstream.
    #[error("invalid snapshot id: {id:?}")]
    InvalidId { id: String },

    /// The request could not be sent or the connection failed.
    #[error("fetch request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("resource endpoint returned {status}")]
    Status { status: StatusCode },

    /// The response body could not be decoded.
    #[error("malformed resource response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Client for the camera's events list and snapshot images.
pub struct ResourceClient {
    http: reqwest::Client,
    config: ApiConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl ResourceClient {
    /// Create a client over the given credential provider.
    pub fn new(config: ApiConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            credentials,
        }
    }

    /// Fetch motion/sound events, optionally bounded by epoch-second
    /// timestamps. Events are returned oldest to newest.
    pub async fn fetch_events(
        &self,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<Vec<CameraEvent>, FetchError> {
        let session = self.session_token().await?;
        self.recovering(self.request_events(&session, start, end))
            .await
    }

    /// Fetch the camera's latest snapshot image.
    pub async fn fetch_latest_snapshot(&self) -> Result<Bytes, FetchError> {
        let session = self.session_token().await?;
        self.recovering(self.request_latest_snapshot(&session)).await
    }

    /// Fetch the snapshot associated with an event id.
    ///
    /// The id is validated before being placed in the URL path; ids outside
    /// `[A-Za-z0-9._-]` are rejected without a request.
    pub async fn fetch_snapshot_by_id(&self, id: &str) -> Result<Bytes, FetchError> {
        validate_snapshot_id(id)?;
        let session = self.session_token().await?;
        self.recovering(self.request_snapshot_by_id(&session, id))
            .await
    }

    async fn session_token(&self) -> Result<SessionToken, FetchError> {
        self.credentials
            .session_token()
            .await
            .ok_or(FetchError::CredentialMissing)
    }

    /// Run a fetch; on failure, clear the cached credentials so the next
    /// tick performs fresh exchanges, then surface the error.
    async fn recovering<T>(
        &self,
        fetch: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        match fetch.await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, "resource fetch failed; clearing cached credentials");
                self.credentials.reset().await;
                Err(err)
            }
        }
    }

    async fn request_events(
        &self,
        session: &SessionToken,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<Vec<CameraEvent>, FetchError> {
        let url = format!(
            "{}/cuepoint/{}/2",
            self.api_base(),
            self.config.camera_id
        );

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(start) = start {
            query.push(("start_time", start.to_string()));
        }
        if let Some(end) = end {
            query.push(("end_time", end.to_string()));
        }

        let mut request = self.http.get(url).header(
            reqwest::header::AUTHORIZATION,
            format!("Basic {}", session.expose()),
        );
        if !query.is_empty() {
            request = request.query(&query);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        response.json().await.map_err(FetchError::Decode)
    }

    async fn request_latest_snapshot(
        &self,
        session: &SessionToken,
    ) -> Result<Bytes, FetchError> {
        let url = format!("{}/get_image", self.api_base());

        let response = self
            .http
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", session.expose()),
            )
            .query(&[("uuid", self.config.camera_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        response.bytes().await.map_err(FetchError::Decode)
    }

    async fn request_snapshot_by_id(
        &self,
        session: &SessionToken,
        id: &str,
    ) -> Result<Bytes, FetchError> {
        let url = format!(
            "{}/event_snapshot/{}/{}",
            self.api_base(),
            self.config.camera_id,
            id
        );

        let response = self
            .http
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", session.expose()),
            )
            .query(&[("crop_type", "timeline"), ("width", "300")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        response.bytes().await.map_err(FetchError::Decode)
    }

    fn api_base(&self) -> &str {
        self.config
            .endpoints
            .api_base_url
            .as_str()
            .trim_end_matches('/')
    }
}

fn validate_snapshot_id(id: &str) -> Result<(), FetchError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidId { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_id_accepts_safe_characters() {
        assert!(validate_snapshot_id("evt-42_a.b").is_ok());
        assert!(validate_snapshot_id("1700000000").is_ok());
    }

    #[test]
    fn test_snapshot_id_rejects_path_traversal() {
        assert!(matches!(
            validate_snapshot_id("../../admin"),
            Err(FetchError::InvalidId { .. })
        ));
        assert!(matches!(
            validate_snapshot_id("a/b"),
            Err(FetchError::InvalidId { .. })
        ));
        assert!(matches!(
            validate_snapshot_id(""),
            Err(FetchError::InvalidId { .. })
        ));
        assert!(matches!(
            validate_snapshot_id("evt?x=1"),
            Err(FetchError::InvalidId { .. })
        ));
    }
}
