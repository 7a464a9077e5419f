//! API configuration.
//!
//! All secrets and endpoint locations are injected here at construction
//! time; the library never reads the process environment itself. The
//! defaults point at the production vendor endpoints.

use url::Url;

use crate::model::Secret;

/// Default OAuth token endpoint (refresh-token grant).
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Default session token endpoint.
pub const DEFAULT_SESSION_TOKEN_URL: &str =
    "https://nestauthproxyservice-pa.googleapis.com/v1/issue_jwt";

/// Default base URL of the camera resource API.
pub const DEFAULT_API_BASE_URL: &str = "https://nexusapi-us1.camera.home.nest.com";

/// Default policy id sent with the session token exchange.
pub const DEFAULT_POLICY_ID: &str = "authproxy-oauth-policy";

/// The three endpoint locations the client talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// OAuth token endpoint (form-encoded POST).
    pub oauth_token_url: Url,

    /// Session token endpoint (JSON POST, bearer auth).
    pub session_token_url: Url,

    /// Base URL for events and snapshot fetches.
    pub api_base_url: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            oauth_token_url: Url::parse(DEFAULT_OAUTH_TOKEN_URL)
                .expect("default OAuth token URL is valid"),
            session_token_url: Url::parse(DEFAULT_SESSION_TOKEN_URL)
                .expect("default session token URL is valid"),
            api_base_url: Url::parse(DEFAULT_API_BASE_URL)
                .expect("default API base URL is valid"),
        }
    }
}

/// Configuration for one camera on one account.
///
/// # Example
///
/// ```
/// use camfeed_core::ApiConfig;
///
/// let config = ApiConfig::new("api-key", "client-id", "refresh-token", "camera-uuid")
///     .with_policy_id("authproxy-oauth-policy");
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Endpoint locations.
    pub endpoints: Endpoints,

    /// Vendor API key sent with the session token exchange.
    pub api_key: Secret,

    /// OAuth client id.
    pub client_id: String,

    /// Long-lived refresh credential.
    pub refresh_token: Secret,

    /// Policy id sent with the session token exchange.
    pub policy_id: String,

    /// Identifier of the camera whose feeds are polled.
    pub camera_id: String,
}

impl ApiConfig {
    /// Create a configuration with default endpoints and policy id.
    pub fn new(
        api_key: impl Into<String>,
        client_id: impl Into<String>,
        refresh_token: impl Into<String>,
        camera_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoints: Endpoints::default(),
            api_key: Secret::new(api_key),
            client_id: client_id.into(),
            refresh_token: Secret::new(refresh_token),
            policy_id: DEFAULT_POLICY_ID.to_string(),
            camera_id: camera_id.into(),
        }
    }

    /// Override the endpoint locations (tests point these at a mock server).
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override the session exchange policy id.
    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = policy_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_parse() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.oauth_token_url.as_str(), DEFAULT_OAUTH_TOKEN_URL);
        assert_eq!(
            endpoints.session_token_url.as_str(),
            DEFAULT_SESSION_TOKEN_URL
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = ApiConfig::new("key", "client", "refresh", "cam-1");
        assert_eq!(config.policy_id, DEFAULT_POLICY_ID);
        assert_eq!(config.camera_id, "cam-1");
        assert_eq!(config.api_key.expose(), "key");
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = ApiConfig::new("key-value", "client", "refresh-value", "cam-1");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("key-value"));
        assert!(!debug.contains("refresh-value"));
    }
}
