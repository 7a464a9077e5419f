//! Domain model types for Camfeed.
//!
//! This module defines the types passed between the credential layer, the
//! resource client, and the feeds:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`AccessToken`] - Short-lived bearer credential from the identity provider
//! - [`SessionToken`] - Second-stage credential scoped to the camera API
//! - [`CameraEvent`] - One motion/sound event record, passed through opaquely

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the backing memory is zeroed on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Short-lived access token obtained from the OAuth refresh exchange.
///
/// Owned exclusively by the credential store; invalidated only by an
/// explicit reset, never by local expiry tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(Secret);

impl AccessToken {
    /// Wrap a raw access token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token))
    }

    /// Expose the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

/// Vendor session token derived from an [`AccessToken`].
///
/// Authorizes requests against the camera's resource API. Same invalidation
/// policy as the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(Secret);

impl SessionToken {
    /// Wrap a raw session token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token))
    }

    /// Expose the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

/// One motion/sound event record as returned by the vendor.
///
/// The attributes are opaque to this crate; the record is carried as parsed
/// JSON and handed to subscribers unchanged. The vendor returns events
/// oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraEvent(serde_json::Value);

impl CameraEvent {
    /// Wrap a parsed event record.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON record.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consume the event and return the underlying JSON record.
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// Look up a top-level attribute by name.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl From<serde_json::Value> for CameraEvent {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}
