//! # Camfeed Core
//!
//! Client library for a Nest camera's cloud API.
//!
//! This crate provides:
//! - The credential lifecycle: exchanging a long-lived refresh token for a
//!   short-lived access token, then deriving a vendor session token from it,
//!   with lazy caching and forced re-acquisition on failure
//! - A resource client for the camera's events list and snapshot images
//! - Timer-driven multicast feeds that share one upstream fetch per tick
//!   among any number of subscribers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use camfeed_core::{ApiConfig, CredentialStore, FeedHub, ResourceClient, TokenExchanger};
//!
//! let config = ApiConfig::new("api-key", "client-id", "refresh-token", "camera-uuid");
//! let credentials = Arc::new(CredentialStore::new(TokenExchanger::new(config.clone())));
//! let resource = Arc::new(ResourceClient::new(config, credentials));
//! let hub = FeedHub::new(resource);
//!
//! let mut events = hub.subscribe_events();
//! while let Some(item) = events.recv().await {
//!     println!("camera event: {:?}", item);
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod resource;

// Re-export commonly used types at crate root
pub use config::{ApiConfig, Endpoints};

pub use model::{
    AccessToken,
    CameraEvent,
    Secret,
    SessionToken,
};

pub use auth::{
    CredentialProvider,
    CredentialStore,
    ExchangeError,
    TokenExchanger,
};

pub use resource::{
    FetchError,
    ResourceClient,
};

pub use feed::{
    FeedError,
    FeedHub,
    FeedOptions,
    FeedSubscription,
};

pub use error::CamfeedError;
