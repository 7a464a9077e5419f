//! Top-level error type for Camfeed.

use thiserror::Error;

use crate::auth::ExchangeError;
use crate::feed::FeedError;
use crate::resource::FetchError;

/// Top-level error type encompassing all Camfeed errors.
#[derive(Debug, Error)]
pub enum CamfeedError {
    /// Error from a token exchange.
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Error from a resource fetch.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Error delivered by a feed.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}
