//! Credential lifecycle.
//!
//! Two layers, composed rather than inherited:
//! - [`exchange`] - The two outbound token exchanges (refresh credential to
//!   access token, access token to session token)
//! - [`store`] - Lazy memoization of both tokens plus the
//!   [`CredentialProvider`] seam the resource client consumes

pub mod exchange;
pub mod store;

pub use exchange::{ExchangeError, TokenExchanger};
pub use store::{CredentialProvider, CredentialStore};
