//! HTTP exchange client for the bot-login endpoints.
//!
//! This module provides the `AuthTransport` seam used by the session
//! manager and `ApiClient`, its `reqwest` implementation. Three endpoints
//! are involved, each a single JSON `POST`:
//! - callback: one-time token -> access + renewal credentials
//! - refresh: renewal credential -> fresh access credential
//! - logout: renewal credential invalidation (reply ignored)

pub mod client;
pub mod error;

use futures::future::BoxFuture;

use crate::models::{LoginGrant, RefreshGrant};

pub use client::ApiClient;
pub use error::ApiError;

/// The three request/response exchanges the session manager needs.
///
/// Every call is a single attempt; implementations must not retry.
pub trait AuthTransport: Send + Sync {
    /// Exchange a one-time bot token at the callback endpoint.
    fn exchange_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<LoginGrant, ApiError>>;

    /// Trade a renewal credential for a fresh access credential.
    fn refresh<'a>(&'a self, refresh_token: &'a str)
        -> BoxFuture<'a, Result<RefreshGrant, ApiError>>;

    /// Ask the server to invalidate a renewal credential.
    fn logout<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;
}
