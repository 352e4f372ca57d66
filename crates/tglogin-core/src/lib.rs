//! Client-side sessions for logging in through a messaging bot.
//!
//! The user opens a bot deep link, the bot hands out a one-time token, and
//! the callback exchanges it for a short-lived access token plus a renewal
//! token. [`SessionManager`] keeps the access token fresh in the background
//! and restores the session from the stored renewal token on start.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthTransport};
pub use auth::{
    FileStore, KeyringStore, LinkOpener, MemoryStore, RenewalStore, Session, SessionManager,
    SystemBrowser,
};
pub use config::{ApiUrls, AuthConfig};
pub use models::{LoginGrant, RefreshGrant, UserProfile};
