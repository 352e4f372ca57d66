//! Data models for the bot-link login exchange.
//!
//! This module contains the user profile returned by the auth server and
//! the token grants carried in the callback and renewal replies.

pub mod grant;
pub mod user;

pub use grant::{LoginGrant, RefreshGrant};
pub use user::UserProfile;
