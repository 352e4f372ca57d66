//! Session lifecycle for the bot-link login flow.
//!
//! This module provides:
//! - `SessionManager`: login, silent renewal, restore-on-start and logout
//! - `RenewalStore`: durable storage for the single renewal credential
//!   (`KeyringStore`, `FileStore`, `MemoryStore`)
//! - `RenewalTimer`: the one cancelable pending renewal
//!
//! Access tokens live only in memory; the renewal token is persisted and
//! re-establishes the session after a restart.

pub mod credentials;
pub mod link;
pub mod manager;
pub mod session;
pub mod store;
pub mod timer;

pub use credentials::KeyringStore;
pub use link::{deep_link, LinkOpener, SystemBrowser};
pub use manager::{AuthChangeObserver, SessionManager, SessionManagerBuilder};
pub use session::Session;
pub use store::{FileStore, MemoryStore, RenewalStore, REFRESH_TOKEN_KEY};
pub use timer::{renewal_delay, RenewalTimer};
