use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::UserProfile;

/// In-memory session state. Never persisted; only the renewal credential
/// outlives the process.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Session {
    #[serde(skip)]
    pub access_token: Option<String>,
    pub user: Option<UserProfile>,
    /// When `access_token` stops being valid, per the server's `expires_in`
    pub expires_at: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            access_token: None,
            user: None,
            expires_at: None,
            is_loading: true,
            last_error: None,
        }
    }
}

impl Session {
    /// Authenticated means both an access token and a user are held.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    /// Install a freshly granted access token.
    pub(crate) fn establish(&mut self, access_token: String, user: UserProfile, expires_in_secs: u64) {
        self.access_token = Some(access_token);
        self.user = Some(user);
        self.expires_at = i64::try_from(expires_in_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| Utc::now().checked_add_signed(d));
    }

    /// Drop credential and user. Loading and error flags are left alone.
    pub(crate) fn clear(&mut self) {
        self.access_token = None;
        self.user = None;
        self.expires_at = None;
    }

    /// `Bearer <token>`, or `None` without an access token
    pub fn authorization_header(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(true)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.expires_at
            .map(|at| (at - Utc::now()).num_minutes().max(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile {
            id: 1,
            email: None,
            display_name: Some("Ada".to_string()),
            avatar_url: None,
            external_account_id: "77".to_string(),
        }
    }

    #[test]
    fn test_new_session_is_loading_and_anonymous() {
        let session = Session::default();
        assert!(session.is_loading);
        assert!(!session.is_authenticated());
        assert_eq!(session.authorization_header(), None);
        assert!(session.is_expired());
    }

    #[test]
    fn test_establish_and_clear() {
        let mut session = Session::default();
        session.establish("abc".to_string(), user(), 3600);

        assert!(session.is_authenticated());
        assert_eq!(session.authorization_header().as_deref(), Some("Bearer abc"));
        assert!(!session.is_expired());
        assert!((58..=60).contains(&session.minutes_until_expiry()));

        session.last_error = Some("old".to_string());
        session.clear();
        assert!(!session.is_authenticated());
        assert_eq!(session.last_error.as_deref(), Some("old"));
        assert_eq!(session.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_user_without_token_is_not_authenticated() {
        let session = Session {
            user: Some(user()),
            ..Session::default()
        };
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_serialized_snapshot_omits_token() {
        let mut session = Session::default();
        session.establish("secret".to_string(), user(), 60);
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("Ada"));
    }
}
