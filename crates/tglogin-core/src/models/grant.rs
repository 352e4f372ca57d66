use serde::{Deserialize, Serialize};

use super::UserProfile;

/// Successful reply from the callback exchange endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginGrant {
    pub access_token: String,
    pub user: UserProfile,
    pub refresh_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: u64,
}

/// Successful reply from the renewal endpoint.
///
/// `refresh_token` is only present when the server rotates renewal
/// credentials; otherwise the stored one stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshGrant {
    pub access_token: String,
    pub user: UserProfile,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// Request bodies

#[derive(Debug, Serialize)]
pub(crate) struct CallbackRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body of a non-2xx reply. Only `error` is read.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = r#"{"id": 1, "email": "a@b.c", "name": "A", "avatar_url": null, "telegram_id": "5"}"#;

    #[test]
    fn test_parse_login_grant() {
        let json = format!(
            r#"{{"access_token": "a", "user": {USER}, "refresh_token": "r", "expires_in": 120}}"#
        );
        let grant: LoginGrant = serde_json::from_str(&json).expect("grant json");
        assert_eq!(grant.access_token, "a");
        assert_eq!(grant.refresh_token, "r");
        assert_eq!(grant.expires_in, 120);
    }

    #[test]
    fn test_refresh_grant_without_rotation() {
        let json = format!(r#"{{"access_token": "b", "user": {USER}, "expires_in": 900}}"#);
        let grant: RefreshGrant = serde_json::from_str(&json).expect("grant json");
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_missing_expiry_is_rejected() {
        let json = format!(r#"{{"access_token": "b", "user": {USER}}}"#);
        assert!(serde_json::from_str::<RefreshGrant>(&json).is_err());

        let json = format!(r#"{{"access_token": "b", "user": {USER}, "expires_in": "soon"}}"#);
        assert!(serde_json::from_str::<RefreshGrant>(&json).is_err());
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_string(&CallbackRequest { token: "t" }).unwrap();
        assert_eq!(body, r#"{"token":"t"}"#);

        let body = serde_json::to_string(&RefreshRequest { refresh_token: "" }).unwrap();
        assert_eq!(body, r#"{"refresh_token":""}"#);
    }
}
