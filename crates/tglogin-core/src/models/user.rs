use serde::{Deserialize, Serialize};

/// Profile of the signed-in user, as returned by the auth server.
///
/// The session layer treats this as opaque: it is stored, compared and
/// handed to observers, never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(rename = "telegram_id")]
    pub external_account_id: String,
}

impl UserProfile {
    /// Name for display: the display name, then the email, then the
    /// external account id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.email.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(self.external_account_id.as_str())
    }
}

impl std::fmt::Display for UserProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.label(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_from_server_json() {
        let json = r#"{"id": 42, "email": null, "name": "Ada", "avatar_url": null, "telegram_id": "100500"}"#;
        let user: UserProfile = serde_json::from_str(json).expect("user json");

        assert_eq!(user.id, 42);
        assert_eq!(user.display_name.as_deref(), Some("Ada"));
        assert_eq!(user.external_account_id, "100500");
        assert!(user.email.is_none());
    }

    #[test]
    fn test_optional_fields_may_be_missing() {
        let json = r#"{"id": 7, "telegram_id": "1"}"#;
        let user: UserProfile = serde_json::from_str(json).expect("user json");
        assert_eq!(user.label(), "1");
    }

    #[test]
    fn test_label_fallbacks() {
        let mut user = UserProfile {
            id: 1,
            email: Some("ada@example.com".to_string()),
            display_name: Some(String::new()),
            avatar_url: None,
            external_account_id: "99".to_string(),
        };
        assert_eq!(user.label(), "ada@example.com");

        user.display_name = Some("Ada".to_string());
        assert_eq!(user.to_string(), "Ada (#1)");
    }
}
