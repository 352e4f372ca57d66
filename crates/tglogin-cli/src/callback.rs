//! Parsing what the user pastes after following the bot's button.

use reqwest::Url;

/// Pull the one-time token out of user input.
///
/// The bot replies with a button linking to
/// `<site>/auth/telegram/callback?token=<token>`; users may paste that link
/// or just the token itself.
pub fn extract_token(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.trim().to_string())
            .filter(|t| !t.is_empty()),
        Err(_) if !input.contains(char::is_whitespace) => Some(input.to_string()),
        Err(_) => None,
    }
}
