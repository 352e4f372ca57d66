use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::config::AuthConfig;

/// `start` parameter the bot recognises as a web login request
pub const START_PARAMETER: &str = "web_auth";

/// Deep link that opens a chat with the bot and starts the login.
pub fn deep_link(config: &AuthConfig) -> String {
    format!(
        "https://{}/{}?start={}",
        config.messaging_domain.trim().trim_end_matches('/'),
        config.bot_username(),
        START_PARAMETER
    )
}

/// Hands a URL to something that can show it to the user.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens links in the desktop's default browser.
pub struct SystemBrowser;

impl LinkOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let status = platform_command(url)
            .status()
            .context("Failed to launch browser")?;
        if !status.success() {
            bail!("Browser launcher exited with {status}");
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn platform_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn platform_command(url: &str) -> Command {
    let mut cmd = Command::new("cmd");
    // empty title argument so `start` does not treat the URL as one
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}
