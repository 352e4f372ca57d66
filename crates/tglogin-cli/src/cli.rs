use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "tglogin", version, about = "Sign in through a messaging bot and keep the session fresh")]
pub struct Args {
    /// Where the renewal token is kept between runs
    #[arg(long, global = true, value_enum, default_value_t = StoreKind::File, env = "TGLOGIN_STORE")]
    pub store: StoreKind,

    /// Config file (defaults to ~/.config/tglogin/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to a daily file in the cache directory
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// session.json in the cache directory
    File,
    /// OS keychain
    Keyring,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the bot, then exchange the token it sends back
    Login {
        /// One-time token or the full callback link from the bot; read from stdin if omitted
        #[arg(long)]
        token: Option<String>,
    },
    /// Show who is signed in
    Status,
    /// Print the Authorization header value for the current session
    Header,
    /// Keep the session renewed until Ctrl-C
    Watch,
    /// Revoke the renewal token and forget the session
    Logout,
}
