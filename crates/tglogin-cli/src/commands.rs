use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};

use tglogin_core::auth::SessionManagerBuilder;
use tglogin_core::{AuthConfig, FileStore, KeyringStore, RenewalStore, SessionManager};

use crate::callback::extract_token;
use crate::cli::{Args, Commands, StoreKind};

pub async fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let store = open_store(args.store)?;
    let builder = SessionManager::builder(config).store(store);

    match args.command {
        Commands::Login { token } => login(builder, token).await,
        Commands::Status => status(builder, args.store).await,
        Commands::Header => header(builder).await,
        Commands::Watch => watch(builder).await,
        Commands::Logout => logout(builder).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<AuthConfig> {
    let mut config = match path {
        Some(path) => AuthConfig::load_from(path)?,
        None => AuthConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AuthConfig::default()
        }),
    };
    config.apply_env()?;
    config
        .validate()
        .context("Incomplete configuration: set it in config.json or TGLOGIN_* variables")?;
    Ok(config)
}

fn open_store(kind: StoreKind) -> Result<Arc<dyn RenewalStore>> {
    Ok(match kind {
        StoreKind::File => Arc::new(FileStore::new(AuthConfig::cache_dir()?)),
        StoreKind::Keyring => Arc::new(KeyringStore::new()),
    })
}

async fn login(builder: SessionManagerBuilder, token: Option<String>) -> Result<()> {
    let manager = builder.build()?;

    let input = match token {
        Some(token) => token,
        None => {
            let link = manager.begin_login();
            println!("Opening {link}");
            println!("If no browser opened, visit the link above and press Start.");
            println!("Paste the login link or token the bot sends you:");
            read_line().await?
        }
    };

    let token = extract_token(&input).context("No login token found in input")?;

    match manager.complete_login(&token).await {
        Ok(user) => {
            println!("Signed in as {user}");
            print_expiry(&manager);
            manager.shutdown();
            Ok(())
        }
        Err(e) => {
            let message = manager.last_error().unwrap_or_else(|| e.user_message());
            bail!("Login failed: {message}")
        }
    }
}

async fn status(builder: SessionManagerBuilder, store: StoreKind) -> Result<()> {
    let manager = builder.start().await?;

    match manager.user() {
        Some(user) if manager.is_authenticated() => {
            println!("Signed in as {user}");
            if let Some(email) = &user.email {
                println!("Email: {email}");
            }
            println!("Account: {}", user.external_account_id);
            print_expiry(&manager);
            if store == StoreKind::File {
                print_saved_at()?;
            }
        }
        _ => println!("Not signed in"),
    }

    manager.shutdown();
    Ok(())
}

async fn header(builder: SessionManagerBuilder) -> Result<()> {
    let manager = builder.start().await?;
    let header = manager
        .authorization_header()
        .context("Not signed in; run `tglogin login` first")?;
    println!("{header}");
    manager.shutdown();
    Ok(())
}

async fn watch(builder: SessionManagerBuilder) -> Result<()> {
    let signed_out = Arc::new(Notify::new());
    let notify = Arc::clone(&signed_out);

    let manager = builder
        .on_auth_change(move |user| match user {
            Some(user) => info!(user = %user, "Signed in"),
            None => {
                warn!("Session ended");
                notify.notify_one();
            }
        })
        .start()
        .await?;

    if !manager.is_authenticated() {
        bail!("Not signed in; run `tglogin login` first");
    }
    if !manager.config().auto_refresh {
        warn!("Auto refresh is disabled, the session will lapse at expiry");
    }

    println!("Watching session, press Ctrl-C to stop");
    print_expiry(&manager);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
        }
        _ = signed_out.notified() => {
            println!("Session ended; run `tglogin login` to sign in again");
        }
    }

    manager.shutdown();
    Ok(())
}

async fn logout(builder: SessionManagerBuilder) -> Result<()> {
    let manager = builder.build()?;
    manager.end_login().await;
    println!("Signed out");
    Ok(())
}

fn print_expiry(manager: &SessionManager) {
    if let Some(expires_at) = manager.expires_at() {
        let snapshot = manager.snapshot();
        let local = expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
        if snapshot.is_expired() {
            println!("Access token expired {local}");
        } else {
            println!(
                "Access token expires {local} ({} min)",
                snapshot.minutes_until_expiry()
            );
        }
    }
    if let Some(delay) = manager.scheduled_renewal() {
        info!(delay_secs = delay.as_secs(), "Next renewal scheduled");
    }
}

fn print_saved_at() -> Result<()> {
    let store = FileStore::new(AuthConfig::cache_dir()?);
    if let Some(saved_at) = store.saved_at()? {
        println!(
            "Renewal token saved {}",
            saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn read_line() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    Ok(line)
}
