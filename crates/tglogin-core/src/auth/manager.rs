//! Session manager: owns the in-memory session, the pending renewal and the
//! persisted renewal credential.
//!
//! Lock order is state, then timer. Neither lock is held across an await;
//! the renewal gate is the only lock that is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, AuthTransport};
use crate::config::AuthConfig;
use crate::models::UserProfile;

use super::link::{deep_link, LinkOpener, SystemBrowser};
use super::session::Session;
use super::store::{FileStore, RenewalStore};
use super::timer::{renewal_delay, RenewalTimer};

/// Called with the new user whenever the signed-in user changes.
pub type AuthChangeObserver = Arc<dyn Fn(Option<&UserProfile>) + Send + Sync>;

struct State {
    session: Session,
    /// Bumped on every login and teardown; a renewal that started under an
    /// older epoch must not apply its result.
    epoch: u64,
}

struct Inner {
    config: AuthConfig,
    transport: Arc<dyn AuthTransport>,
    store: Arc<dyn RenewalStore>,
    opener: Arc<dyn LinkOpener>,
    observers: Vec<AuthChangeObserver>,
    state: Mutex<State>,
    timer: Mutex<RenewalTimer>,
    renew_gate: tokio::sync::Mutex<()>,
    restored: AtomicBool,
}

/// How a renewal attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Renewal {
    Renewed,
    /// Nothing stored; `epoch` is the one observed before looking.
    Missing { epoch: u64 },
    /// A login or teardown happened while the request was in flight.
    Discarded,
    /// Rejected or unreachable; the session has been torn down.
    Failed,
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    config: AuthConfig,
    transport: Option<Arc<dyn AuthTransport>>,
    store: Option<Arc<dyn RenewalStore>>,
    opener: Option<Arc<dyn LinkOpener>>,
    observers: Vec<AuthChangeObserver>,
}

impl SessionManagerBuilder {
    /// HTTP collaborator; defaults to an [`ApiClient`] on the configured URLs
    pub fn transport(mut self, transport: Arc<dyn AuthTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Renewal credential storage; defaults to a [`FileStore`] in the cache dir
    pub fn store(mut self, store: Arc<dyn RenewalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// How the bot link is shown; defaults to [`SystemBrowser`]
    pub fn opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn on_auth_change<F>(mut self, observer: F) -> Self
    where
        F: Fn(Option<&UserProfile>) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Construct the manager without touching the network or the store.
    /// The session reports `is_loading` until [`SessionManager::restore`] runs.
    pub fn build(self) -> Result<SessionManager> {
        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(ApiClient::with_timeout(
                self.config.api_urls.clone(),
                self.config.request_timeout(),
            )?),
        };
        let store = match self.store {
            Some(s) => s,
            None => Arc::new(FileStore::new(AuthConfig::cache_dir()?)),
        };
        let opener = self.opener.unwrap_or_else(|| Arc::new(SystemBrowser));

        Ok(SessionManager {
            inner: Arc::new(Inner {
                config: self.config,
                transport,
                store,
                opener,
                observers: self.observers,
                state: Mutex::new(State {
                    session: Session::default(),
                    epoch: 0,
                }),
                timer: Mutex::new(RenewalTimer::new()),
                renew_gate: tokio::sync::Mutex::new(()),
                restored: AtomicBool::new(false),
            }),
        })
    }

    /// Build, then restore any persisted session.
    pub async fn start(self) -> Result<SessionManager> {
        let manager = self.build()?;
        manager.restore().await;
        Ok(manager)
    }
}

/// Handle to a login session. Clones share the same session.
///
/// Dropping the last handle cancels any pending renewal.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn builder(config: AuthConfig) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config,
            transport: None,
            store: None,
            opener: None,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// Open the bot's deep link. Returns the link so callers can also show it.
    ///
    /// Nothing changes locally; the flow resumes in [`complete_login`](Self::complete_login).
    pub fn begin_login(&self) -> String {
        let link = deep_link(&self.inner.config);
        info!(link = %link, "Opening bot login link");
        if let Err(e) = self.inner.opener.open(&link) {
            warn!(error = %e, "Could not open bot link");
        }
        link
    }

    /// Exchange the bot's one-time token for a session.
    ///
    /// On failure the message is also left in [`last_error`](Self::last_error)
    /// and any existing session is left untouched.
    pub async fn complete_login(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.inner.complete_login(token).await
    }

    /// Renew the access token with the stored renewal token.
    ///
    /// Returns `false` without any request when nothing is stored. A
    /// rejected or failed renewal clears the whole session.
    pub async fn renew(&self) -> bool {
        self.inner.renew().await == Renewal::Renewed
    }

    /// Tell the server to revoke the renewal token, then clear the session.
    /// Never fails; the server's answer is ignored.
    pub async fn end_login(&self) {
        let refresh_token = self.inner.stored_token().unwrap_or_default();
        if let Err(e) = self.inner.transport.logout(&refresh_token).await {
            debug!(error = %e, "Logout request failed, clearing session anyway");
        }
        self.inner.teardown();
        info!("Logged out");
    }

    /// Re-establish a session from the stored renewal token. Runs once per
    /// manager; later calls only report the current state.
    pub async fn restore(&self) -> bool {
        if self.inner.restored.swap(true, Ordering::SeqCst) {
            return self.is_authenticated();
        }

        let restored = if self.inner.stored_token().is_some() {
            let ok = self.inner.renew().await == Renewal::Renewed;
            if ok {
                info!("Session restored");
            } else {
                info!("Stored session could not be restored");
            }
            ok
        } else {
            debug!("No stored session");
            false
        };

        self.inner.update(|state| state.session.is_loading = false);
        restored
    }

    /// Cancel the pending renewal without logging out.
    pub fn shutdown(&self) {
        if self.inner.timer.lock().cancel() {
            debug!("Pending renewal cancelled");
        }
    }

    // ===== Accessors =====

    pub fn snapshot(&self) -> Session {
        self.inner.state.lock().session.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner.state.lock().session.user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.lock().session.access_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().session.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().session.is_loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().session.last_error.clone()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().session.expires_at
    }

    /// `Bearer <access token>`, or `None` when signed out
    pub fn authorization_header(&self) -> Option<String> {
        self.inner.state.lock().session.authorization_header()
    }

    /// Delay the pending renewal was scheduled with, if one is pending
    pub fn scheduled_renewal(&self) -> Option<Duration> {
        self.inner.timer.lock().scheduled_delay()
    }
}

impl Inner {
    async fn complete_login(self: &Arc<Self>, token: &str) -> Result<UserProfile, ApiError> {
        self.update(|state| {
            state.session.is_loading = true;
            state.session.last_error = None;
            state.epoch += 1;
        });

        match self.transport.exchange_token(token).await {
            Ok(grant) => {
                let user = grant.user.clone();
                self.update(|state| {
                    state.epoch += 1;
                    state
                        .session
                        .establish(grant.access_token, grant.user, grant.expires_in);
                    state.session.is_loading = false;
                    self.persist(&grant.refresh_token);
                    self.schedule_renewal(grant.expires_in);
                });
                info!(user_id = user.id, expires_in = grant.expires_in, "Login successful");
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.update(|state| {
                    state.session.last_error = Some(e.user_message());
                    state.session.is_loading = false;
                });
                Err(e)
            }
        }
    }

    async fn renew(self: &Arc<Self>) -> Renewal {
        let _gate = self.renew_gate.lock().await;

        let epoch = self.state.lock().epoch;
        let Some(refresh_token) = self.stored_token() else {
            debug!("No renewal token stored, skipping renewal");
            return Renewal::Missing { epoch };
        };

        match self.transport.refresh(&refresh_token).await {
            Ok(grant) => {
                let expires_in = grant.expires_in;
                let applied = self.update(|state| {
                    if state.epoch != epoch {
                        return false;
                    }
                    state
                        .session
                        .establish(grant.access_token, grant.user, grant.expires_in);
                    if let Some(rotated) = grant.refresh_token.as_deref() {
                        self.persist(rotated);
                    }
                    self.schedule_renewal(grant.expires_in);
                    true
                });
                if applied {
                    info!(expires_in, "Access token renewed");
                    Renewal::Renewed
                } else {
                    debug!("Session changed during renewal, discarding result");
                    Renewal::Discarded
                }
            }
            Err(e) => {
                warn!(error = %e, "Token renewal failed, clearing session");
                if self.teardown_since(epoch) {
                    Renewal::Failed
                } else {
                    Renewal::Discarded
                }
            }
        }
    }

    /// Arm the renewal timer for a token expiring in `expires_in` seconds.
    /// Called with the state lock held.
    fn schedule_renewal(self: &Arc<Self>, expires_in: u64) {
        if !self.config.auto_refresh {
            return;
        }

        let delay = renewal_delay(expires_in, self.config.refresh_before_expiry);
        let weak = Arc::downgrade(self);
        self.timer.lock().arm(delay, move |generation| async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.timer.lock().release(generation);
            debug!("Renewal timer fired");
            // The token vanished from under a live session.
            if let Renewal::Missing { epoch } = inner.renew().await {
                inner.teardown_since(epoch);
            }
        });
        debug!(delay_ms = delay.as_millis() as u64, "Renewal scheduled");
    }

    /// Clear the session, cancel the pending renewal and erase the stored
    /// renewal token.
    fn teardown(&self) {
        self.update(|state| self.clear(state));
        debug!("Session cleared");
    }

    /// Tear down unless a login or teardown has happened since `epoch`.
    /// Returns whether anything was cleared.
    fn teardown_since(&self, epoch: u64) -> bool {
        let cleared = self.update(|state| {
            if state.epoch != epoch {
                return false;
            }
            self.clear(state);
            true
        });
        if cleared {
            debug!("Session cleared");
        } else {
            debug!("Session changed meanwhile, leaving it in place");
        }
        cleared
    }

    fn clear(&self, state: &mut State) {
        state.session.clear();
        state.epoch += 1;
        self.timer.lock().cancel();
        if let Err(e) = self.store.remove() {
            warn!(error = %e, "Failed to erase stored renewal token");
        }
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.get() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored renewal token");
                None
            }
        }
    }

    fn persist(&self, refresh_token: &str) {
        if let Err(e) = self.store.set(refresh_token) {
            warn!(error = %e, "Failed to store renewal token, session will not survive a restart");
        }
    }

    /// Mutate state under the lock, then notify observers if the user changed.
    fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let (result, changed) = {
            let mut state = self.state.lock();
            let before = state.session.user.clone();
            let result = f(&mut state);
            let changed = (state.session.user != before).then(|| state.session.user.clone());
            (result, changed)
        };

        if let Some(user) = changed {
            for observer in &self.observers {
                observer(user.as_ref());
            }
        }
        result
    }
}
