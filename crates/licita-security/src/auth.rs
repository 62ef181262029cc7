//! Page gating, login and logout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use licita_common::config::RoutesConfig;
use licita_common::messages;
use licita_common::store::keys;
use licita_common::{BrowserStorage, Clock, KeyValueStore, LicitaConfig, Principal, Role};

use crate::activity::{self, ActivityEntry, ActivityLog};
use crate::permissions::AccessControl;
use crate::registration::{BuyerRegistration, SupplierRegistration};
use crate::session::{Session, SessionContext, SessionStore};
use crate::{AuthError, Result};

// ============================================================================
// Backend contract
// ============================================================================

/// Successful login as returned by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub token: String,
    pub principal: Principal,
}

/// Authentication endpoints of the backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant>;

    /// Best-effort session invalidation
    async fn logout(&self, token: Option<&str>) -> Result<()>;

    async fn register_supplier(&self, registration: &SupplierRegistration) -> Result<()>;

    async fn register_buyer(&self, registration: &BuyerRegistration) -> Result<()>;
}

/// In-process backend with a fixed account table
#[derive(Default)]
pub struct MockAuthBackend {
    accounts: Mutex<HashMap<String, (String, Principal)>>,
    registrations: Mutex<Vec<String>>,
    fail_logout: bool,
    logout_calls: AtomicUsize,
}

impl MockAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str, principal: Principal) -> Self {
        self.accounts
            .lock()
            .insert(email.to_string(), (password.to_string(), principal));
        self
    }

    /// Makes every logout notification fail
    pub fn failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::Relaxed)
    }

    /// Emails or tax ids of accepted registrations
    pub fn registrations(&self) -> Vec<String> {
        self.registrations.lock().clone()
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant> {
        match self.accounts.lock().get(email) {
            Some((expected, principal)) if expected == password => Ok(LoginGrant {
                token: format!("mock-token-{}", principal.id),
                principal: principal.clone(),
            }),
            _ => Err(AuthError::Rejected(messages::INVALID_LOGIN.to_string())),
        }
    }

    async fn logout(&self, _token: Option<&str>) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_logout {
            return Err(AuthError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    async fn register_supplier(&self, registration: &SupplierRegistration) -> Result<()> {
        self.registrations.lock().push(registration.tax_id.clone());
        Ok(())
    }

    async fn register_buyer(&self, registration: &BuyerRegistration) -> Result<()> {
        self.registrations.lock().push(registration.email.clone());
        Ok(())
    }
}

// ============================================================================
// Page check outcomes
// ============================================================================

/// Roles a page admits. Empty means any authenticated principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequirement {
    roles: Vec<Role>,
}

impl PageRequirement {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn role(role: Role) -> Self {
        Self { roles: vec![role] }
    }

    pub fn one_of(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Matches the base role or the access-level role
    pub fn admits(&self, principal: &Principal) -> bool {
        self.roles.is_empty()
            || self.roles.contains(&principal.role)
            || self.roles.contains(&principal.effective_role())
    }
}

/// Result of validating the session for one page view
#[derive(Debug, Clone, PartialEq)]
pub enum PageAccess {
    NoSession {
        redirect: String,
    },
    Expired {
        redirect: String,
        message: &'static str,
    },
    RoleMismatch {
        redirect: String,
        message: &'static str,
    },
    Authorized(SessionContext),
}

impl PageAccess {
    pub fn is_authorized(&self) -> bool {
        matches!(self, PageAccess::Authorized(_))
    }

    pub fn redirect(&self) -> Option<&str> {
        match self {
            PageAccess::NoSession { redirect }
            | PageAccess::Expired { redirect, .. }
            | PageAccess::RoleMismatch { redirect, .. } => Some(redirect.as_str()),
            PageAccess::Authorized(_) => None,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            PageAccess::Expired { message, .. } | PageAccess::RoleMismatch { message, .. } => {
                Some(*message)
            }
            _ => None,
        }
    }

    pub fn into_context(self) -> Option<SessionContext> {
        match self {
            PageAccess::Authorized(ctx) => Some(ctx),
            _ => None,
        }
    }
}

/// Session state seen by the background expiry check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Absent,
    Active,
    Expired,
}

/// Emitted by the expiry watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Expired { redirect: String },
}

// ============================================================================
// Authenticator
// ============================================================================

pub struct Authenticator {
    sessions: SessionStore,
    activity: ActivityLog,
    local: Arc<dyn KeyValueStore>,
    backend: Arc<dyn AuthBackend>,
    clock: Arc<dyn Clock>,
    routes: RoutesConfig,
    timeout: Duration,
    log_page_access: bool,
}

impl Authenticator {
    pub fn new(
        storage: &BrowserStorage,
        backend: Arc<dyn AuthBackend>,
        clock: Arc<dyn Clock>,
        config: &LicitaConfig,
    ) -> Self {
        Self {
            sessions: SessionStore::new(storage.session.clone()),
            activity: ActivityLog::new(storage.local.clone(), config.activity.max_entries),
            local: storage.local.clone(),
            backend,
            clock,
            routes: config.routes.clone(),
            timeout: config.session_timeout(),
            log_page_access: config.session.log_page_access,
        }
    }

    pub fn routes(&self) -> &RoutesConfig {
        &self.routes
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Authenticates against the backend and opens a new session
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionContext> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(messages::REQUIRED_FIELDS.to_string()));
        }

        let grant = self.backend.login(email, password).await?;
        let now = self.clock.now();
        let session = Session::new(grant.principal, Some(grant.token), now);
        self.sessions.save(&session)?;
        self.record(&session.principal.id, activity::LOGIN, "", now);

        metrics::counter!("licita_logins_total").increment(1);
        info!(
            "Login: {} ({})",
            session.principal.greeting_name(),
            session.principal.role
        );
        Ok(SessionContext::new(session))
    }

    /// Validates the stored session for a page view.
    ///
    /// Only `Authorized` lets the page proceed; every other outcome carries
    /// the route to redirect to.
    pub fn check_page(&self, path: &str, requirement: &PageRequirement) -> PageAccess {
        let now = self.clock.now();

        let mut session = match self.sessions.load() {
            Ok(Some(session)) => session,
            Ok(None) => {
                return PageAccess::NoSession {
                    redirect: self.routes.login.clone(),
                }
            }
            Err(e) => {
                warn!("Discarding malformed session data: {}", e);
                self.discard();
                return PageAccess::NoSession {
                    redirect: self.routes.login.clone(),
                };
            }
        };

        if session.is_expired(now, self.timeout) {
            warn!(
                "Session of {} expired after {} minutes",
                session.principal.id,
                session.elapsed(now).num_minutes()
            );
            self.discard();
            return PageAccess::Expired {
                redirect: self.routes.login.clone(),
                message: messages::SESSION_EXPIRED,
            };
        }

        let principal = &session.principal;
        if !requirement.admits(principal) && !AccessControl::bypasses_page_gate(principal.role) {
            warn!("{} ({}) denied access to {}", principal.id, principal.role, path);
            return PageAccess::RoleMismatch {
                redirect: self.routes.landing_for(principal.effective_role()).to_string(),
                message: messages::ACCESS_DENIED,
            };
        }

        session.touch(now);
        if let Err(e) = self.sessions.save(&session) {
            warn!("Failed to persist session activity: {}", e);
        }
        if self.log_page_access {
            self.record(&session.principal.id, activity::PAGE_ACCESS, path, now);
        }

        PageAccess::Authorized(SessionContext::new(session))
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.sessions.load().ok().flatten().map(|s| s.principal)
    }

    /// Periodic re-check; an expired session is discarded
    pub fn check_expiry(&self) -> SessionStatus {
        match self.sessions.load() {
            Ok(Some(session)) if session.is_expired(self.clock.now(), self.timeout) => {
                warn!("Session of {} expired", session.principal.id);
                self.discard();
                SessionStatus::Expired
            }
            Ok(Some(_)) => SessionStatus::Active,
            Ok(None) => SessionStatus::Absent,
            Err(e) => {
                warn!("Discarding malformed session data: {}", e);
                self.discard();
                SessionStatus::Absent
            }
        }
    }

    /// Ends the session.
    ///
    /// Local state is cleared before the backend is notified, so a failed
    /// notification never leaves a session behind. Returns the redirect
    /// target, or `None` when already on a login page.
    pub async fn logout(&self, current_path: &str) -> Option<String> {
        let now = self.clock.now();
        let session = self.sessions.load().ok().flatten();

        if let Some(session) = &session {
            self.record(&session.principal.id, activity::LOGOUT, current_path, now);
        }

        self.discard();
        if let Err(e) = self.local.remove(keys::DRAFT) {
            warn!("Failed to clear draft cache: {}", e);
        }

        let token = session.as_ref().and_then(|s| s.token.as_deref());
        if let Err(e) = self.backend.logout(token).await {
            warn!("Logout notification failed (ignored): {}", e);
        }

        if self.routes.is_login_path(current_path) {
            debug!("Already on login page {}, not redirecting", current_path);
            None
        } else {
            Some(self.routes.login.clone())
        }
    }

    /// Re-checks expiry every `period` until cancelled or the session expires
    pub fn spawn_expiry_watch(
        self: Arc<Self>,
        period: std::time::Duration,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if self.check_expiry() == SessionStatus::Expired {
                            let event = SessionEvent::Expired {
                                redirect: self.routes.login.clone(),
                            };
                            let _ = tx.send(event).await;
                            break;
                        }
                    }
                }
            }
        });

        (handle, rx)
    }

    fn discard(&self) {
        if let Err(e) = self.sessions.clear() {
            warn!("Failed to clear session store: {}", e);
        }
    }

    fn record(&self, user_id: &str, action: &str, page: &str, at: DateTime<Utc>) {
        if let Err(e) = self
            .activity
            .append(ActivityEntry::new(user_id, action, page, at))
        {
            warn!("Failed to append activity entry: {}", e);
        }
    }
}
