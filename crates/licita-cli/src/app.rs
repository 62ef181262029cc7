//! Wiring of stores, backends and services behind each command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use licita_api::{HttpBackend, ProposalQuery};
use licita_common::{BrowserStorage, Clock, LicitaConfig, Role, SystemClock};
use licita_proposal::{
    AutoSaver, DraftCache, DraftSource, ProposalForm, ProposalBackend, SubmissionError,
    SubmissionOutcome, Submitter,
};
use licita_security::{
    AccessControl, Action, AuthBackend, AuthError, Authenticator, BuyerRegistration, DataFilter,
    PageAccess, PageRequirement, RecordCategory, Registrar, SessionContext, SessionEvent,
    SessionStore, SupplierRegistration,
};

use crate::render;

fn auth_failure(err: AuthError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::from(err).context(message)
}

fn submission_failure(err: SubmissionError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::from(err).context(message)
}

/// Reads a proposal form from a JSON file
pub fn read_form(path: &Path) -> anyhow::Result<ProposalForm> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing form {:?}", path))
}

/// One client instance: storage, session and backends
pub struct App {
    config: LicitaConfig,
    storage: BrowserStorage,
    clock: Arc<dyn Clock>,
    auth: Arc<Authenticator>,
    auth_backend: Arc<dyn AuthBackend>,
    proposals: Arc<dyn ProposalBackend>,
    http: Option<Arc<HttpBackend>>,
}

impl App {
    /// Opens the data directory and points every backend at the HTTP API
    pub fn open(config: LicitaConfig) -> anyhow::Result<Self> {
        let storage = BrowserStorage::open_dir(&config.storage.data_dir)
            .with_context(|| format!("opening data dir {:?}", config.storage.data_dir))?;
        let http = Arc::new(HttpBackend::new(&config.api)?);

        if let Ok(Some(session)) = SessionStore::new(storage.session.clone()).load() {
            http.set_token(session.token);
        }

        Ok(Self::with_parts(
            config,
            storage,
            Arc::new(SystemClock),
            http.clone(),
            http.clone(),
            Some(http),
        ))
    }

    pub fn with_parts(
        config: LicitaConfig,
        storage: BrowserStorage,
        clock: Arc<dyn Clock>,
        auth_backend: Arc<dyn AuthBackend>,
        proposals: Arc<dyn ProposalBackend>,
        http: Option<Arc<HttpBackend>>,
    ) -> Self {
        let auth = Arc::new(Authenticator::new(
            &storage,
            auth_backend.clone(),
            clock.clone(),
            &config,
        ));
        Self {
            config,
            storage,
            clock,
            auth,
            auth_backend,
            proposals,
            http,
        }
    }

    pub fn config(&self) -> &LicitaConfig {
        &self.config
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    fn http(&self) -> anyhow::Result<&HttpBackend> {
        self.http
            .as_deref()
            .ok_or_else(|| anyhow!("listings need the HTTP backend"))
    }

    /// Session context for a page, or an error carrying the redirect
    fn require(&self, path: &str, requirement: &PageRequirement) -> anyhow::Result<SessionContext> {
        match self.auth.check_page(path, requirement) {
            PageAccess::Authorized(ctx) => Ok(ctx),
            denied => bail!("{}", render::page_access(path, &denied)),
        }
    }

    // ========================================================================
    // Session commands
    // ========================================================================

    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let ctx = self.auth.login(email, password).await.map_err(auth_failure)?;
        if let Some(http) = &self.http {
            http.set_token(ctx.token().map(str::to_string));
        }
        let landing = self.auth.routes().landing_for(ctx.principal().role);
        Ok(format!(
            "Bem-vindo, {}! ({})\nlanding: {}",
            ctx.principal().greeting_name(),
            ctx.effective_role(),
            landing
        ))
    }

    pub async fn logout(&self, current_path: &str) -> String {
        match self.auth.logout(current_path).await {
            Some(redirect) => format!("Sessão encerrada. redirect to {}", redirect),
            None => "Sessão encerrada.".to_string(),
        }
    }

    pub fn whoami(&self) -> anyhow::Result<String> {
        let ctx = self.require(&self.config.routes.dashboard, &PageRequirement::any())?;
        Ok(render::principal(ctx.principal()))
    }

    pub fn check(&self, path: &str, roles: &[Role]) -> String {
        let requirement = PageRequirement::one_of(roles.iter().copied());
        render::page_access(path, &self.auth.check_page(path, &requirement))
    }

    /// Permission lookup for `role`, or for the current session when absent
    pub fn can(&self, action: Action, role: Option<Role>) -> anyhow::Result<bool> {
        match role {
            Some(role) => Ok(AccessControl::allows(role, action)),
            None => {
                let principal = self
                    .auth
                    .current_principal()
                    .ok_or_else(|| auth_failure(AuthError::NoSession))?;
                Ok(AccessControl::allows_principal(&principal, action))
            }
        }
    }

    pub fn activity(&self, limit: usize) -> String {
        let entries = self.auth.activity().entries();
        let skip = entries.len().saturating_sub(limit);
        entries[skip..]
            .iter()
            .map(|e| format!("{} | {} | {} | {}", e.timestamp.to_rfc3339(), e.user_id, e.action, e.page))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub async fn register_supplier(&self, registration: &SupplierRegistration) -> anyhow::Result<String> {
        let registrar = Registrar::new(self.auth_backend.clone(), self.config.validation.clone());
        registrar
            .register_supplier(registration)
            .await
            .map_err(auth_failure)?;
        Ok(format!("Fornecedor {} cadastrado", registration.legal_name))
    }

    pub async fn register_buyer(&self, registration: &BuyerRegistration) -> anyhow::Result<String> {
        let ctx = self.require(&self.config.routes.buyer_registration, &PageRequirement::any())?;
        let registrar = Registrar::new(self.auth_backend.clone(), self.config.validation.clone());
        registrar
            .register_buyer(&ctx, registration)
            .await
            .map_err(auth_failure)?;
        Ok(format!("Comprador {} cadastrado", registration.email))
    }

    // ========================================================================
    // Proposal commands
    // ========================================================================

    pub fn submitter(&self) -> Submitter {
        Submitter::new(
            self.proposals.clone(),
            &self.storage,
            self.clock.clone(),
            self.config.validation.clone(),
        )
    }

    pub fn assemble(&self, form: &ProposalForm) -> anyhow::Result<String> {
        let document = form.assemble(self.clock.now(), &mut rand::thread_rng());
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub async fn submit(&self, form: &ProposalForm) -> anyhow::Result<SubmissionOutcome> {
        let ctx = self.require(
            &self.config.routes.proposal_portal,
            &PageRequirement::role(Role::Supplier),
        )?;
        if !ctx.can(Action::SubmitProposal) {
            return Err(auth_failure(AuthError::Forbidden(Action::SubmitProposal)));
        }

        self.submitter().submit(form).await.map_err(submission_failure)
    }

    pub fn drafts(&self) -> DraftCache {
        DraftCache::new(self.storage.local.clone())
    }

    pub fn save_draft(&self, form: &ProposalForm) -> anyhow::Result<()> {
        self.drafts().save(form, self.clock.now())?;
        Ok(())
    }

    pub fn show_draft(&self) -> anyhow::Result<Option<String>> {
        match self.drafts().load() {
            Some(draft) => Ok(Some(serde_json::to_string_pretty(&draft)?)),
            None => Ok(None),
        }
    }

    pub fn clear_draft(&self) -> anyhow::Result<()> {
        self.drafts().clear()?;
        Ok(())
    }

    // ========================================================================
    // Listings
    // ========================================================================

    pub async fn list(&self, category: &RecordCategory, process: Option<String>) -> anyhow::Result<String> {
        let ctx = self.require(&self.config.routes.dashboard, &PageRequirement::any())?;
        let http = self.http()?;
        let processes = http.list_processes().await?;
        let filter = DataFilter::new(ctx.principal(), self.clock.now()).with_processes(&processes);

        let text = match category {
            RecordCategory::Processes => render::processes(&filter.filter(&processes, category)),
            RecordCategory::Proposals => {
                let query = ProposalQuery {
                    process,
                    tax_id: None,
                };
                let proposals = http.list_proposals(&query).await?;
                render::proposals(&filter.filter(&proposals, category))
            }
            RecordCategory::Other(name) => bail!("unknown record category '{}'", name),
        };
        Ok(text)
    }

    // ========================================================================
    // Background tasks
    // ========================================================================

    /// Runs the expiry watch, and auto-save when a form is given, until the
    /// session expires or `cancel` fires
    pub async fn watch(&self, form: Option<ProposalForm>, cancel: CancellationToken) -> String {
        let child = cancel.child_token();
        let (watch, mut events) = self
            .auth
            .clone()
            .spawn_expiry_watch(self.config.session_check_interval(), child.clone());

        let saver = form.map(|form| {
            let source: Arc<dyn DraftSource> = Arc::new(RwLock::new(form));
            let saver = Arc::new(AutoSaver::new(
                self.drafts(),
                self.clock.clone(),
                self.config.autosave_interval(),
            ));
            info!("Auto-saving every {:?}", self.config.autosave_interval());
            saver.spawn(source, child.clone())
        });

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => "Watch stopped".to_string(),
            event = events.recv() => match event {
                Some(SessionEvent::Expired { redirect }) => {
                    format!("{} redirect to {}", licita_common::messages::SESSION_EXPIRED, redirect)
                }
                None => "Watch ended".to_string(),
            },
        };

        child.cancel();
        if let Err(e) = watch.await {
            warn!("Expiry watch ended abnormally: {}", e);
        }
        if let Some(handle) = saver {
            if let Err(e) = handle.await {
                warn!("Auto-save task ended abnormally: {}", e);
            }
        }
        outcome
    }
}
