//! Duplicate check and submission flow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use licita_common::config::ValidationConfig;
use licita_common::{BrowserStorage, Clock};

use crate::document::{ProposalDocument, ProposalForm};
use crate::draft::DraftCache;
use crate::history::{HistoryEntry, SubmissionHistory};
use crate::validation::validate_form;
use crate::{Result, SubmissionError};

// ============================================================================
// Backend contract
// ============================================================================

/// Answer of the duplicate check endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheck {
    #[serde(rename = "duplicado", alias = "duplicated", default)]
    pub duplicated: bool,
    #[serde(rename = "protocolo", alias = "protocol", default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(rename = "data", alias = "date", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "empresa", alias = "company", default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl DuplicateCheck {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn duplicate(protocol: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            duplicated: true,
            protocol: Some(protocol.into()),
            date: Some(date.into()),
            company: None,
        }
    }
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub protocol: String,
    pub attachments: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait ProposalBackend: Send + Sync {
    async fn verify_tax_id(&self, tax_id: &str, process: &str) -> Result<DuplicateCheck>;

    /// Business rejections come back as `SubmissionError::Rejected`
    async fn submit(&self, document: &ProposalDocument) -> Result<SubmissionReceipt>;
}

/// Scriptable in-process backend
#[derive(Default)]
pub struct MockProposalBackend {
    duplicate: Option<DuplicateCheck>,
    rejection: Option<String>,
    offline: bool,
    submitted: Mutex<Vec<ProposalDocument>>,
    verify_calls: AtomicUsize,
}

impl MockProposalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duplicate check reports an earlier submission
    pub fn with_duplicate(mut self, check: DuplicateCheck) -> Self {
        self.duplicate = Some(check);
        self
    }

    /// Submissions fail with this business message
    pub fn rejecting(mut self, message: impl Into<String>) -> Self {
        self.rejection = Some(message.into());
        self
    }

    /// Every call fails at the transport level
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn submitted(&self) -> Vec<ProposalDocument> {
        self.submitted.lock().clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProposalBackend for MockProposalBackend {
    async fn verify_tax_id(&self, _tax_id: &str, _process: &str) -> Result<DuplicateCheck> {
        self.verify_calls.fetch_add(1, Ordering::Relaxed);
        if self.offline {
            return Err(SubmissionError::Network("connection refused".to_string()));
        }
        Ok(self.duplicate.clone().unwrap_or_default())
    }

    async fn submit(&self, document: &ProposalDocument) -> Result<SubmissionReceipt> {
        if self.offline {
            return Err(SubmissionError::Network("connection refused".to_string()));
        }
        if let Some(message) = &self.rejection {
            return Err(SubmissionError::Rejected(message.clone()));
        }
        self.submitted.lock().push(document.clone());
        Ok(SubmissionReceipt {
            protocol: document.protocol.clone(),
            attachments: vec![
                format!("{}_tecnica.pdf", document.protocol),
                format!("{}_comercial.xlsx", document.protocol),
            ],
            submitted_at: document.generated_at,
        })
    }
}

// ============================================================================
// Submitter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted(SubmissionReceipt),
    /// Blocked by an earlier submission for the same tax id and process
    Duplicate {
        protocol: Option<String>,
        date: Option<String>,
    },
}

impl SubmissionOutcome {
    /// Text for the UI
    pub fn message(&self) -> String {
        match self {
            SubmissionOutcome::Submitted(receipt) => format!(
                "Proposta enviada com sucesso! Protocolo: {}",
                receipt.protocol
            ),
            SubmissionOutcome::Duplicate { protocol, date } => format!(
                "CNPJ já cadastrado! Este CNPJ já enviou uma proposta para este processo. \
                 Protocolo anterior: {} Data: {}",
                protocol.as_deref().unwrap_or("-"),
                date.as_deref().unwrap_or("-")
            ),
        }
    }
}

pub struct Submitter {
    backend: Arc<dyn ProposalBackend>,
    drafts: DraftCache,
    history: SubmissionHistory,
    clock: Arc<dyn Clock>,
    rules: ValidationConfig,
}

impl Submitter {
    pub fn new(
        backend: Arc<dyn ProposalBackend>,
        storage: &BrowserStorage,
        clock: Arc<dyn Clock>,
        rules: ValidationConfig,
    ) -> Self {
        Self {
            backend,
            drafts: DraftCache::new(storage.local.clone()),
            history: SubmissionHistory::new(storage.local.clone()),
            clock,
            rules,
        }
    }

    pub fn history(&self) -> &SubmissionHistory {
        &self.history
    }

    /// Validates, checks for a prior submission and posts the document.
    ///
    /// The remote duplicate answer is authoritative. A failed check aborts
    /// the submission. The form is never modified; on success the draft slot
    /// is cleared and a history entry appended.
    pub async fn submit(&self, form: &ProposalForm) -> Result<SubmissionOutcome> {
        validate_form(form, &self.rules)?;

        let tax_id = form.tax_id();
        let process = form.process.trim();

        if let Some(previous) = self.history.find_duplicate(&tax_id, process) {
            warn!(
                "Local history already holds {} for {} on {}",
                previous.protocol, tax_id, process
            );
        }

        let check = self.backend.verify_tax_id(&tax_id, process).await?;
        if check.duplicated {
            metrics::counter!("licita_duplicate_blocks_total").increment(1);
            warn!(
                "Submission blocked: {} already submitted {:?} for {}",
                tax_id, check.protocol, process
            );
            return Ok(SubmissionOutcome::Duplicate {
                protocol: check.protocol,
                date: check.date,
            });
        }

        let now = self.clock.now();
        let document = form.assemble(now, &mut rand::thread_rng());
        let receipt = self.backend.submit(&document).await?;

        let entry = HistoryEntry {
            protocol: receipt.protocol.clone(),
            submitted_at: now,
            company: document.company.legal_name.clone(),
            tax_id: document.company.tax_id.clone(),
            total: document.commercial.grand_total.clone(),
            process: document.process.clone(),
        };
        if let Err(e) = self.history.record(entry) {
            warn!("Failed to record submission history: {}", e);
        }
        if let Err(e) = self.drafts.clear() {
            warn!("Failed to clear draft after submission: {}", e);
        }

        metrics::counter!("licita_proposals_submitted_total").increment(1);
        info!("Proposal {} submitted for {}", receipt.protocol, document.process);
        Ok(SubmissionOutcome::Submitted(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commercial::CostCategory;
    use crate::document::is_protocol;
    use chrono::TimeZone;
    use licita_common::ManualClock;

    fn form() -> ProposalForm {
        let mut form = ProposalForm::for_process("CC-001/2024");
        form.company.legal_name = "ACME Engenharia Ltda".to_string();
        form.company.tax_id = "12.345.678/0001-90".to_string();
        form.commercial.labor = CostCategory::from_total("1.000,00");
        form.commercial.overhead_percent = "10".to_string();
        form.attachments.push(crate::document::Attachment::new("proposta.pdf", 4096));
        form
    }

    fn submitter(backend: Arc<MockProposalBackend>) -> (Submitter, BrowserStorage) {
        let storage = BrowserStorage::in_memory();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 8, 20, 15, 30, 0).unwrap(),
        ));
        let submitter = Submitter::new(backend, &storage, clock, ValidationConfig::default());
        (submitter, storage)
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let backend = Arc::new(MockProposalBackend::new());
        let (submitter, storage) = submitter(backend.clone());
        DraftCache::new(storage.local.clone())
            .save(&form(), Utc::now())
            .unwrap();

        let outcome = submitter.submit(&form()).await.unwrap();
        let SubmissionOutcome::Submitted(receipt) = outcome else {
            panic!("expected a receipt");
        };
        assert!(is_protocol(&receipt.protocol));
        assert_eq!(receipt.attachments.len(), 2);

        let sent = backend.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].commercial.grand_total, "1.100,00");

        let history = submitter.history().entries();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total, "1.100,00");
        assert!(DraftCache::new(storage.local.clone()).load().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_blocks_without_submitting() {
        let backend = Arc::new(
            MockProposalBackend::new()
                .with_duplicate(DuplicateCheck::duplicate("PROP-X", "2024-08-01T10:00:00")),
        );
        let (submitter, _) = submitter(backend.clone());

        let outcome = submitter.submit(&form()).await.unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::Duplicate {
                protocol: Some("PROP-X".to_string()),
                date: Some("2024-08-01T10:00:00".to_string()),
            }
        );
        assert!(outcome.message().contains("PROP-X"));
        assert!(backend.submitted().is_empty());
        assert!(submitter.history().entries().is_empty());
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_call() {
        let backend = Arc::new(MockProposalBackend::new());
        let (submitter, _) = submitter(backend.clone());

        let err = submitter
            .submit(&ProposalForm::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Validation(_)));
        assert_eq!(backend.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_keep_draft() {
        for backend in [
            MockProposalBackend::new().offline(),
            MockProposalBackend::new().rejecting("Erro ao salvar proposta"),
        ] {
            let backend = Arc::new(backend);
            let (submitter, storage) = submitter(backend.clone());
            let drafts = DraftCache::new(storage.local.clone());
            drafts.save(&form(), Utc::now()).unwrap();

            let err = submitter.submit(&form()).await.unwrap_err();
            match &err {
                SubmissionError::Network(_) => {
                    assert_eq!(err.user_message(), licita_common::messages::NETWORK_ERROR)
                }
                SubmissionError::Rejected(m) => assert_eq!(m, "Erro ao salvar proposta"),
                other => panic!("unexpected error: {}", other),
            }
            assert!(drafts.load().is_some());
            assert!(submitter.history().entries().is_empty());
        }
    }

    #[test]
    fn test_duplicate_check_decodes_both_vocabularies() {
        let pt: DuplicateCheck =
            serde_json::from_str(r#"{"duplicado": true, "protocolo": "PROP-X"}"#).unwrap();
        let en: DuplicateCheck =
            serde_json::from_str(r#"{"duplicated": true, "protocol": "PROP-X"}"#).unwrap();
        assert_eq!(pt, en);
        assert!(pt.duplicated);

        let empty: DuplicateCheck = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, DuplicateCheck::clear());
    }
}
