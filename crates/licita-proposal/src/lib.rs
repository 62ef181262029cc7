//! Licita proposal aggregator
//!
//! - **Money**: integer-cent amounts parsed from and rendered as pt-BR text
//! - **Schedule**: sequential day allocation and the execution deadline
//! - **Commercial**: category totals, direct cost, overhead and grand total
//! - **Document**: form state, protocol stamping and the nested wire document
//! - **Submission**: validation, remote duplicate check and posting
//! - **Drafts**: the recovery slot and its auto-save task

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod commercial;
pub mod document;
pub mod draft;
pub mod history;
pub mod money;
pub mod schedule;
pub mod submission;
pub mod validation;

pub use commercial::{compute_totals, CommercialInput, CommercialTotals, CostCategory, CostLine};
pub use document::{
    format_protocol, generate_protocol, is_protocol, Attachment, CompanyInfo, ProposalDocument,
    ProposalForm, TechnicalInput,
};
pub use draft::{AutoSaver, Draft, DraftCache, DraftSource};
pub use history::{HistoryEntry, SubmissionHistory};
pub use money::{Money, Percentage, Quantity};
pub use schedule::{compute_schedule, ActivityInput, Schedule, ScheduledActivity};
pub use submission::{
    DuplicateCheck, MockProposalBackend, ProposalBackend, SubmissionOutcome, SubmissionReceipt,
    Submitter,
};
pub use validation::{validate_form, FieldError, ValidationErrors};

use licita_common::{messages, LicitaError};
use thiserror::Error;

/// Submission flow errors
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Network error: {0}")]
    Network(String),

    /// Backend business error, message kept verbatim
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Storage(#[from] LicitaError),
}

impl SubmissionError {
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Validation(errors) => errors.to_string(),
            SubmissionError::Network(_) => messages::NETWORK_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SubmissionError>;
