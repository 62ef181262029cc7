//! Licita HTTP client
//!
//! [`HttpBackend`] talks to the backend over JSON/HTTP and implements both
//! [`AuthBackend`](licita_security::AuthBackend) and
//! [`ProposalBackend`](licita_proposal::ProposalBackend).

#![warn(clippy::all)]

pub mod client;
pub mod wire;

pub use client::{HttpBackend, ProposalQuery};

use licita_common::messages;
use licita_proposal::SubmissionError;
use licita_security::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}")]
    Status { status: u16 },

    /// Error reported by the backend in the response body
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Transport or protocol failure as opposed to a business answer
    pub fn is_network(&self) -> bool {
        !matches!(self, ApiError::Backend { .. })
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Backend { message, .. } => AuthError::Rejected(message),
            other => AuthError::Network(other.to_string()),
        }
    }
}

impl From<ApiError> for SubmissionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Backend { message, .. } => SubmissionError::Rejected(message),
            other => SubmissionError::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Message shown when the backend gives no reason
pub(crate) fn rejection_text(erro: Option<String>) -> String {
    erro.filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| messages::REQUEST_FAILED.to_string())
}

/// `erro` followed by whatever detail and previous-submission date came with it
pub(crate) fn backend_message(
    erro: Option<String>,
    detalhes: Option<String>,
    data_anterior: Option<String>,
) -> String {
    let mut message = rejection_text(erro);
    for (prefix, part) in [("", detalhes), ("Data anterior: ", data_anterior)] {
        if let Some(part) = part.filter(|p| !p.trim().is_empty()) {
            message.push_str(". ");
            message.push_str(prefix);
            message.push_str(part.trim());
        }
    }
    message
}
