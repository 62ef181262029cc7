use std::fmt;

use licita_common::config::ValidationConfig;
use licita_common::normalize_tax_id;

use crate::document::{Attachment, ProposalForm};

pub const MSG_PROCESS_REQUIRED: &str = "Por favor, selecione um processo de concorrência";
pub const MSG_TAX_ID_REQUIRED: &str = "Por favor, informe o CNPJ";
pub const MSG_TAX_ID_LENGTH: &str = "CNPJ deve ter 14 dígitos";
pub const MSG_LEGAL_NAME_REQUIRED: &str = "Por favor, informe a razão social";
pub const MSG_ATTACHMENT_REQUIRED: &str = "Anexe pelo menos um documento à proposta";

/// A problem with one form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every field problem found in one pass, in form order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Checks run before the duplicate check and submission
pub fn validate_form(form: &ProposalForm, rules: &ValidationConfig) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if form.process.trim().is_empty() {
        errors.push("processo", MSG_PROCESS_REQUIRED);
    }

    let tax_id = normalize_tax_id(&form.company.tax_id);
    if form.company.tax_id.trim().is_empty() {
        errors.push("cnpj", MSG_TAX_ID_REQUIRED);
    } else if tax_id.len() != 14 {
        errors.push("cnpj", MSG_TAX_ID_LENGTH);
    }

    if form.company.legal_name.trim().is_empty() {
        errors.push("razaoSocial", MSG_LEGAL_NAME_REQUIRED);
    }

    if form.attachments.is_empty() {
        errors.push("anexos", MSG_ATTACHMENT_REQUIRED);
    }
    for attachment in &form.attachments {
        if let Err(message) = check_attachment(attachment, rules) {
            errors.push("anexos", message);
        }
    }

    errors.into_result()
}

/// Extension allow-list and size cap
pub fn check_attachment(attachment: &Attachment, rules: &ValidationConfig) -> Result<(), String> {
    let extension = attachment
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !rules
        .allowed_file_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return Err(format!(
            "{}: tipo de arquivo não permitido ({})",
            attachment.file_name,
            rules.allowed_file_types.join(", ")
        ));
    }

    if attachment.size_bytes > rules.max_file_size {
        return Err(format!(
            "{}: arquivo excede o limite de {} MB",
            attachment.file_name,
            rules.max_file_size / (1024 * 1024)
        ));
    }

    Ok(())
}
