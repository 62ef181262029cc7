//! Request and response bodies as the backend spells them.
//!
//! Keys are the backend's Portuguese names; English spellings are accepted
//! when decoding.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use licita_common::{Principal, ProcessRecord, ProcessStatus, ProposalRecord};

/// Common `{sucesso, erro, detalhes}` part of every response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(alias = "success", default)]
    pub sucesso: Option<bool>,
    #[serde(alias = "error", default)]
    pub erro: Option<String>,
    #[serde(alias = "details", default)]
    pub detalhes: Option<String>,
    /// Date of the earlier proposal on a duplicate conflict
    #[serde(alias = "previous_date", default)]
    pub data_anterior: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub senha: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "success", default)]
    pub sucesso: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(alias = "user", default)]
    pub usuario: Option<Principal>,
    #[serde(alias = "error", default)]
    pub erro: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    pub cnpj: &'a str,
    pub processo: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "success", default)]
    pub sucesso: bool,
    #[serde(alias = "protocol", default)]
    pub protocolo: Option<String>,
    #[serde(alias = "attachments", default)]
    pub anexos: Vec<String>,
    #[serde(alias = "error", default)]
    pub erro: Option<String>,
    #[serde(alias = "details", default)]
    pub detalhes: Option<String>,
    #[serde(alias = "previous_date", default)]
    pub data_anterior: Option<String>,
}

// ============================================================================
// Listings
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProcessList {
    #[serde(alias = "processes", default)]
    pub processos: Vec<ProcessEntry>,
}

/// The listing returns either bare process numbers or full records
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProcessEntry {
    Number(String),
    Full(RawProcess),
}

impl From<ProcessEntry> for ProcessRecord {
    fn from(entry: ProcessEntry) -> Self {
        match entry {
            ProcessEntry::Number(number) => ProcessRecord {
                id: number.clone(),
                number,
                title: String::new(),
                owner_id: String::new(),
                deadline: None,
                status: ProcessStatus::default(),
                modality: None,
            },
            ProcessEntry::Full(raw) => raw.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProposalList {
    #[serde(alias = "proposals", default)]
    pub propostas: Vec<RawProposal>,
}

/// Process as stored by the backend; `numero` doubles as id when absent
#[derive(Debug, Deserialize)]
pub struct RawProcess {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(alias = "number", default)]
    pub numero: String,
    #[serde(alias = "titulo", alias = "title", default)]
    pub objeto: String,
    #[serde(rename = "criadoPor", alias = "criado_por", alias = "owner_id", default)]
    pub criado_por: Option<serde_json::Value>,
    #[serde(alias = "dataLimite", alias = "deadline", default)]
    pub prazo: Option<String>,
    #[serde(default)]
    pub status: Option<ProcessStatus>,
    #[serde(alias = "modality", default)]
    pub modalidade: Option<String>,
}

impl From<RawProcess> for ProcessRecord {
    fn from(raw: RawProcess) -> Self {
        let id = raw
            .id
            .as_ref()
            .and_then(value_text)
            .unwrap_or_else(|| raw.numero.clone());
        let owner = raw
            .criado_por
            .as_ref()
            .and_then(value_text)
            .unwrap_or_default();

        ProcessRecord {
            id,
            number: raw.numero,
            title: raw.objeto,
            owner_id: owner,
            deadline: raw.prazo.as_deref().and_then(parse_timestamp),
            status: raw.status.unwrap_or_default(),
            modality: raw.modalidade,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawCompany {
    #[serde(default)]
    pub cnpj: String,
    #[serde(rename = "razaoSocial", default)]
    pub razao_social: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawCommercial {
    #[serde(rename = "valorTotal", default)]
    pub valor_total: Option<String>,
}

/// Proposal as stored by the backend: company data nested under `dados`
#[derive(Debug, Deserialize)]
pub struct RawProposal {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(alias = "protocol", default)]
    pub protocolo: String,
    #[serde(alias = "process", default)]
    pub processo: String,
    #[serde(default)]
    pub dados: Option<RawCompany>,
    #[serde(default)]
    pub dados_empresa: Option<RawCompany>,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(default)]
    pub empresa: Option<String>,
    #[serde(default)]
    pub comercial: Option<RawCommercial>,
    #[serde(alias = "valor", default)]
    pub valor_total: Option<String>,
    #[serde(alias = "data", alias = "submitted_at", default)]
    pub data_envio: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl From<RawProposal> for ProposalRecord {
    fn from(raw: RawProposal) -> Self {
        let company = raw.dados.or(raw.dados_empresa).unwrap_or_default();
        let id = raw
            .id
            .as_ref()
            .and_then(value_text)
            .unwrap_or_else(|| raw.protocolo.clone());

        ProposalRecord {
            id,
            protocol: raw.protocolo,
            process_id: raw.processo,
            company_tax_id: raw.cnpj.unwrap_or(company.cnpj),
            company_name: raw.empresa.unwrap_or(company.razao_social),
            total: raw
                .valor_total
                .or_else(|| raw.comercial.and_then(|c| c.valor_total)),
            submitted_at: raw.data_envio.as_deref().and_then(parse_timestamp),
            status: raw.status,
        }
    }
}

fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339, or a naive timestamp read as UTC. A bare date means the end of that day.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
}
