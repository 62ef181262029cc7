use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use licita_common::config::ApiConfig;
use licita_common::{messages, ProcessRecord, ProposalRecord};
use licita_proposal::{DuplicateCheck, ProposalBackend, ProposalDocument, SubmissionReceipt};
use licita_security::{AuthBackend, BuyerRegistration, LoginGrant, SupplierRegistration};

use crate::wire::{
    Envelope, LoginRequest, LoginResponse, ProcessList, ProposalList, SubmitResponse,
    VerifyRequest,
};
use crate::{backend_message, ApiError, Result};

pub const LOGIN: &str = "/api/login";
pub const LOGOUT: &str = "/api/logout";
pub const VERIFY_TAX_ID: &str = "/api/verificar-cnpj";
pub const SUBMIT_PROPOSAL: &str = "/api/enviar-proposta";
pub const REGISTER_SUPPLIER: &str = "/api/cadastrar-fornecedor";
pub const REGISTER_BUYER: &str = "/api/cadastrar-comprador";
pub const LIST_PROCESSES: &str = "/api/processos/listar";
pub const LIST_PROPOSALS: &str = "/api/propostas/listar";

/// Optional server-side filters of the proposal listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalQuery {
    pub process: Option<String>,
    pub tax_id: Option<String>,
}

impl ProposalQuery {
    fn params(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        if let Some(process) = &self.process {
            params.push(("processo", process.as_str()));
        }
        if let Some(tax_id) = &self.tax_id {
            params.push(("cnpj", tax_id.as_str()));
        }
        params
    }
}

/// JSON/HTTP client for the backend. No retries.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token sent with every request
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(reqwest::StatusCode, Vec<u8>)> {
        let token = self.token.read().clone();
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    /// Decodes a 2xx body; other statuses become `Backend` when the body
    /// carries an `erro`, `Status` otherwise
    fn decode<R: DeserializeOwned>(status: reqwest::StatusCode, body: &[u8]) -> Result<R> {
        if status.is_success() {
            return serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()));
        }
        match serde_json::from_slice::<Envelope>(body) {
            Ok(Envelope {
                erro: Some(erro),
                detalhes,
                data_anterior,
                ..
            }) => Err(ApiError::Backend {
                status: status.as_u16(),
                message: backend_message(Some(erro), detalhes, data_anterior),
            }),
            _ => Err(ApiError::Status {
                status: status.as_u16(),
            }),
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let (status, bytes) = self.send(self.client.post(&url).json(body)).await?;
        debug!("POST {} -> {}", url, status);
        Self::decode(status, &bytes)
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<R> {
        let url = self.url(path);
        debug!("GET {}", url);
        let (status, bytes) = self.send(self.client.get(&url).query(query)).await?;
        debug!("GET {} -> {}", url, status);
        Self::decode(status, &bytes)
    }

    /// Turns `{sucesso: false, erro}` into a `Backend` error
    fn check_envelope(envelope: Envelope) -> Result<()> {
        if envelope.sucesso == Some(false) {
            return Err(ApiError::Backend {
                status: 200,
                message: backend_message(envelope.erro, envelope.detalhes, envelope.data_anterior),
            });
        }
        Ok(())
    }

    pub async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        let list: ProcessList = self.get_json(LIST_PROCESSES, &[]).await?;
        Ok(list.processos.into_iter().map(ProcessRecord::from).collect())
    }

    pub async fn list_proposals(&self, query: &ProposalQuery) -> Result<Vec<ProposalRecord>> {
        let list: ProposalList = self.get_json(LIST_PROPOSALS, &query.params()).await?;
        Ok(list.propostas.into_iter().map(ProposalRecord::from).collect())
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> licita_security::Result<LoginGrant> {
        let response: LoginResponse = self
            .post_json(
                LOGIN,
                &LoginRequest {
                    email,
                    senha: password,
                },
            )
            .await?;

        match (response.sucesso, response.token, response.usuario) {
            (true, Some(token), Some(principal)) => Ok(LoginGrant { token, principal }),
            (true, _, _) => Err(ApiError::Decode("login response without token or user".to_string()).into()),
            (false, _, _) => Err(licita_security::AuthError::Rejected(
                response
                    .erro
                    .unwrap_or_else(|| messages::INVALID_LOGIN.to_string()),
            )),
        }
    }

    async fn logout(&self, token: Option<&str>) -> licita_security::Result<()> {
        let url = self.url(LOGOUT);
        debug!("POST {}", url);
        let mut request = self.client.post(&url).json(&serde_json::json!({}));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(ApiError::from)?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
            }
            .into());
        }
        self.set_token(None);
        Ok(())
    }

    async fn register_supplier(
        &self,
        registration: &SupplierRegistration,
    ) -> licita_security::Result<()> {
        let envelope: Envelope = self.post_json(REGISTER_SUPPLIER, registration).await?;
        Self::check_envelope(envelope).map_err(Into::into)
    }

    async fn register_buyer(&self, registration: &BuyerRegistration) -> licita_security::Result<()> {
        let envelope: Envelope = self.post_json(REGISTER_BUYER, registration).await?;
        Self::check_envelope(envelope).map_err(Into::into)
    }
}

#[async_trait]
impl ProposalBackend for HttpBackend {
    async fn verify_tax_id(&self, tax_id: &str, process: &str) -> licita_proposal::Result<DuplicateCheck> {
        let check = self
            .post_json(
                VERIFY_TAX_ID,
                &VerifyRequest {
                    cnpj: tax_id,
                    processo: process,
                },
            )
            .await?;
        Ok(check)
    }

    async fn submit(&self, document: &ProposalDocument) -> licita_proposal::Result<SubmissionReceipt> {
        let response: SubmitResponse = self.post_json(SUBMIT_PROPOSAL, document).await?;
        if !response.sucesso {
            return Err(licita_proposal::SubmissionError::Rejected(backend_message(
                response.erro,
                response.detalhes,
                response.data_anterior,
            )));
        }
        Ok(SubmissionReceipt {
            protocol: response
                .protocolo
                .unwrap_or_else(|| document.protocol.clone()),
            attachments: response.anexos,
            submitted_at: document.generated_at,
        })
    }
}
