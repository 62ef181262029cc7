//! Supplier and buyer sign-up.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use licita_common::config::ValidationConfig;
use licita_common::{normalize_tax_id, AccessLevel};

use crate::auth::AuthBackend;
use crate::permissions::Action;
use crate::session::SessionContext;
use crate::{AuthError, Result};

/// Self-service supplier sign-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistration {
    #[serde(rename = "razaoSocial", alias = "legal_name")]
    pub legal_name: String,
    #[serde(rename = "cnpj", alias = "tax_id")]
    pub tax_id: String,
    pub email: String,
    #[serde(rename = "senha", alias = "password")]
    pub password: String,
    #[serde(rename = "telefone", alias = "phone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl SupplierRegistration {
    pub fn validate(&self, rules: &ValidationConfig) -> Result<()> {
        require(&self.legal_name, "razão social")?;
        require(&self.tax_id, "CNPJ")?;
        require(&self.email, "email")?;
        require(&self.password, "senha")?;
        if normalize_tax_id(&self.tax_id).len() != 14 {
            return Err(AuthError::Validation("CNPJ deve ter 14 dígitos".to_string()));
        }
        check_email(&self.email)?;
        check_password(&self.password, rules)
    }
}

/// Buyer account created by a privileged user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerRegistration {
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    pub email: String,
    #[serde(rename = "senha", alias = "password")]
    pub password: String,
    #[serde(rename = "nivelAcesso", alias = "access_level")]
    pub access_level: AccessLevel,
    #[serde(rename = "departamento", alias = "department", default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl BuyerRegistration {
    pub fn validate(&self, rules: &ValidationConfig) -> Result<()> {
        require(&self.name, "nome")?;
        require(&self.email, "email")?;
        require(&self.password, "senha")?;
        check_email(&self.email)?;
        check_password(&self.password, rules)
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("Campo obrigatório: {}", field)));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<()> {
    let valid = match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("Email inválido".to_string()))
    }
}

fn check_password(password: &str, rules: &ValidationConfig) -> Result<()> {
    if password.chars().count() < rules.min_password_length {
        return Err(AuthError::Validation(format!(
            "A senha deve ter pelo menos {} caracteres",
            rules.min_password_length
        )));
    }
    Ok(())
}

/// Validates registrations and forwards them to the backend
pub struct Registrar {
    backend: Arc<dyn AuthBackend>,
    rules: ValidationConfig,
}

impl Registrar {
    pub fn new(backend: Arc<dyn AuthBackend>, rules: ValidationConfig) -> Self {
        Self { backend, rules }
    }

    pub async fn register_supplier(&self, registration: &SupplierRegistration) -> Result<()> {
        registration.validate(&self.rules)?;
        self.backend.register_supplier(registration).await?;
        info!("Supplier registered: {}", normalize_tax_id(&registration.tax_id));
        Ok(())
    }

    /// Requires `register_buyer` on the acting session
    pub async fn register_buyer(
        &self,
        ctx: &SessionContext,
        registration: &BuyerRegistration,
    ) -> Result<()> {
        if !ctx.can(Action::RegisterBuyer) {
            return Err(AuthError::Forbidden(Action::RegisterBuyer));
        }
        registration.validate(&self.rules)?;
        self.backend.register_buyer(registration).await?;
        info!(
            "Buyer {} registered by {}",
            registration.email,
            ctx.principal().id
        );
        Ok(())
    }
}
