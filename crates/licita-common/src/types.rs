use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LicitaError;

// ============================================================================
// Roles
// ============================================================================

/// Coarse actor category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[serde(alias = "comprador")]
    Buyer,
    #[serde(alias = "comprador_senior")]
    BuyerSenior,
    #[serde(alias = "gerente")]
    Manager,
    #[serde(alias = "fornecedor")]
    Supplier,
    Auditor,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Buyer,
        Role::BuyerSenior,
        Role::Manager,
        Role::Supplier,
        Role::Auditor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Buyer => "buyer",
            Role::BuyerSenior => "buyer_senior",
            Role::Manager => "manager",
            Role::Supplier => "supplier",
            Role::Auditor => "auditor",
        }
    }

    /// Display label used in the user badge
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::Buyer => "Comprador",
            Role::BuyerSenior => "Comprador Sênior",
            Role::Manager => "Gerente",
            Role::Supplier => "Fornecedor",
            Role::Auditor => "Auditor",
        }
    }

    /// Roles whose permissions may be refined by an access level
    pub fn is_buyer_type(&self) -> bool {
        matches!(self, Role::Buyer | Role::BuyerSenior | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LicitaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "buyer" | "comprador" => Ok(Role::Buyer),
            "buyer_senior" | "comprador_senior" => Ok(Role::BuyerSenior),
            "manager" | "gerente" => Ok(Role::Manager),
            "supplier" | "fornecedor" => Ok(Role::Supplier),
            "auditor" => Ok(Role::Auditor),
            other => Err(LicitaError::Unknown {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Buyer sub-classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[serde(alias = "comprador", alias = "junior")]
    Buyer,
    #[serde(alias = "comprador_senior", alias = "senior")]
    BuyerSenior,
    #[serde(alias = "gerente")]
    Manager,
}

impl AccessLevel {
    /// The role whose allow-set this level grants
    pub fn as_role(&self) -> Role {
        match self {
            AccessLevel::Buyer => Role::Buyer,
            AccessLevel::BuyerSenior => Role::BuyerSenior,
            AccessLevel::Manager => Role::Manager,
        }
    }
}

// ============================================================================
// Principal
// ============================================================================

/// The authenticated actor of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "nome", default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(alias = "tipo")]
    pub role: Role,
    #[serde(alias = "nivelAcesso", default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,
    #[serde(alias = "cnpj", default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: String::new(),
            role,
            access_level: None,
            tax_id: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = Some(level);
        self
    }

    pub fn with_tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = Some(tax_id.into());
        self
    }

    /// Role used for permission and visibility decisions.
    ///
    /// A buyer-type principal with an explicit access level is governed by
    /// that level alone.
    pub fn effective_role(&self) -> Role {
        match self.access_level {
            Some(level) if self.role.is_buyer_type() => level.as_role(),
            _ => self.role,
        }
    }

    /// Name shown in greetings, falling back to the email
    pub fn greeting_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

/// Keeps only the digits of a CNPJ so formatted and raw values compare equal
pub fn normalize_tax_id(tax_id: &str) -> String {
    tax_id.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// Domain records
// ============================================================================

/// Lifecycle of a procurement process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessStatus {
    #[serde(rename = "rascunho", alias = "draft")]
    Draft,
    #[default]
    #[serde(rename = "ativo", alias = "active")]
    Active,
    #[serde(rename = "suspenso", alias = "suspended")]
    Suspended,
    #[serde(rename = "cancelado", alias = "cancelled")]
    Cancelled,
    #[serde(rename = "encerrado", alias = "finished")]
    Finished,
}

/// A procurement process (call for bids)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "numero", default)]
    pub number: String,
    #[serde(alias = "titulo", alias = "objeto", default)]
    pub title: String,
    #[serde(alias = "criadoPor", default)]
    pub owner_id: String,
    #[serde(alias = "prazo", alias = "dataLimite", default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ProcessStatus,
    #[serde(alias = "modalidade", default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
}

/// A submitted proposal as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "protocolo", default)]
    pub protocol: String,
    #[serde(alias = "processo", default)]
    pub process_id: String,
    #[serde(alias = "cnpj", default)]
    pub company_tax_id: String,
    #[serde(alias = "empresa", default)]
    pub company_name: String,
    #[serde(alias = "valor", default, skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
    #[serde(alias = "data", default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_both_vocabularies() {
        assert_eq!("fornecedor".parse::<Role>().unwrap(), Role::Supplier);
        assert_eq!("buyer_senior".parse::<Role>().unwrap(), Role::BuyerSenior);
        assert!("visitante".parse::<Role>().is_err());
    }

    #[test]
    fn test_access_level_replaces_buyer_role() {
        let p = Principal::new("u1", "Ana", Role::Buyer).with_access_level(AccessLevel::Manager);
        assert_eq!(p.effective_role(), Role::Manager);

        let s = Principal::new("u2", "ACME", Role::Supplier).with_access_level(AccessLevel::Manager);
        assert_eq!(s.effective_role(), Role::Supplier);
    }

    #[test]
    fn test_principal_decodes_backend_user() {
        let raw = r#"{"id": 7, "nome": "Carla", "email": "c@x.com", "tipo": "comprador", "nivelAcesso": "comprador_senior"}"#;
        let p: Principal = serde_json::from_str(raw).unwrap();
        assert_eq!(p.id, "7");
        assert_eq!(p.role, Role::Buyer);
        assert_eq!(p.effective_role(), Role::BuyerSenior);
    }

    #[test]
    fn test_greeting_falls_back_to_email() {
        let p = Principal::new("u1", "  ", Role::Admin).with_email("root@x.com");
        assert_eq!(p.greeting_name(), "root@x.com");
    }

    #[test]
    fn test_normalize_tax_id() {
        assert_eq!(normalize_tax_id("12.345.678/0001-90"), "12345678000190");
    }
}
