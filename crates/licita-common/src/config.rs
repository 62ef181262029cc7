use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{Result, Role};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LicitaConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub activity: ActivityConfig,
    pub draft: DraftConfig,
    pub validation: ValidationConfig,
    pub routes: RoutesConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum session age, measured from login
    pub timeout_minutes: i64,
    /// Period of the background expiry re-check
    pub check_interval_secs: u64,
    /// Append an access-log entry on every authorized page view
    pub log_page_access: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            check_interval_secs: 60,
            log_page_access: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub max_entries: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self { max_entries: 5000 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DraftConfig {
    pub autosave_interval_secs: u64,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_password_length: usize,
    pub max_file_size: u64,
    pub allowed_file_types: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_password_length: 8,
            max_file_size: 10 * 1024 * 1024,
            allowed_file_types: ["pdf", "doc", "docx", "xls", "xlsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub login: String,
    pub dashboard: String,
    pub proposal_portal: String,
    pub reports: String,
    pub supplier_dashboard: String,
    pub buyer_registration: String,
    pub supplier_registration: String,
    /// Paths treated as the login entry point
    pub login_paths: Vec<String>,
    /// Where each role lands after being bounced from a page, keyed by role name
    pub landing: BTreeMap<String, String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        let dashboard = "/sistema-gestao.html".to_string();
        let reports = "/modulo-relatorios.html".to_string();
        let supplier_dashboard = "/dashboard-fornecedor.html".to_string();

        let mut landing = BTreeMap::new();
        landing.insert(Role::Admin.as_str().to_string(), dashboard.clone());
        landing.insert(Role::Buyer.as_str().to_string(), dashboard.clone());
        landing.insert(Role::BuyerSenior.as_str().to_string(), dashboard.clone());
        landing.insert(Role::Manager.as_str().to_string(), dashboard.clone());
        landing.insert(Role::Supplier.as_str().to_string(), supplier_dashboard.clone());
        landing.insert(Role::Auditor.as_str().to_string(), reports.clone());

        Self {
            login: "/".to_string(),
            dashboard,
            proposal_portal: "/portal-propostas.html".to_string(),
            reports,
            supplier_dashboard,
            buyer_registration: "/cadastro-comprador.html".to_string(),
            supplier_registration: "/cadastro-fornecedor.html".to_string(),
            login_paths: vec!["/".to_string(), "/index.html".to_string()],
            landing,
        }
    }
}

impl RoutesConfig {
    /// Landing route for a role, falling back to login
    pub fn landing_for(&self, role: Role) -> &str {
        self.landing
            .get(role.as_str())
            .map(String::as_str)
            .unwrap_or(&self.login)
    }

    /// Whether `path` belongs to the login family (redirect-loop guard).
    /// Configured paths match as suffixes so a deployment prefix is ignored.
    pub fn is_login_path(&self, path: &str) -> bool {
        path.contains("login")
            || self.login_paths.iter().any(|p| {
                if p == "/" {
                    path == "/" || path.ends_with('/')
                } else {
                    path.ends_with(p.as_str())
                }
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".licita"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LicitaConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: LicitaConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise defaults; then applies env overrides
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("LICITA_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(level) = std::env::var("LICITA_LOG") {
            self.log.level = level;
        }
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session.timeout_minutes)
    }

    pub fn session_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session.check_interval_secs)
    }

    pub fn autosave_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.draft.autosave_interval_secs)
    }
}
