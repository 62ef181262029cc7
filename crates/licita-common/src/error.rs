use thiserror::Error;

/// Errors shared by every Licita crate
#[derive(Error, Debug)]
pub enum LicitaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown {kind}: {value}")]
    Unknown { kind: &'static str, value: String },
}

impl From<toml::de::Error> for LicitaError {
    fn from(e: toml::de::Error) -> Self {
        LicitaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LicitaError>;
