//! Licita common layer
//!
//! Shared building blocks for the bid-submission client:
//! - **Domain types**: principals, roles, process and proposal records
//! - **Storage**: the key-value surface standing in for browser session/local storage
//! - **Configuration**: TOML-backed settings with defaults for every section
//! - **Clock**: injectable time source so expiry logic stays testable

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod error;
pub mod messages;
pub mod store;
pub mod telemetry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LicitaConfig;
pub use error::{LicitaError, Result};
pub use store::{BrowserStorage, FileStore, JsonStoreExt, KeyValueStore, MemoryStore};
pub use types::{
    normalize_tax_id, AccessLevel, Principal, ProcessRecord, ProcessStatus, ProposalRecord, Role,
};
