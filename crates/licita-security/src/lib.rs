//! Licita security layer
//!
//! - **Permissions**: static role → action allow-sets
//! - **Sessions**: session blob, expiry and the explicit [`SessionContext`]
//! - **Authenticator**: page gating state machine, login and logout
//! - **Activity log**: capped local access log
//! - **Data filter**: per-role record visibility
//! - **Registration**: supplier and buyer sign-up payloads

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod activity;
pub mod auth;
pub mod filter;
pub mod permissions;
pub mod registration;
pub mod session;

pub use activity::{ActivityEntry, ActivityLog};
pub use auth::{
    AuthBackend, Authenticator, LoginGrant, MockAuthBackend, PageAccess, PageRequirement,
    SessionEvent, SessionStatus,
};
pub use filter::{DataFilter, RecordCategory, Scoped};
pub use permissions::{AccessControl, Action};
pub use registration::{BuyerRegistration, Registrar, SupplierRegistration};
pub use session::{Session, SessionContext, SessionStore};

use licita_common::LicitaError;
use thiserror::Error;

/// Authentication and authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Backend refused the request; message is shown as-is
    #[error("{0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Action not permitted: {0}")]
    Forbidden(Action),

    #[error("No active session")]
    NoSession,

    #[error(transparent)]
    Storage(#[from] LicitaError),
}

impl AuthError {
    /// Text suitable for the UI
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network(_) => licita_common::messages::NETWORK_ERROR.to_string(),
            AuthError::NoSession => licita_common::messages::SESSION_EXPIRED.to_string(),
            AuthError::Forbidden(_) => licita_common::messages::ACCESS_DENIED.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
