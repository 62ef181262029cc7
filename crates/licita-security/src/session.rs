//! Session blob and the context handed to components after a page check.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use licita_common::store::keys;
use licita_common::{JsonStoreExt, KeyValueStore, Principal, Role};

use crate::permissions::{AccessControl, Action};

/// Authenticated session as persisted in the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Principal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(principal: Principal, token: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            principal,
            token,
            started_at: now,
            last_activity: now,
        }
    }

    /// Time since login
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.started_at
    }

    /// Expiry is measured from `started_at`, not from the last activity
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.elapsed(now) > timeout
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

/// Explicit session value threaded through the components of a page
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    session: Session,
    effective_role: Role,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        let effective_role = session.principal.effective_role();
        Self {
            session,
            effective_role,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.session.principal
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn effective_role(&self) -> Role {
        self.effective_role
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token.as_deref()
    }

    pub fn can(&self, action: Action) -> bool {
        AccessControl::allows(self.effective_role, action)
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}

/// Typed access to the session slot
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Malformed blobs surface as serialization errors
    pub fn load(&self) -> licita_common::Result<Option<Session>> {
        self.store.get_json(keys::SESSION)
    }

    pub fn save(&self, session: &Session) -> licita_common::Result<()> {
        self.store.set_json(keys::SESSION, session)
    }

    /// Drops every session-scoped key
    pub fn clear(&self) -> licita_common::Result<()> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use licita_common::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_is_strictly_after_timeout() {
        let session = Session::new(Principal::new("u1", "Ana", Role::Buyer), None, t0());
        let timeout = Duration::minutes(30);
        assert!(!session.is_expired(t0() + Duration::minutes(30), timeout));
        assert!(session.is_expired(t0() + Duration::minutes(30) + Duration::seconds(1), timeout));
    }

    #[test]
    fn test_touch_does_not_extend_lifetime() {
        let mut session = Session::new(Principal::new("u1", "Ana", Role::Buyer), None, t0());
        session.touch(t0() + Duration::minutes(29));
        assert!(session.is_expired(t0() + Duration::minutes(31), Duration::minutes(30)));
    }

    #[test]
    fn test_store_round_trip_and_clear() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        let session = Session::new(
            Principal::new("u1", "Ana", Role::Supplier).with_tax_id("12345678000190"),
            Some("tok".to_string()),
            t0(),
        );
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_context_uses_effective_role() {
        let principal = Principal::new("u1", "Ana", Role::Buyer)
            .with_access_level(licita_common::AccessLevel::Manager);
        let ctx = SessionContext::new(Session::new(principal, None, t0()));
        assert_eq!(ctx.effective_role(), Role::Manager);
        assert!(ctx.can(Action::ApproveProcess));
    }
}
