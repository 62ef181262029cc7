//! Draft cache and the periodic auto-save task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use licita_common::store::keys;
use licita_common::{Clock, JsonStoreExt, KeyValueStore};

use crate::document::ProposalForm;

/// Recoverable snapshot of an unsent form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub form: ProposalForm,
    pub saved_at: DateTime<Utc>,
}

/// The single draft slot in the local store
#[derive(Clone)]
pub struct DraftCache {
    store: Arc<dyn KeyValueStore>,
}

impl DraftCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, form: &ProposalForm, now: DateTime<Utc>) -> licita_common::Result<()> {
        let draft = Draft {
            form: form.clone(),
            saved_at: now,
        };
        self.store.set_json(keys::DRAFT, &draft)
    }

    /// An unreadable draft is dropped rather than reported
    pub fn load(&self) -> Option<Draft> {
        match self.store.get_json::<Draft>(keys::DRAFT) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Discarding unreadable draft: {}", e);
                if let Err(e) = self.store.remove(keys::DRAFT) {
                    warn!("Failed to remove draft: {}", e);
                }
                None
            }
        }
    }

    pub fn clear(&self) -> licita_common::Result<()> {
        self.store.remove(keys::DRAFT)
    }
}

/// Anything that can hand out the current form state
pub trait DraftSource: Send + Sync {
    /// `None` when there is nothing worth saving
    fn snapshot(&self) -> Option<ProposalForm>;
}

impl DraftSource for RwLock<ProposalForm> {
    fn snapshot(&self) -> Option<ProposalForm> {
        let form = self.read();
        (*form != ProposalForm::default()).then(|| form.clone())
    }
}

/// Writes the draft slot on a fixed period
pub struct AutoSaver {
    cache: DraftCache,
    clock: Arc<dyn Clock>,
    period: Duration,
    last_saved: Mutex<Option<ProposalForm>>,
}

impl AutoSaver {
    pub fn new(cache: DraftCache, clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self {
            cache,
            clock,
            period,
            last_saved: Mutex::new(None),
        }
    }

    /// One save pass. Returns whether the slot was written; an unchanged
    /// form is not rewritten.
    pub fn save_now(&self, source: &dyn DraftSource) -> bool {
        let Some(form) = source.snapshot() else {
            return false;
        };

        let mut last = self.last_saved.lock();
        if last.as_ref() == Some(&form) {
            return false;
        }

        match self.cache.save(&form, self.clock.now()) {
            Ok(()) => {
                debug!("Draft saved for process {}", form.process);
                *last = Some(form);
                true
            }
            Err(e) => {
                warn!("Auto-save failed: {}", e);
                false
            }
        }
    }

    /// First save happens one period after spawning
    pub fn spawn(self: Arc<Self>, source: Arc<dyn DraftSource>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Auto-save stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.save_now(source.as_ref());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use licita_common::{ManualClock, MemoryStore};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, DraftCache, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let cache = DraftCache::new(store.clone());
        (store, cache, Arc::new(ManualClock::new(t0())))
    }

    #[test]
    fn test_cache_round_trip() {
        let (_, cache, _) = setup();
        assert!(cache.load().is_none());

        let form = ProposalForm::for_process("CC-1");
        cache.save(&form, t0()).unwrap();
        let draft = cache.load().unwrap();
        assert_eq!(draft.form, form);
        assert_eq!(draft.saved_at, t0());

        cache.clear().unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_unreadable_draft_is_dropped() {
        let (store, cache, _) = setup();
        store.set(keys::DRAFT, "[1,2".to_string()).unwrap();
        assert!(cache.load().is_none());
        assert_eq!(store.get(keys::DRAFT).unwrap(), None);
    }

    #[test]
    fn test_save_now_skips_empty_and_unchanged() {
        let (_, cache, clock) = setup();
        let saver = AutoSaver::new(cache.clone(), clock.clone(), Duration::from_secs(30));
        let source = RwLock::new(ProposalForm::default());

        assert!(!saver.save_now(&source));

        source.write().process = "CC-2".to_string();
        assert!(saver.save_now(&source));
        clock.advance(chrono::Duration::seconds(30));
        assert!(!saver.save_now(&source));
        assert_eq!(cache.load().unwrap().saved_at, t0());

        source.write().payment_terms = "à vista".to_string();
        assert!(saver.save_now(&source));
        assert_eq!(cache.load().unwrap().saved_at, t0() + chrono::Duration::seconds(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_saver_writes_after_period() {
        let (_, cache, clock) = setup();
        let saver = Arc::new(AutoSaver::new(cache.clone(), clock, Duration::from_secs(30)));
        let source = Arc::new(RwLock::new(ProposalForm::for_process("CC-3")));
        let cancel = CancellationToken::new();

        let handle = saver.spawn(source.clone(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(cache.load().is_none());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(cache.load().unwrap().form.process, "CC-3");

        cancel.cancel();
        handle.await.unwrap();
    }
}
