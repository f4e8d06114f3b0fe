use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rainbot_core::types::{RecipientId, Trigger};
use rainbot_store::Store;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, SchedulerError},
    schedule::next_fire,
    types::{Fire, SchedulerState},
};

/// An active trigger plus its parsed zone and next due instant.
struct Slot {
    trigger: Trigger,
    tz: Tz,
    next_fire: DateTime<Utc>,
}

/// Daily-trigger scheduler with durable storage and one slot per recipient.
///
/// The store is the source of truth; the in-memory slot map is what the tick
/// loop reads. Every mutation writes the store first and only then touches
/// the slot, both under the same lock, so:
/// - a trigger is never active without having been persisted,
/// - concurrent writes for one key serialize (last committed wins),
/// - the tick loop never sees a half-applied definition.
///
/// Fired triggers leave through `fired_tx` with `try_send`, so the loop is
/// never blocked by a slow delivery.
pub struct Scheduler {
    store: Arc<dyn Store>,
    slots: Mutex<HashMap<RecipientId, Slot>>,
    fired_tx: mpsc::Sender<Fire>,
    tick: Duration,
    state: Mutex<SchedulerState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, fired_tx: mpsc::Sender<Fire>, tick: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
            fired_tx,
            tick,
            state: Mutex::new(SchedulerState::Idle),
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *lock(&self.state)
    }

    /// Load persisted triggers and spawn the tick loop.
    ///
    /// Returns the number of triggers activated. Fires missed while the
    /// process was down are not replayed.
    pub fn start(self: &Arc<Self>) -> Result<usize> {
        {
            let mut state = lock(&self.state);
            if *state == SchedulerState::Running {
                return Err(SchedulerError::AlreadyRunning);
            }
            *state = SchedulerState::Running;
        }

        let loaded = match self.reload(Utc::now()) {
            Ok(n) => n,
            Err(e) => {
                *lock(&self.state) = SchedulerState::Idle;
                return Err(e);
            }
        };

        self.shutdown.send_replace(false);
        let rx = self.shutdown.subscribe();
        let handle = tokio::spawn(Arc::clone(self).run(rx));
        *lock(&self.task) = Some(handle);

        info!(triggers = loaded, "scheduler started");
        Ok(loaded)
    }

    /// Signal the tick loop to exit and wait for it.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("scheduler loop ended abnormally: {e}");
            }
        }
        *lock(&self.state) = SchedulerState::Stopped;
        info!("scheduler stopped");
    }

    /// Replace the in-memory slots with the store's contents.
    pub fn reload(&self, now: DateTime<Utc>) -> Result<usize> {
        // Hold the slot lock across the read so a concurrent upsert is
        // either already in the store or applied after the reload.
        let mut slots = lock(&self.slots);
        let triggers = self.store.load_triggers()?;
        slots.clear();
        for trigger in triggers {
            match slot_for(trigger, now) {
                Ok(slot) => {
                    slots.insert(slot.trigger.recipient, slot);
                }
                Err(e) => warn!("skipping stored trigger: {e}"),
            }
        }
        Ok(slots.len())
    }

    /// Create or replace the trigger for `trigger.recipient`.
    ///
    /// Returns the next fire instant.
    pub fn upsert(&self, trigger: Trigger) -> Result<DateTime<Utc>> {
        self.upsert_at(trigger, Utc::now())
    }

    pub fn upsert_at(&self, trigger: Trigger, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let slot = slot_for(trigger, now)?;
        let next = slot.next_fire;

        let mut slots = lock(&self.slots);
        self.store.upsert_trigger(&slot.trigger)?;
        let recipient = slot.trigger.recipient;
        let replaced = slots.insert(recipient, slot).is_some();

        info!(%recipient, next_fire = %next, replaced, "trigger active");
        Ok(next)
    }

    /// Delete the trigger for `recipient`. `Ok(false)` if there was none.
    pub fn remove(&self, recipient: RecipientId) -> Result<bool> {
        let mut slots = lock(&self.slots);
        let stored = self.store.remove_trigger(recipient)?;
        let active = slots.remove(&recipient).is_some();
        if stored || active {
            info!(%recipient, "trigger removed");
        }
        Ok(stored || active)
    }

    pub fn get(&self, recipient: RecipientId) -> Option<Trigger> {
        lock(&self.slots).get(&recipient).map(|s| s.trigger.clone())
    }

    pub fn next_fire(&self, recipient: RecipientId) -> Option<DateTime<Utc>> {
        lock(&self.slots).get(&recipient).map(|s| s.next_fire)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Fire every trigger due at `now` and advance it to its next day.
    ///
    /// A slot only advances once its fire is in the dispatch channel. When
    /// the channel is full the slot stays due and is retried on the next
    /// tick, so a burst of same-minute triggers is delayed, never dropped.
    ///
    /// Returns how many fires were handed to the dispatch channel.
    pub fn tick_at(&self, now: DateTime<Utc>) -> usize {
        let mut slots = lock(&self.slots);
        let mut sent = 0;
        let mut deferred = 0;

        for slot in slots.values_mut().filter(|slot| slot.next_fire <= now) {
            let recipient = slot.trigger.recipient;
            let fire = Fire {
                trigger: slot.trigger.clone(),
                scheduled_for: slot.next_fire,
            };
            // try_send never blocks the tick loop.
            match self.fired_tx.try_send(fire) {
                Ok(()) => {
                    debug!(%recipient, scheduled_for = %slot.next_fire, "trigger fired");
                    sent += 1;
                }
                Err(TrySendError::Full(_)) => {
                    deferred += 1;
                    continue;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(%recipient, "dispatch channel closed; fire dropped");
                }
            }
            let t = &slot.trigger;
            slot.next_fire = next_fire(t.hour, t.minute, &slot.tz, now)
                // unreachable for a validated slot; keep it from refiring
                .unwrap_or(now + chrono::Duration::days(1));
        }

        if deferred > 0 {
            warn!(deferred, "dispatch channel full; retrying on next tick");
        }
        sent
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(tick_ms = self.tick.as_millis() as u64, "scheduler loop started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_at(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}

fn slot_for(trigger: Trigger, now: DateTime<Utc>) -> Result<Slot> {
    if trigger.payload.recipient != trigger.recipient {
        return Err(SchedulerError::InvalidSchedule(format!(
            "payload recipient {} does not match key {}",
            trigger.payload.recipient, trigger.recipient
        )));
    }
    let tz: Tz = trigger.timezone.parse().map_err(|_| {
        SchedulerError::InvalidSchedule(format!("unknown time zone '{}'", trigger.timezone))
    })?;
    let next = next_fire(trigger.hour, trigger.minute, &tz, now).ok_or_else(|| {
        SchedulerError::InvalidSchedule(format!(
            "time out of range: {}:{}",
            trigger.hour, trigger.minute
        ))
    })?;
    Ok(Slot {
        trigger,
        tz,
        next_fire: next,
    })
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use rainbot_core::types::Location;
    use rainbot_store::{MemoryStore, SqliteStore, StoreError};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn london(id: i64, hour: u8, minute: u8) -> Trigger {
        Trigger::daily(
            RecipientId(id),
            hour,
            minute,
            "Europe/London",
            Location { lat: 51.5, lng: -0.12 },
        )
    }

    fn scheduler(store: Arc<dyn Store>) -> (Arc<Scheduler>, mpsc::Receiver<Fire>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Arc::new(Scheduler::new(store, tx, Duration::from_millis(10))),
            rx,
        )
    }

    /// Store whose trigger writes always fail.
    struct BrokenStore(MemoryStore);

    impl Store for BrokenStore {
        fn get_location(&self, r: RecipientId) -> rainbot_store::Result<Option<Location>> {
            self.0.get_location(r)
        }
        fn set_location(&self, r: RecipientId, l: Location) -> rainbot_store::Result<()> {
            self.0.set_location(r, l)
        }
        fn upsert_trigger(&self, _: &Trigger) -> rainbot_store::Result<()> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        fn remove_trigger(&self, _: RecipientId) -> rainbot_store::Result<bool> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        fn load_triggers(&self) -> rainbot_store::Result<Vec<Trigger>> {
            self.0.load_triggers()
        }
    }

    #[test]
    fn upsert_twice_keeps_one_trigger_with_latest_fields() {
        let store = Arc::new(MemoryStore::default());
        let (s, _rx) = scheduler(store.clone());
        s.upsert(london(42, 7, 30)).unwrap();
        s.upsert(london(42, 18, 5)).unwrap();

        assert_eq!(s.active_count(), 1);
        let t = s.get(RecipientId(42)).unwrap();
        assert_eq!((t.hour, t.minute), (18, 5));
        assert_eq!(store.load_triggers().unwrap(), vec![london(42, 18, 5)]);
    }

    #[test]
    fn upsert_rejects_unknown_zone_without_persisting() {
        let store = Arc::new(MemoryStore::default());
        let (s, _rx) = scheduler(store.clone());
        let mut t = london(1, 7, 0);
        t.timezone = "Mars/Olympus_Mons".to_string();

        let err = s.upsert(t).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
        assert_eq!(s.active_count(), 0);
        assert!(store.load_triggers().unwrap().is_empty());
    }

    #[test]
    fn upsert_rejects_out_of_range_time() {
        let (s, _rx) = scheduler(Arc::new(MemoryStore::default()));
        assert!(s.upsert(london(1, 24, 0)).is_err());
        assert!(s.upsert(london(1, 7, 60)).is_err());
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn persistence_failure_leaves_previous_trigger_active() {
        let inner = MemoryStore::default();
        inner.upsert_trigger(&london(42, 7, 30)).unwrap();
        let (s, _rx) = scheduler(Arc::new(BrokenStore(inner)));
        s.reload(Utc::now()).unwrap();

        let err = s.upsert(london(42, 9, 0)).unwrap_err();
        assert!(matches!(err, SchedulerError::Persistence(_)));
        assert_eq!(s.get(RecipientId(42)).unwrap().hour, 7);

        assert!(s.remove(RecipientId(42)).is_err());
        assert_eq!(s.active_count(), 1);
    }

    #[test]
    fn remove_is_noop_safe() {
        let (s, _rx) = scheduler(Arc::new(MemoryStore::default()));
        assert!(!s.remove(RecipientId(5)).unwrap());
        s.upsert(london(5, 7, 0)).unwrap();
        assert!(s.remove(RecipientId(5)).unwrap());
        assert!(!s.remove(RecipientId(5)).unwrap());
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn tick_fires_once_and_advances_a_day() {
        let (s, mut rx) = scheduler(Arc::new(MemoryStore::default()));
        let next = s
            .upsert_at(london(42, 7, 30), utc("2024-06-10T05:00:00Z"))
            .unwrap();
        assert_eq!(next, utc("2024-06-10T06:30:00Z"));

        assert_eq!(s.tick_at(utc("2024-06-10T06:29:59Z")), 0);
        assert_eq!(s.tick_at(utc("2024-06-10T06:30:00Z")), 1);
        assert_eq!(s.tick_at(utc("2024-06-10T06:30:01Z")), 0);

        let fire = rx.try_recv().unwrap();
        assert_eq!(fire.trigger, london(42, 7, 30));
        assert_eq!(fire.scheduled_for, utc("2024-06-10T06:30:00Z"));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            s.next_fire(RecipientId(42)),
            Some(utc("2024-06-11T06:30:00Z"))
        );
    }

    #[test]
    fn dst_transition_day_fires_exactly_once() {
        let (s, mut rx) = scheduler(Arc::new(MemoryStore::default()));
        s.upsert_at(london(1, 8, 0), utc("2024-03-30T12:00:00Z"))
            .unwrap();

        // Step through the transition day a minute at a time.
        let mut t = utc("2024-03-30T23:00:00Z");
        let end = utc("2024-03-31T23:00:00Z");
        let mut fired = Vec::new();
        while t < end {
            if s.tick_at(t) > 0 {
                fired.push(rx.try_recv().unwrap().scheduled_for);
            }
            t += chrono::Duration::minutes(1);
        }
        assert_eq!(fired, vec![utc("2024-03-31T07:00:00Z")]);
    }

    #[test]
    fn removed_trigger_never_fires_again() {
        let (s, mut rx) = scheduler(Arc::new(MemoryStore::default()));
        s.upsert_at(london(42, 7, 30), utc("2024-06-10T05:00:00Z"))
            .unwrap();
        assert!(s.remove(RecipientId(42)).unwrap());

        for day in 10..15 {
            let at = utc(&format!("2024-06-{day}T06:30:00Z"));
            assert_eq!(s.tick_at(at), 0);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn independent_triggers_fire_independently() {
        let (s, mut rx) = scheduler(Arc::new(MemoryStore::default()));
        let now = utc("2024-06-10T00:00:00Z");
        s.upsert_at(london(1, 7, 0), now).unwrap();
        s.upsert_at(london(2, 7, 0), now).unwrap();
        s.upsert_at(london(3, 9, 0), now).unwrap();

        assert_eq!(s.tick_at(utc("2024-06-10T06:00:00Z")), 2);
        let mut ids = vec![
            rx.try_recv().unwrap().trigger.recipient,
            rx.try_recv().unwrap().trigger.recipient,
        ];
        ids.sort();
        assert_eq!(ids, vec![RecipientId(1), RecipientId(2)]);
    }

    #[test]
    fn burst_larger_than_channel_is_delivered_over_later_ticks() {
        let (tx, mut rx) = mpsc::channel(256);
        let s = Scheduler::new(
            Arc::new(MemoryStore::default()),
            tx,
            Duration::from_secs(1),
        );
        let now = utc("2024-06-10T00:00:00Z");
        for id in 0..300 {
            s.upsert_at(london(id, 7, 0), now).unwrap();
        }

        let due = utc("2024-06-10T06:00:00Z");
        let mut received = HashSet::new();
        let mut drain = |rx: &mut mpsc::Receiver<Fire>| {
            while let Ok(fire) = rx.try_recv() {
                assert_eq!(fire.scheduled_for, due);
                assert!(received.insert(fire.trigger.recipient), "fired twice");
            }
        };

        assert_eq!(s.tick_at(due), 256);
        drain(&mut rx);
        assert_eq!(s.tick_at(due + chrono::Duration::seconds(1)), 44);
        drain(&mut rx);
        assert_eq!(s.tick_at(due + chrono::Duration::seconds(2)), 0);

        assert_eq!(received.len(), 300);
        for id in 0..300 {
            assert_eq!(
                s.next_fire(RecipientId(id)),
                Some(utc("2024-06-11T06:00:00Z"))
            );
        }
    }

    #[test]
    fn closed_channel_advances_instead_of_refiring() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let s = Scheduler::new(
            Arc::new(MemoryStore::default()),
            tx,
            Duration::from_secs(1),
        );
        s.upsert_at(london(1, 7, 0), utc("2024-06-10T00:00:00Z"))
            .unwrap();
        assert_eq!(s.tick_at(utc("2024-06-10T06:00:00Z")), 0);
        assert_eq!(
            s.next_fire(RecipientId(1)),
            Some(utc("2024-06-11T06:00:00Z"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_for_one_key_serialize() {
        let store = Arc::new(MemoryStore::default());
        let (s, _rx) = scheduler(store.clone());

        // hour == minute and lat's integer part == hour, so a definition
        // mixed from two writes is detectable.
        let trigger = |worker: u8, hour: u8| {
            Trigger::daily(
                RecipientId(42),
                hour,
                hour,
                "Europe/London",
                Location {
                    lat: f64::from(hour) + f64::from(worker) / 100.0,
                    lng: 0.0,
                },
            )
        };

        let mut tasks = Vec::new();
        for worker in 0..8u8 {
            let s = Arc::clone(&s);
            tasks.push(tokio::spawn(async move {
                for round in 0..50u8 {
                    let n = worker.wrapping_add(round);
                    if n % 3 == 0 {
                        s.remove(RecipientId(42)).unwrap();
                    } else {
                        s.upsert(trigger(worker, n % 24)).unwrap();
                    }
                    assert!(s.active_count() <= 1);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(s.active_count() <= 1);
        let stored = store.load_triggers().unwrap();
        assert!(stored.len() <= 1);
        let active = s.get(RecipientId(42));
        assert_eq!(stored.first().cloned(), active);
        if let Some(t) = active {
            assert_eq!(t.hour, t.minute);
            assert_eq!(t.payload.lat.floor() as u8, t.hour);
        }
    }

    /// Store that runs a one-shot hook inside `load_triggers`.
    struct HookedStore {
        inner: MemoryStore,
        hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl Store for HookedStore {
        fn get_location(&self, r: RecipientId) -> rainbot_store::Result<Option<Location>> {
            self.inner.get_location(r)
        }
        fn set_location(&self, r: RecipientId, l: Location) -> rainbot_store::Result<()> {
            self.inner.set_location(r, l)
        }
        fn upsert_trigger(&self, t: &Trigger) -> rainbot_store::Result<()> {
            self.inner.upsert_trigger(t)
        }
        fn remove_trigger(&self, r: RecipientId) -> rainbot_store::Result<bool> {
            self.inner.remove_trigger(r)
        }
        fn load_triggers(&self) -> rainbot_store::Result<Vec<Trigger>> {
            let triggers = self.inner.load_triggers()?;
            let hook = self.hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            Ok(triggers)
        }
    }

    #[test]
    fn upsert_racing_a_reload_is_kept() {
        let store = Arc::new(HookedStore {
            inner: MemoryStore::default(),
            hook: Mutex::new(None),
        });
        let (s, _rx) = scheduler(store.clone());

        let racer = Arc::clone(&s);
        let writer = Arc::new(Mutex::new(None));
        let writer_slot = Arc::clone(&writer);
        *store.hook.lock().unwrap() = Some(Box::new(move || {
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            let handle = std::thread::spawn(move || {
                racer.upsert(london(7, 7, 0)).unwrap();
                let _ = done_tx.send(());
            });
            // Let the upsert land now if it can.
            let _ = done_rx.recv_timeout(Duration::from_millis(200));
            *writer_slot.lock().unwrap() = Some(handle);
        }));

        s.reload(Utc::now()).unwrap();
        let handle = writer.lock().unwrap().take().unwrap();
        handle.join().unwrap();

        assert_eq!(s.get(RecipientId(7)), Some(london(7, 7, 0)));
        assert_eq!(store.load_triggers().unwrap(), vec![london(7, 7, 0)]);
    }

    #[tokio::test]
    async fn lifecycle_start_stop() {
        let (s, _rx) = scheduler(Arc::new(MemoryStore::default()));
        assert_eq!(s.state(), SchedulerState::Idle);
        s.start().unwrap();
        assert_eq!(s.state(), SchedulerState::Running);
        assert!(matches!(s.start(), Err(SchedulerError::AlreadyRunning)));
        s.stop().await;
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn triggers_resume_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rainbot.db");
        let path = path.to_str().unwrap();

        {
            let store = Arc::new(SqliteStore::open(path, "RainBot").unwrap());
            let (s, _rx) = scheduler(store);
            s.start().unwrap();
            s.upsert(london(42, 7, 30)).unwrap();
            s.upsert(london(43, 20, 0)).unwrap();
            s.remove(RecipientId(43)).unwrap();
            s.stop().await;
        }

        let store = Arc::new(SqliteStore::open(path, "RainBot").unwrap());
        let (s, _rx) = scheduler(store);
        assert_eq!(s.start().unwrap(), 1);
        assert_eq!(s.get(RecipientId(42)), Some(london(42, 7, 30)));
        assert!(s.get(RecipientId(43)).is_none());
        s.stop().await;
    }

    #[test]
    fn reload_skips_stored_trigger_with_bad_zone() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = SqliteStore::from_connection(conn, "RainBot").unwrap();
        store.upsert_trigger(&london(1, 7, 0)).unwrap();
        let mut bad = london(2, 7, 0);
        bad.timezone = "Nowhere/Land".to_string();
        store.upsert_trigger(&bad).unwrap();

        let (s, _rx) = scheduler(Arc::new(store));
        assert_eq!(s.reload(Utc::now()).unwrap(), 1);
        assert!(s.get(RecipientId(2)).is_none());
    }
}
