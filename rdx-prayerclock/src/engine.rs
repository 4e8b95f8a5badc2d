//! The core engine that ties the prayerclock system together.

use crate::alerts::AlertSink;
use crate::common::{CalculationMethod, ListenerId};
use crate::components::listener::{DateListener, PrayerListener};
use crate::components::watcher::{DateWatcher, PrayerWatcher};
use crate::config::EngineConfig;
use crate::coordinator::{RefreshCoordinator, RefreshStatus};
use crate::countdown::{CountdownEngine, CountdownState};
use crate::error::{AlertError, RefreshError};
use crate::events::{
    AlertEvent, CountdownEvent, PrayerEvent, PreferenceEvent, ScheduleEvent, SystemEvent,
};
use crate::i18n::Language;
use crate::location::{LocationResolver, LocationSelection, LocationSensor, ResolvedLocation};
use crate::prefs::{keys, NotificationPreference, PreferenceStore, Preferences};
use crate::provider::TimingProvider;
use crate::resolver::PrayerInstant;
use crate::scheduler::{NotificationScheduler, RescheduleReport, TestAlert};
use crate::schedule::{PrayerKey, ScheduleSnapshot};
use crate::time::{Clock, LocalZone, SystemClock, TickEvent};
use chrono::{DateTime, NaiveDate, Utc};
use slotmap::SlotMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// The outside world, as seen by the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn TimingProvider>,
    pub sensor: Arc<dyn LocationSensor>,
    pub alerts: Arc<dyn AlertSink>,
    pub store: Arc<dyn PreferenceStore>,
    pub clock: Arc<dyn Clock>,
}

/// The main prayerclock engine.
///
/// This struct is the central point of control. It holds the configuration,
/// the user's preferences, the current schedule and countdown, and drives the
/// event loop. The engine is designed to be cloned and shared across tasks;
/// every clone is a handle to the same running instance.
#[derive(Clone)]
pub struct PrayerClockEngine {
    config: Arc<EngineConfig>,
    zone: LocalZone,
    clock: Arc<dyn Clock>,
    store: Arc<dyn PreferenceStore>,
    preferences: Arc<RwLock<Preferences>>,
    coordinator: Arc<RefreshCoordinator>,
    scheduler: Arc<NotificationScheduler>,
    countdown: Arc<RwLock<CountdownEngine>>,
    apply_gate: Arc<Mutex<()>>,
    reschedule_gate: Arc<Mutex<()>>,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    schedule_event_sender: broadcast::Sender<ScheduleEvent>,
    countdown_event_sender: broadcast::Sender<CountdownEvent>,
    prayer_event_sender: broadcast::Sender<PrayerEvent>,
    preference_event_sender: broadcast::Sender<PreferenceEvent>,
    alert_event_sender: broadcast::Sender<AlertEvent>,
    date_watcher: Arc<RwLock<DateWatcher>>,
    prayer_watcher: Arc<RwLock<PrayerWatcher>>,
    prayer_listeners: Arc<RwLock<SlotMap<ListenerId, PrayerListener>>>,
    date_listeners: Arc<RwLock<SlotMap<ListenerId, DateListener>>>,
}

// Core implementation block for internal logic.
impl PrayerClockEngine {
    /// Creates a new engine. Preferences are read from the store once, here.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        const CHANNEL_CAPACITY: usize = 256;
        let (tick_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (system_event_sender, _) = broadcast::channel(64);
        let (schedule_event_sender, _) = broadcast::channel(64);
        let (countdown_event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (prayer_event_sender, _) = broadcast::channel(64);
        let (preference_event_sender, _) = broadcast::channel(64);
        let (alert_event_sender, _) = broadcast::channel(64);

        let zone = config.local_zone();
        let now = collaborators.clock.now();
        let preferences = Preferences::load(collaborators.store.as_ref());
        let resolver = LocationResolver::new(collaborators.sensor, config.default_city);
        let coordinator = RefreshCoordinator::new(resolver, collaborators.provider);
        let scheduler = NotificationScheduler::new(collaborators.alerts, config.alerts.clone());
        let countdown = CountdownEngine::new(config.label_format, zone, preferences.language);

        Self {
            config: Arc::new(config),
            zone,
            clock: collaborators.clock,
            store: collaborators.store,
            preferences: Arc::new(RwLock::new(preferences)),
            coordinator: Arc::new(coordinator),
            scheduler: Arc::new(scheduler),
            countdown: Arc::new(RwLock::new(countdown)),
            apply_gate: Arc::new(Mutex::new(())),
            reschedule_gate: Arc::new(Mutex::new(())),
            tick_sender,
            system_event_sender,
            schedule_event_sender,
            countdown_event_sender,
            prayer_event_sender,
            preference_event_sender,
            alert_event_sender,
            date_watcher: Arc::new(RwLock::new(DateWatcher::new(zone, now))),
            prayer_watcher: Arc::new(RwLock::new(PrayerWatcher::new())),
            prayer_listeners: Arc::new(RwLock::new(SlotMap::with_key())),
            date_listeners: Arc::new(RwLock::new(SlotMap::with_key())),
        }
    }

    /// Runs the engine's main loop until Ctrl+C is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Runs the engine's main loop until `shutdown` resolves.
    ///
    /// This method will:
    /// 1. Spawn the `SystemClock` task.
    /// 2. Spawn the dispatcher task that listens for ticks and fires events.
    /// 3. Wait for `shutdown`, then stop both tasks.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        info!("PrayerClockEngine starting up...");
        let (shutdown_tx, _) = broadcast::channel(1);

        let clock = SystemClock::new(self.config.resolution.clone(), self.tick_sender.clone());
        let clock_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { clock.run(clock_shutdown_rx).await });

        let dispatcher = self.clone();
        let dispatcher_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.dispatcher_loop(dispatcher_shutdown_rx).await });

        info!(
            "Engine running at {:?} in zone {}.",
            self.config.resolution,
            self.zone.name()
        );
        let outcome = shutdown.await;

        info!("Shutdown signal received. Broadcasting to all tasks...");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("PrayerClockEngine has shut down.");
        outcome?;
        Ok(())
    }

    #[doc(hidden)]
    async fn dispatcher_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut tick_rx = self.tick_sender.subscribe();
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
            })
            .ok();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                Ok(tick) = tick_rx.recv() => {
                    trace!("Tick #{} received.", tick.tick_count);
                    self.step().await;
                }
            }
        }
    }

    /// Runs one dispatcher pass against the engine's clock.
    ///
    /// `run` calls this on every tick. Simulations driving a `ManualClock`
    /// can call it directly.
    pub async fn step(&self) {
        let now = self.clock.now();
        self.process_date_watcher(now).await;
        let state = self.recompute_countdown(now).await;
        let upcoming = state
            .upcoming
            .zip(state.upcoming_at)
            .map(|(key, at)| PrayerInstant { key, at });
        self.process_prayer_watcher(now, upcoming).await;
    }

    #[doc(hidden)]
    async fn process_date_watcher(&self, now: DateTime<Utc>) {
        let changed = self
            .date_watcher
            .write()
            .await
            .process_tick(now, &self.prayer_event_sender);
        let Some(new_date) = changed else {
            return;
        };
        info!("Local date is now {}.", new_date);
        for (_id, listener) in self.date_listeners.write().await.iter_mut() {
            listener.fire(new_date);
        }
        if self.config.auto_refresh_on_date_change {
            let engine = self.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.refresh().await {
                    warn!(
                        "Date-change refresh failed, re-arming from the held schedule: {}",
                        e
                    );
                    let _ = engine.reschedule();
                }
            });
        }
    }

    #[doc(hidden)]
    async fn process_prayer_watcher(&self, now: DateTime<Utc>, upcoming: Option<PrayerInstant>) {
        let reached = self
            .prayer_watcher
            .write()
            .await
            .process_tick(now, upcoming, &self.prayer_event_sender);
        if let Some(instant) = reached {
            info!("{} time reached.", instant.key);
            for (_id, listener) in self.prayer_listeners.write().await.iter_mut() {
                listener.fire(instant.key, instant.at);
            }
        }
    }

    #[doc(hidden)]
    async fn recompute_countdown(&self, now: DateTime<Utc>) -> CountdownState {
        let state = self.countdown.write().await.tick(now).clone();
        self.publish_countdown(&state, now);
        state
    }

    fn publish_countdown(&self, state: &CountdownState, now: DateTime<Utc>) {
        self.countdown_event_sender
            .send(CountdownEvent {
                state: state.clone(),
                at: now,
            })
            .ok();
    }

    /// Points the countdown at the schedule the coordinator holds.
    ///
    /// Overlapping refreshes may publish in one order and get here in
    /// another, so the held snapshot is re-read under the gate and
    /// `published` only stands in when nothing is held.
    #[doc(hidden)]
    async fn apply_snapshot(&self, published: Arc<ScheduleSnapshot>) {
        let _gate = self.apply_gate.lock().await;
        let snapshot = self.coordinator.snapshot().await.unwrap_or(published);
        let now = self.clock.now();
        match self.zone {
            LocalZone::Named(tz) if tz.name() != snapshot.timezone() => warn!(
                "Schedule is for zone {} but days roll over in {}.",
                snapshot.timezone(),
                tz.name()
            ),
            _ => {}
        }
        let state = self
            .countdown
            .write()
            .await
            .schedule_updated(snapshot.clone(), now)
            .clone();
        self.publish_countdown(&state, now);
        self.schedule_event_sender
            .send(ScheduleEvent::Replaced { snapshot })
            .ok();
        // Fire-and-forget; the outcome is published as an `AlertEvent`.
        let _ = self.reschedule();
    }

    #[doc(hidden)]
    async fn reschedule_latest(&self) -> Option<RescheduleReport> {
        let _gate = self.reschedule_gate.lock().await;
        // Read only after the gate so a queued pass sees the newest state.
        let Some(snapshot) = self.coordinator.snapshot().await else {
            debug!("No schedule yet; nothing to reschedule.");
            return None;
        };
        let preferences = self.preferences.read().await.clone();
        let report = self
            .scheduler
            .reschedule(&snapshot, &preferences, self.clock.now(), self.zone)
            .await;
        self.alert_event_sender
            .send(AlertEvent::Rescheduled(report.clone()))
            .ok();
        Some(report)
    }

    fn announce(&self, event: PreferenceEvent) {
        debug!("Preference changed: {:?}", event);
        self.preference_event_sender.send(event).ok();
    }
}

// Public API implementation block.
impl PrayerClockEngine {
    /// Fetches a fresh schedule for the current preferences.
    ///
    /// On success the countdown is recomputed and alerts are rescheduled in
    /// the background. On failure the previous schedule stays in use and the
    /// status carries a user-facing message.
    pub async fn refresh(&self) -> Result<Arc<ScheduleSnapshot>, RefreshError> {
        self.schedule_event_sender
            .send(ScheduleEvent::RefreshStarted)
            .ok();
        let preferences = self.preferences.read().await.clone();
        match self.coordinator.refresh(&preferences, self.clock.now()).await {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot.clone()).await;
                Ok(snapshot)
            }
            Err(e) => {
                let message = match self.coordinator.status().await {
                    RefreshStatus::Failed(message) => message,
                    _ => e.to_string(),
                };
                self.schedule_event_sender
                    .send(ScheduleEvent::RefreshFailed { message })
                    .ok();
                Err(e)
            }
        }
    }

    /// Recreates every prayer alert from the held schedule in the background.
    ///
    /// Never fetches. Passes are serialized and each one reads the state that
    /// is current when it starts. The handle may be dropped.
    pub fn reschedule(&self) -> JoinHandle<Option<RescheduleReport>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.reschedule_latest().await })
    }

    /// Changes one prayer's alert preference and reschedules.
    pub async fn set_notification(
        &self,
        key: PrayerKey,
        preference: NotificationPreference,
    ) -> JoinHandle<Option<RescheduleReport>> {
        {
            let mut preferences = self.preferences.write().await;
            preferences.set_notification(key, preference.clone());
            preferences.save_notification(self.store.as_ref(), key);
        }
        self.announce(PreferenceEvent::NotificationChanged { key, preference });
        self.reschedule()
    }

    /// Switches the language. The countdown relabels at once and alerts are
    /// rescheduled with the new titles.
    pub async fn set_language(&self, language: Language) -> JoinHandle<Option<RescheduleReport>> {
        {
            let mut preferences = self.preferences.write().await;
            preferences.language = language;
            self.store.set(keys::LANGUAGE, language.code());
        }
        self.announce(PreferenceEvent::LanguageChanged(language));
        let now = self.clock.now();
        let state = self
            .countdown
            .write()
            .await
            .language_changed(language, now)
            .clone();
        self.publish_countdown(&state, now);
        self.reschedule()
    }

    /// Changes where prayer times are computed for, then refreshes.
    pub async fn set_location(
        &self,
        selection: LocationSelection,
    ) -> Result<Arc<ScheduleSnapshot>, RefreshError> {
        {
            let mut preferences = self.preferences.write().await;
            preferences.location = selection;
            preferences.save_location(self.store.as_ref());
        }
        self.announce(PreferenceEvent::LocationChanged(selection));
        self.refresh().await
    }

    /// Changes the calculation method, then refreshes.
    pub async fn set_method(
        &self,
        method: CalculationMethod,
    ) -> Result<Arc<ScheduleSnapshot>, RefreshError> {
        {
            let mut preferences = self.preferences.write().await;
            preferences.method = method;
            self.store.set(keys::CALCULATION_METHOD, &method.to_string());
        }
        self.announce(PreferenceEvent::MethodChanged(method));
        self.refresh().await
    }

    /// Records the display time format. Nothing is recomputed.
    pub async fn set_time_format(&self, use_24h: bool) {
        {
            let mut preferences = self.preferences.write().await;
            preferences.time_format_24h = use_24h;
            self.store
                .set(keys::TIME_FORMAT_24, if use_24h { "true" } else { "false" });
        }
        self.announce(PreferenceEvent::TimeFormatChanged { use_24h });
    }

    /// Schedules the single test alert, replacing any previous one.
    pub async fn add_test_alert(
        &self,
        name: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<String, AlertError> {
        let language = self.preferences.read().await.language;
        let id = self.scheduler.add_test_alert(name, at, language).await?;
        self.alert_event_sender
            .send(AlertEvent::TestAlertAdded { id: id.clone() })
            .ok();
        Ok(id)
    }

    pub async fn remove_test_alert(&self) -> Result<Vec<String>, AlertError> {
        let ids = self.scheduler.remove_test_alert().await?;
        self.alert_event_sender
            .send(AlertEvent::TestAlertRemoved { ids: ids.clone() })
            .ok();
        Ok(ids)
    }

    /// Registers a callback for when a prayer time is reached.
    ///
    /// With `filter` set, only that prayer triggers the callback.
    ///
    /// # Returns
    /// A `ListenerId` which can be used to later remove this listener.
    pub async fn on_prayer(
        &self,
        filter: Option<PrayerKey>,
        callback: impl FnMut(PrayerKey, DateTime<Utc>) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self
            .prayer_listeners
            .write()
            .await
            .insert(PrayerListener::new(filter, Box::new(callback)));
        self.system_event_sender
            .send(SystemEvent::ListenerAdded { id })
            .ok();
        id
    }

    /// Registers a callback for when the local date changes.
    pub async fn on_date_changed(
        &self,
        callback: impl FnMut(NaiveDate) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self
            .date_listeners
            .write()
            .await
            .insert(DateListener::new(Box::new(callback)));
        self.system_event_sender
            .send(SystemEvent::ListenerAdded { id })
            .ok();
        id
    }

    /// Removes a prayer listener. Returns `true` if it was found.
    pub async fn remove_prayer_listener(&self, id: ListenerId) -> bool {
        let was_removed = self.prayer_listeners.write().await.remove(id).is_some();
        if was_removed {
            self.system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
        was_removed
    }

    /// Removes a date listener. Returns `true` if it was found.
    pub async fn remove_date_listener(&self, id: ListenerId) -> bool {
        let was_removed = self.date_listeners.write().await.remove(id).is_some();
        if was_removed {
            self.system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
        was_removed
    }

    pub async fn schedule(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.coordinator.snapshot().await
    }

    pub async fn status(&self) -> RefreshStatus {
        self.coordinator.status().await
    }

    pub async fn location(&self) -> Option<ResolvedLocation> {
        self.coordinator.location().await
    }

    pub async fn countdown(&self) -> CountdownState {
        self.countdown.read().await.state().clone()
    }

    pub async fn preferences(&self) -> Preferences {
        self.preferences.read().await.clone()
    }

    pub async fn test_alert(&self) -> Option<TestAlert> {
        self.scheduler.test_alert().await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn zone(&self) -> LocalZone {
        self.zone
    }

    /// The current instant according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `ScheduleEvent` stream.
    pub fn subscribe_schedule_events(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.schedule_event_sender.subscribe()
    }

    /// Subscribes to the `CountdownEvent` stream.
    pub fn subscribe_countdown_events(&self) -> broadcast::Receiver<CountdownEvent> {
        self.countdown_event_sender.subscribe()
    }

    /// Subscribes to the `PrayerEvent` stream.
    pub fn subscribe_prayer_events(&self) -> broadcast::Receiver<PrayerEvent> {
        self.prayer_event_sender.subscribe()
    }

    /// Subscribes to the `PreferenceEvent` stream.
    pub fn subscribe_preference_events(&self) -> broadcast::Receiver<PreferenceEvent> {
        self.preference_event_sender.subscribe()
    }

    /// Subscribes to the `AlertEvent` stream.
    pub fn subscribe_alert_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_event_sender.subscribe()
    }
}
