//! Defines all public event types broadcast by the prayerclock engine.
//!
//! Listeners subscribe to these strongly-typed streams through the
//! `subscribe_*` methods on `PrayerClockEngine`.

use crate::common::{CalculationMethod, ListenerId};
use crate::countdown::CountdownState;
use crate::i18n::Language;
use crate::location::LocationSelection;
use crate::prefs::NotificationPreference;
use crate::scheduler::RescheduleReport;
use crate::schedule::{PrayerKey, ScheduleSnapshot};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::time::Instant;

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's `run` loop begins.
    EngineStarted { timestamp: Instant },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    /// Fired when a new listener is successfully added to the engine.
    ListenerAdded { id: ListenerId },
    /// Fired when a listener is removed from the engine.
    ListenerRemoved { id: ListenerId },
}

/// Progress of schedule refreshes.
#[derive(Debug, Clone)]
pub enum ScheduleEvent {
    RefreshStarted,
    /// A new snapshot replaced the previous one.
    Replaced { snapshot: Arc<ScheduleSnapshot> },
    /// The refresh failed; the previous snapshot, if any, is still in use.
    RefreshFailed { message: String },
}

/// A recomputed countdown.
#[derive(Debug, Clone)]
pub struct CountdownEvent {
    pub state: CountdownState,
    pub at: DateTime<Utc>,
}

/// Calendar and prayer-time milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrayerEvent {
    /// The tracked upcoming prayer's instant has passed.
    PrayerReached { key: PrayerKey, at: DateTime<Utc> },
    /// The local calendar date changed.
    DateChanged { new_date: NaiveDate },
}

/// A preference was changed through the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceEvent {
    NotificationChanged {
        key: PrayerKey,
        preference: NotificationPreference,
    },
    LanguageChanged(Language),
    LocationChanged(LocationSelection),
    MethodChanged(CalculationMethod),
    TimeFormatChanged { use_24h: bool },
}

/// Changes to the pending alert set.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    Rescheduled(RescheduleReport),
    TestAlertAdded { id: String },
    TestAlertRemoved { ids: Vec<String> },
}
