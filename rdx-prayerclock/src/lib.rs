//! # Prayerclock
//!
//! An event-driven prayer time engine for Rust.
//!
//! Prayerclock fetches the day's prayer times for a location, keeps track of
//! which prayer comes next, drives a live countdown, and keeps exactly one
//! pending alert per upcoming prayer while the user changes their settings.
//!
//! ## Core Concepts
//!
//! - **ScheduleSnapshot**: One day of `HH:MM` prayer times from the timing
//!   provider. Replaced wholesale on every successful refresh, never mutated.
//! - **Next-prayer resolution**: A pure function of the snapshot, "now" and
//!   the local zone. A prayer that is not strictly in the future today rolls
//!   over to tomorrow.
//! - **Idempotent alerts**: Every reschedule cancels the engine's alert
//!   namespace and resubmits. Alert ids encode the prayer and its instant, so
//!   the same inputs always leave the same pending set.
//! - **Event-Driven**: A `SystemClock` ticks the dispatcher; your application
//!   subscribes to strongly-typed streams (`PrayerEvent`, `CountdownEvent`,
//!   `AlertEvent`, ...) or registers callbacks.
//! - **Pluggable world**: The timing provider, location sensor, alert sink,
//!   preference store and clock are traits, so the engine runs the same
//!   against the network or against fakes.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use prayerclock::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration (defaults, a TOML file, PRAYERCLOCK__* env vars).
//!     let config = EngineConfig::load(None)?;
//!
//!     // 2. Wire up the outside world.
//!     let collaborators = Collaborators {
//!         provider: Arc::new(AladhanClient::new(&config.provider)?),
//!         sensor: Arc::new(NoSensor),
//!         alerts: Arc::new(MemoryAlertSink::new()),
//!         store: Arc::new(MemoryPreferenceStore::new()),
//!         clock: Arc::new(SystemTimeSource),
//!     };
//!
//!     // 3. Create the engine and subscribe before starting it.
//!     let engine = PrayerClockEngine::new(config, collaborators);
//!     let mut prayers = engine.subscribe_prayer_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = prayers.recv().await {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     // 4. Fetch today's schedule, then run until Ctrl+C.
//!     engine.refresh().await.ok();
//!     engine.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Prayer Clock";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod alerts;
pub mod common;
pub mod components;
pub mod config;
pub mod coordinator;
pub mod countdown;
pub mod engine;
pub mod error;
pub mod events;
pub mod i18n;
pub mod location;
pub mod prefs;
pub mod provider;
pub mod resolver;
pub mod schedule;
pub mod scheduler;
pub mod time;

/// A prelude module for easy importing of the most common Prayerclock types.
pub mod prelude {
    pub use crate::alerts::{AlertRequest, AlertSink, MemoryAlertSink, ScheduledAlertId};
    pub use crate::common::{CalculationMethod, Coordinate, ListenerId, SoundId};
    pub use crate::config::{ClockResolution, EngineConfig, LabelFormat};
    pub use crate::coordinator::RefreshStatus;
    pub use crate::countdown::CountdownState;
    pub use crate::engine::{Collaborators, PrayerClockEngine};
    pub use crate::error::{AlertError, LocationError, ProviderError, RefreshError, ScheduleError};
    pub use crate::events::{
        AlertEvent, CountdownEvent, PrayerEvent, PreferenceEvent, ScheduleEvent, SystemEvent,
    };
    pub use crate::i18n::Language;
    pub use crate::location::{City, LocationSelection, LocationSensor, NoSensor};
    pub use crate::prefs::{MemoryPreferenceStore, NotificationPreference, PreferenceStore, Preferences};
    pub use crate::provider::{AladhanClient, TimingProvider, TimingResponse};
    pub use crate::schedule::{PrayerKey, ScheduleSnapshot};
    pub use crate::scheduler::RescheduleReport;
    pub use crate::time::{Clock, LocalZone, ManualClock, SystemTimeSource};
}
