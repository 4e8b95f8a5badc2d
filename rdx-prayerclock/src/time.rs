//! Time sources for the engine.
//!
//! - [`SystemClock`] is the ticker that drives the dispatcher loop.
//! - [`Clock`] is where the engine reads "now" from. Production code uses
//!   [`SystemTimeSource`]; simulations and tests use [`ManualClock`].
//! - [`LocalZone`] decides which calendar "today" means.

use crate::config::ClockResolution;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A single beat of the `SystemClock`.
#[derive(Debug, Clone)]
pub struct TickEvent {
    pub tick_count: u64,
    pub timestamp: Instant,
}

/// The ticker that acts as the engine's heartbeat.
pub struct SystemClock {
    resolution: ClockResolution,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
}

impl SystemClock {
    pub fn new(resolution: ClockResolution, tick_sender: broadcast::Sender<Arc<TickEvent>>) -> Self {
        Self {
            resolution,
            tick_sender,
        }
    }

    /// Ticks until a shutdown signal arrives.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolution.period();
        let mut ticker = tokio::time::interval(period);
        // A suspended laptop should not replay a night's worth of ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("SystemClock started with a period of {:?}.", period);

        let mut tick_count: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                instant = ticker.tick() => {
                    tick_count += 1;
                    self.tick_sender
                        .send(Arc::new(TickEvent { tick_count, timestamp: instant }))
                        .ok();
                }
            }
        }
        debug!("SystemClock stopped after {} ticks.", tick_count);
    }
}

/// Where the engine reads the current instant from.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl Clock for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = instant;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

/// The timezone whose calendar defines "today" and "tomorrow".
///
/// Defaults to the operating system zone. Pinning a named zone lets a headless
/// host follow the zone of the configured city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalZone {
    #[default]
    System,
    Named(Tz),
}

impl LocalZone {
    /// The local calendar date of `now`.
    pub fn date_of(&self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            LocalZone::System => now.with_timezone(&Local).date_naive(),
            LocalZone::Named(tz) => now.with_timezone(tz).date_naive(),
        }
    }

    /// Pins a local date and time to an absolute instant.
    ///
    /// Returns `None` for local times skipped by a DST transition. Times that
    /// occur twice resolve to the earlier occurrence.
    pub fn instant_at(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        let local = date.and_time(time);
        match self {
            LocalZone::System => Local
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            LocalZone::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    pub fn name(&self) -> String {
        match self {
            LocalZone::System => "system".to_string(),
            LocalZone::Named(tz) => tz.name().to_string(),
        }
    }
}

/// Converts a chrono duration into a std one, clamping negatives to zero.
pub(crate) fn to_std(duration: chrono::Duration) -> Duration {
    duration.to_std().unwrap_or(Duration::ZERO)
}
