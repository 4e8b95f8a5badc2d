//! Defines watchers that turn the tick stream into higher-level events.

use crate::events::PrayerEvent;
use crate::resolver::PrayerInstant;
use crate::time::LocalZone;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;

/// Watches for the local calendar date to roll over.
#[doc(hidden)]
pub(crate) struct DateWatcher {
    zone: LocalZone,
    last_known_date: NaiveDate,
}

impl DateWatcher {
    pub(crate) fn new(zone: LocalZone, now: DateTime<Utc>) -> Self {
        Self {
            zone,
            last_known_date: zone.date_of(now),
        }
    }

    /// Fires `PrayerEvent::DateChanged` if the date moved since the last call.
    /// Returns the new date when it did.
    pub(crate) fn process_tick(
        &mut self,
        now: DateTime<Utc>,
        prayer_event_sender: &broadcast::Sender<PrayerEvent>,
    ) -> Option<NaiveDate> {
        let current_date = self.zone.date_of(now);
        if current_date == self.last_known_date {
            return None;
        }
        self.last_known_date = current_date;
        prayer_event_sender
            .send(PrayerEvent::DateChanged {
                new_date: current_date,
            })
            .ok();
        Some(current_date)
    }
}

/// Watches the countdown's upcoming prayer and reports when its time passes.
#[doc(hidden)]
#[derive(Default)]
pub(crate) struct PrayerWatcher {
    tracked: Option<PrayerInstant>,
}

impl PrayerWatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fires `PrayerEvent::PrayerReached` when the tracked instant is at or
    /// before `now`, then starts tracking `upcoming`.
    ///
    /// A tracked prayer that is replaced before its time (a new schedule,
    /// say) is dropped silently.
    pub(crate) fn process_tick(
        &mut self,
        now: DateTime<Utc>,
        upcoming: Option<PrayerInstant>,
        prayer_event_sender: &broadcast::Sender<PrayerEvent>,
    ) -> Option<PrayerInstant> {
        let reached = self.tracked.filter(|tracked| tracked.at <= now);
        if let Some(instant) = reached {
            prayer_event_sender
                .send(PrayerEvent::PrayerReached {
                    key: instant.key,
                    at: instant.at,
                })
                .ok();
        }
        self.tracked = upcoming;
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::PrayerKey;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn date_watcher_fires_once_per_new_date() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut watcher = DateWatcher::new(LocalZone::Named(Tz::UTC), noon());

        assert_eq!(watcher.process_tick(noon() + Duration::hours(11), &tx), None);
        let next_day = watcher.process_tick(noon() + Duration::hours(12), &tx);
        assert_eq!(next_day, NaiveDate::from_ymd_opt(2026, 3, 11));
        assert_eq!(watcher.process_tick(noon() + Duration::hours(13), &tx), None);

        assert_eq!(
            rx.try_recv().unwrap(),
            PrayerEvent::DateChanged {
                new_date: NaiveDate::from_ymd_opt(2026, 3, 11).unwrap()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn prayer_watcher_reports_passed_instant() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut watcher = PrayerWatcher::new();
        let asr = PrayerInstant {
            key: PrayerKey::Asr,
            at: noon() + Duration::hours(3),
        };
        let maghrib = PrayerInstant {
            key: PrayerKey::Maghrib,
            at: noon() + Duration::hours(6),
        };

        assert_eq!(watcher.process_tick(noon(), Some(asr), &tx), None);
        assert_eq!(watcher.process_tick(noon() + Duration::hours(1), Some(asr), &tx), None);
        assert_eq!(
            watcher.process_tick(noon() + Duration::hours(3), Some(maghrib), &tx),
            Some(asr)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PrayerEvent::PrayerReached {
                key: PrayerKey::Asr,
                at: asr.at
            }
        );
    }

    #[test]
    fn replaced_prayer_is_not_reported() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut watcher = PrayerWatcher::new();
        let asr = PrayerInstant {
            key: PrayerKey::Asr,
            at: noon() + Duration::hours(3),
        };
        let dhuhr = PrayerInstant {
            key: PrayerKey::Dhuhr,
            at: noon() + Duration::minutes(10),
        };

        watcher.process_tick(noon(), Some(asr), &tx);
        watcher.process_tick(noon(), Some(dhuhr), &tx);
        watcher.process_tick(noon() + Duration::minutes(1), None, &tx);

        assert!(rx.try_recv().is_err());
    }
}
