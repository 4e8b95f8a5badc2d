//! Resolves which prayer comes next.
//!
//! Everything here is a pure function of a snapshot, an instant and a zone.
//! The live countdown and the alert scheduler both build on it, so a prayer's
//! target instant is always derived the same way.

use crate::schedule::{PrayerKey, ScheduleSnapshot, WallTime};
use crate::time::LocalZone;
use chrono::{DateTime, Days, Utc};
use tracing::trace;

/// A prayer pinned to an absolute instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrayerInstant {
    pub key: PrayerKey,
    pub at: DateTime<Utc>,
}

impl PrayerInstant {
    /// Time left until this instant, zero once it has passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        crate::time::to_std(self.at - now)
    }
}

/// Pins a wall time to the first occurrence strictly after `now`.
///
/// Today's occurrence is tried first, then tomorrow's. Returns `None` only when
/// neither day has such a local time (a DST gap on both, which does not happen
/// in practice).
pub fn instant_for(wall: WallTime, now: DateTime<Utc>, zone: LocalZone) -> Option<DateTime<Utc>> {
    let today = zone.date_of(now);
    let time = wall.to_naive();
    if let Some(at) = zone.instant_at(today, time) {
        if at > now {
            return Some(at);
        }
    }
    let tomorrow = today.checked_add_days(Days::new(1))?;
    zone.instant_at(tomorrow, time)
}

/// Every parsable prayer in the snapshot, pinned and sorted ascending.
///
/// Exact ties keep `PrayerKey` order. Malformed entries are skipped.
pub fn upcoming_instants(
    schedule: &ScheduleSnapshot,
    now: DateTime<Utc>,
    zone: LocalZone,
) -> Vec<PrayerInstant> {
    let mut instants: Vec<PrayerInstant> = schedule
        .entries()
        .filter_map(|(key, parsed)| match parsed {
            Ok(wall) => instant_for(wall, now, zone).map(|at| PrayerInstant { key, at }),
            Err(e) => {
                trace!("Skipping {}: {}", key, e);
                None
            }
        })
        .collect();
    // `entries` yields keys in day order and the sort is stable.
    instants.sort_by_key(|instant| instant.at);
    instants
}

/// The next prayer after `now`, or `None` when nothing in the snapshot parses.
pub fn next_prayer(
    schedule: &ScheduleSnapshot,
    now: DateTime<Utc>,
    zone: LocalZone,
) -> Option<PrayerInstant> {
    upcoming_instants(schedule, now, zone).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::tests::snapshot;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;
    use proptest::prelude::*;

    const UTC: LocalZone = LocalZone::Named(Tz::UTC);

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn reference_schedule() -> ScheduleSnapshot {
        snapshot(&[
            ("Fajr", "04:50"),
            ("Dhuhr", "12:10"),
            ("Asr", "15:30"),
            ("Maghrib", "18:05"),
            ("Isha", "19:20"),
        ])
    }

    #[test]
    fn evening_resolves_to_isha() {
        let now = at(10, 18, 10);
        let next = next_prayer(&reference_schedule(), now, UTC).unwrap();
        assert_eq!(next.key, PrayerKey::Isha);
        assert_eq!(next.at, at(10, 19, 20));
        assert_eq!(next.at - now, Duration::minutes(70));
    }

    #[test]
    fn late_night_rolls_over_to_tomorrows_fajr() {
        let now = at(10, 23, 50);
        let next = next_prayer(&reference_schedule(), now, UTC).unwrap();
        assert_eq!(next.key, PrayerKey::Fajr);
        assert_eq!(next.at, at(11, 4, 50));
        assert_eq!(next.at - now, Duration::hours(5));
    }

    #[test]
    fn a_prayer_exactly_now_is_not_upcoming() {
        let now = at(10, 12, 10);
        let next = next_prayer(&reference_schedule(), now, UTC).unwrap();
        assert_eq!(next.key, PrayerKey::Asr);
    }

    #[test]
    fn all_entries_equal_to_now_resolve_to_tomorrow() {
        let schedule = snapshot(&[("Dhuhr", "12:10"), ("Asr", "12:10")]);
        let now = at(10, 12, 10);
        let next = next_prayer(&schedule, now, UTC).unwrap();
        assert_eq!(next.key, PrayerKey::Dhuhr);
        assert_eq!(next.at, at(11, 12, 10));
    }

    #[test]
    fn ties_break_by_prayer_order() {
        let schedule = snapshot(&[("Isha", "19:20"), ("Maghrib", "19:20")]);
        let instants = upcoming_instants(&schedule, at(10, 8, 0), UTC);
        let keys: Vec<_> = instants.iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![PrayerKey::Maghrib, PrayerKey::Isha]);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let schedule = snapshot(&[("Fajr", "04:50"), ("Isha", "7:20 PM")]);
        let next = next_prayer(&schedule, at(10, 18, 0), UTC).unwrap();
        assert_eq!(next.key, PrayerKey::Fajr);
        assert_eq!(next.at, at(11, 4, 50));
    }

    #[test]
    fn nothing_parsable_resolves_to_none() {
        let schedule = snapshot(&[("Fajr", "soon")]);
        assert_eq!(next_prayer(&schedule, at(10, 18, 0), UTC), None);
    }

    #[test]
    fn local_zone_defines_today() {
        // 22:00 UTC is 01:00 on the 11th in Riyadh, so today's Fajr there is
        // still ahead.
        let riyadh = LocalZone::Named(chrono_tz::Asia::Riyadh);
        let next = next_prayer(&reference_schedule(), at(10, 22, 0), riyadh).unwrap();
        assert_eq!(next.key, PrayerKey::Fajr);
        assert_eq!(next.at, at(11, 1, 50));
    }

    #[test]
    fn upcoming_instants_cover_every_valid_entry_in_time_order() {
        let instants = upcoming_instants(&reference_schedule(), at(10, 13, 0), UTC);
        let keys: Vec<_> = instants.iter().map(|i| i.key).collect();
        assert_eq!(
            keys,
            vec![
                PrayerKey::Asr,
                PrayerKey::Maghrib,
                PrayerKey::Isha,
                PrayerKey::Fajr,
                PrayerKey::Dhuhr,
            ]
        );
        assert!(instants.windows(2).all(|w| w[0].at <= w[1].at));
    }

    proptest! {
        #[test]
        fn next_prayer_is_strictly_after_now(
            times in proptest::collection::vec((0u32..24, 0u32..60), 1..6),
            offset_secs in 0i64..(3 * 86_400),
        ) {
            let names = ["Fajr", "Sunrise", "Dhuhr", "Asr", "Maghrib", "Isha"];
            let owned: Vec<(String, String)> = times
                .iter()
                .enumerate()
                .map(|(i, (h, m))| (names[i].to_string(), format!("{:02}:{:02}", h, m)))
                .collect();
            let pairs: Vec<(&str, &str)> = owned
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let schedule = snapshot(&pairs);
            let now = at(1, 0, 0) + Duration::seconds(offset_secs);

            let next = next_prayer(&schedule, now, UTC).unwrap();
            prop_assert!(next.at > now);
            prop_assert!(next.at - now <= Duration::days(1));
        }
    }
}
