//! The per-day prayer time snapshot and the keys it is indexed by.

use crate::common::{CalculationMethod, Coordinate};
use crate::error::ScheduleError;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// One of the six named daily events.
///
/// The declaration order is significant: it is the day sequence, and it breaks
/// ties when two prayers resolve to the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrayerKey {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerKey {
    pub const ALL: [PrayerKey; 6] = [
        PrayerKey::Fajr,
        PrayerKey::Sunrise,
        PrayerKey::Dhuhr,
        PrayerKey::Asr,
        PrayerKey::Maghrib,
        PrayerKey::Isha,
    ];

    /// The name used by the timing provider and in alert ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerKey::Fajr => "Fajr",
            PrayerKey::Sunrise => "Sunrise",
            PrayerKey::Dhuhr => "Dhuhr",
            PrayerKey::Asr => "Asr",
            PrayerKey::Maghrib => "Maghrib",
            PrayerKey::Isha => "Isha",
        }
    }

    /// Sunrise marks the end of Fajr rather than a prayer of its own.
    pub fn is_obligatory(&self) -> bool {
        !matches!(self, PrayerKey::Sunrise)
    }
}

impl fmt::Display for PrayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrayerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrayerKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown prayer '{}'", s))
    }
}

/// A wall-clock time of day, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime {
    pub hour: u32,
    pub minute: u32,
}

impl WallTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Parses a strict `HH:MM` string. Surrounding whitespace is ignored.
    pub fn parse(value: &str) -> Option<Self> {
        let (hour, minute) = value.trim().split_once(':')?;
        if hour.is_empty() || minute.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return None;
        }
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::new(hour.parse().ok()?, minute.parse().ok()?)
    }

    pub fn to_naive(self) -> NaiveTime {
        // `new` and `parse` guarantee the range.
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The full set of prayer times for the fetch date, as returned by the provider.
///
/// A snapshot is built once from a successful response and then shared
/// read-only. It is replaced wholesale on the next successful fetch. Times are
/// kept as the provider sent them and parsed per entry, so one bad entry never
/// spoils the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSnapshot {
    times: BTreeMap<PrayerKey, String>,
    coordinate: Coordinate,
    method: CalculationMethod,
    timezone: String,
    fetched_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    /// Builds a snapshot from provider timings, keeping only known prayer names.
    ///
    /// Returns `ScheduleError::Empty` when no known prayer is present.
    pub fn from_timings(
        timings: &HashMap<String, String>,
        coordinate: Coordinate,
        method: CalculationMethod,
        timezone: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        let times: BTreeMap<PrayerKey, String> = timings
            .iter()
            .filter_map(|(name, value)| {
                name.parse::<PrayerKey>()
                    .ok()
                    .map(|key| (key, value.clone()))
            })
            .collect();
        if times.is_empty() {
            return Err(ScheduleError::Empty);
        }
        Ok(Self {
            times,
            coordinate,
            method,
            timezone: timezone.into(),
            fetched_at,
        })
    }

    /// Keys present in this snapshot, in day order.
    pub fn keys(&self) -> impl Iterator<Item = PrayerKey> + '_ {
        self.times.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The raw provider string for a key, if present.
    pub fn raw(&self, key: PrayerKey) -> Option<&str> {
        self.times.get(&key).map(String::as_str)
    }

    /// The parsed time for a key. `None` when the key is absent.
    pub fn wall_time(&self, key: PrayerKey) -> Option<Result<WallTime, ScheduleError>> {
        self.raw(key).map(|value| {
            WallTime::parse(value).ok_or_else(|| ScheduleError::InvalidTimeString {
                key,
                value: value.to_string(),
            })
        })
    }

    /// Every present key with its parse result, in day order.
    pub fn entries(&self) -> impl Iterator<Item = (PrayerKey, Result<WallTime, ScheduleError>)> + '_ {
        self.times.keys().filter_map(|key| {
            self.wall_time(*key).map(|parsed| (*key, parsed))
        })
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn method(&self) -> CalculationMethod {
        self.method
    }

    /// The provider's IANA timezone id for the location.
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Builds a snapshot from `(name, "HH:MM")` pairs for tests.
    pub(crate) fn snapshot(entries: &[(&str, &str)]) -> ScheduleSnapshot {
        let timings = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ScheduleSnapshot::from_timings(
            &timings,
            Coordinate::new(30.0444, 31.2357).unwrap(),
            CalculationMethod::DEFAULT,
            "Africa/Cairo",
            Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn parses_strict_wall_times() {
        assert_eq!(WallTime::parse("04:50"), WallTime::new(4, 50));
        assert_eq!(WallTime::parse(" 4:05 "), WallTime::new(4, 5));
        assert_eq!(WallTime::parse("23:59"), WallTime::new(23, 59));
        assert_eq!(WallTime::parse("24:00"), None);
        assert_eq!(WallTime::parse("12:60"), None);
        assert_eq!(WallTime::parse("12:5"), None);
        assert_eq!(WallTime::parse("12:05 (EET)"), None);
        assert_eq!(WallTime::parse("-1:05"), None);
        assert_eq!(WallTime::parse("noon"), None);
    }

    #[test]
    fn drops_unknown_provider_names() {
        let snap = snapshot(&[
            ("Fajr", "04:50"),
            ("Imsak", "04:40"),
            ("Sunset", "18:05"),
            ("Isha", "19:20"),
        ]);
        assert_eq!(
            snap.keys().collect::<Vec<_>>(),
            vec![PrayerKey::Fajr, PrayerKey::Isha]
        );
    }

    #[test]
    fn empty_timings_are_rejected() {
        let mut timings = HashMap::new();
        timings.insert("Midnight".to_string(), "00:10".to_string());
        let result = ScheduleSnapshot::from_timings(
            &timings,
            Coordinate::new(0.0, 0.0).unwrap(),
            CalculationMethod::DEFAULT,
            "UTC",
            Utc::now(),
        );
        assert_eq!(result, Err(ScheduleError::Empty));
    }

    #[test]
    fn malformed_entry_only_spoils_itself() {
        let snap = snapshot(&[("Fajr", "04:50"), ("Dhuhr", "garbage")]);
        let entries: Vec<_> = snap.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (PrayerKey::Fajr, Ok(WallTime { hour: 4, minute: 50 })));
        assert!(matches!(
            entries[1],
            (PrayerKey::Dhuhr, Err(ScheduleError::InvalidTimeString { .. }))
        ));
        assert!(snap.wall_time(PrayerKey::Asr).is_none());
    }

    #[test]
    fn prayer_keys_parse_case_insensitively() {
        assert_eq!("asr".parse::<PrayerKey>(), Ok(PrayerKey::Asr));
        assert_eq!("MAGHRIB".parse::<PrayerKey>(), Ok(PrayerKey::Maghrib));
        assert!("Midnight".parse::<PrayerKey>().is_err());
        assert!(PrayerKey::Fajr < PrayerKey::Sunrise);
        assert!(!PrayerKey::Sunrise.is_obligatory());
    }
}
