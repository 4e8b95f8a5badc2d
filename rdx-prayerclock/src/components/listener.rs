//! User callbacks registered on the engine.

use crate::schedule::PrayerKey;
use chrono::{DateTime, NaiveDate, Utc};

/// Callback invoked when a prayer time is reached.
pub type PrayerCallback = Box<dyn FnMut(PrayerKey, DateTime<Utc>) + Send + Sync>;

/// Callback invoked when the local date changes.
pub type DateCallback = Box<dyn FnMut(NaiveDate) + Send + Sync>;

/// Runs a callback for one prayer, or for all of them.
#[doc(hidden)]
pub(crate) struct PrayerListener {
    pub filter: Option<PrayerKey>,
    pub callback: PrayerCallback,
}

impl PrayerListener {
    pub(crate) fn new(filter: Option<PrayerKey>, callback: PrayerCallback) -> Self {
        Self { filter, callback }
    }

    /// Runs the callback if `key` passes the filter. Returns `true` if it ran.
    pub(crate) fn fire(&mut self, key: PrayerKey, at: DateTime<Utc>) -> bool {
        if self.filter.map_or(true, |wanted| wanted == key) {
            (self.callback)(key, at);
            true
        } else {
            false
        }
    }
}

#[doc(hidden)]
pub(crate) struct DateListener {
    pub callback: DateCallback,
}

impl DateListener {
    pub(crate) fn new(callback: DateCallback) -> Self {
        Self { callback }
    }

    pub(crate) fn fire(&mut self, date: NaiveDate) {
        (self.callback)(date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn filtered_listener_ignores_other_prayers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut listener = PrayerListener::new(
            Some(PrayerKey::Maghrib),
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 18, 5, 0).unwrap();

        assert!(!listener.fire(PrayerKey::Asr, at));
        assert!(listener.fire(PrayerKey::Maghrib, at));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
