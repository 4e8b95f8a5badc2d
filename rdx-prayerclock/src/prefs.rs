//! User preferences and the key/value store they persist to.
//!
//! The engine never reads settings ad hoc. It holds one [`Preferences`] value,
//! passes it explicitly to the scheduler and the countdown, and announces
//! changes as `PreferenceEvent`s.

use crate::common::{CalculationMethod, SoundId};
use crate::i18n::Language;
use crate::location::{City, LocationSelection};
use crate::schedule::PrayerKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Store keys, one per field.
pub mod keys {
    pub const SELECTED_CITY: &str = "selectedCity";
    pub const CALCULATION_METHOD: &str = "calculationMethod";
    pub const LANGUAGE: &str = "appLanguage";
    pub const TIME_FORMAT_24: &str = "timeFormat24";

    pub fn notify_enabled(key: crate::schedule::PrayerKey) -> String {
        format!("notify.{}.enabled", key)
    }

    pub fn notify_sound(key: crate::schedule::PrayerKey) -> String {
        format!("notify.{}.sound", key)
    }
}

/// Value the selected-city key holds when the device location is wanted.
pub const DEVICE_LOCATION: &str = "device";

/// Durable string key/value storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// A store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }
}

/// Whether and how a prayer should raise an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPreference {
    pub enabled: bool,
    pub sound: SoundId,
}

impl NotificationPreference {
    /// Obligatory prayers alert by default; Sunrise does not.
    pub fn default_for(key: PrayerKey) -> Self {
        Self {
            enabled: key.is_obligatory(),
            sound: SoundId::system_default(),
        }
    }
}

/// Every user setting the engine consults.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub location: LocationSelection,
    pub method: CalculationMethod,
    pub language: Language,
    pub time_format_24h: bool,
    notifications: BTreeMap<PrayerKey, NotificationPreference>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            location: LocationSelection::default(),
            method: CalculationMethod::default(),
            language: Language::default(),
            time_format_24h: true,
            notifications: PrayerKey::ALL
                .iter()
                .map(|key| (*key, NotificationPreference::default_for(*key)))
                .collect(),
        }
    }
}

impl Preferences {
    /// The notification preference for `key`, falling back to its default.
    pub fn notification(&self, key: PrayerKey) -> NotificationPreference {
        self.notifications
            .get(&key)
            .cloned()
            .unwrap_or_else(|| NotificationPreference::default_for(key))
    }

    pub fn set_notification(&mut self, key: PrayerKey, pref: NotificationPreference) {
        self.notifications.insert(key, pref);
    }

    /// Reads every field from `store`. Missing or unreadable values keep
    /// their defaults.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let mut prefs = Self::default();

        if let Some(raw) = store.get(keys::SELECTED_CITY) {
            prefs.location = match raw.parse::<City>() {
                Ok(city) => LocationSelection::Catalog(city),
                // Anything outside the catalog asks for the device location.
                Err(_) => LocationSelection::Device,
            };
        }
        if let Some(raw) = store.get(keys::CALCULATION_METHOD) {
            match raw.trim().parse::<u8>() {
                Ok(value) => prefs.method = CalculationMethod::from_stored(value),
                Err(_) => warn!("Ignoring stored calculation method '{}'.", raw),
            }
        }
        if let Some(raw) = store.get(keys::LANGUAGE) {
            match raw.parse::<Language>() {
                Ok(language) => prefs.language = language,
                Err(e) => warn!("Ignoring stored language: {}", e),
            }
        }
        if let Some(raw) = store.get(keys::TIME_FORMAT_24) {
            prefs.time_format_24h = parse_bool(&raw).unwrap_or(true);
        }
        for key in PrayerKey::ALL {
            let mut pref = NotificationPreference::default_for(key);
            if let Some(enabled) = store.get(&keys::notify_enabled(key)).and_then(|v| parse_bool(&v)) {
                pref.enabled = enabled;
            }
            if let Some(sound) = store.get(&keys::notify_sound(key)).filter(|s| !s.trim().is_empty()) {
                pref.sound = SoundId(sound);
            }
            prefs.notifications.insert(key, pref);
        }
        prefs
    }

    /// Writes every field to `store`.
    pub fn save(&self, store: &dyn PreferenceStore) {
        self.save_location(store);
        store.set(keys::CALCULATION_METHOD, &self.method.to_string());
        store.set(keys::LANGUAGE, self.language.code());
        store.set(keys::TIME_FORMAT_24, bool_str(self.time_format_24h));
        for key in PrayerKey::ALL {
            self.save_notification(store, key);
        }
    }

    pub(crate) fn save_location(&self, store: &dyn PreferenceStore) {
        let raw = match self.location {
            LocationSelection::Catalog(city) => city.raw_value(),
            LocationSelection::Device => DEVICE_LOCATION,
        };
        store.set(keys::SELECTED_CITY, raw);
    }

    pub(crate) fn save_notification(&self, store: &dyn PreferenceStore, key: PrayerKey) {
        let pref = self.notification(key);
        store.set(&keys::notify_enabled(key), bool_str(pref.enabled));
        store.set(&keys::notify_sound(key), pref.sound.as_str());
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_alert_for_obligatory_prayers_only() {
        let prefs = Preferences::default();
        assert_eq!(prefs.location, LocationSelection::Catalog(City::Cairo));
        assert_eq!(prefs.method, CalculationMethod(5));
        assert_eq!(prefs.language, Language::Ar);
        assert!(!prefs.notification(PrayerKey::Sunrise).enabled);
        for key in [
            PrayerKey::Fajr,
            PrayerKey::Dhuhr,
            PrayerKey::Asr,
            PrayerKey::Maghrib,
            PrayerKey::Isha,
        ] {
            assert!(prefs.notification(key).enabled);
        }
    }

    #[test]
    fn saved_preferences_load_back() {
        let store = MemoryPreferenceStore::new();
        let mut prefs = Preferences::default();
        prefs.location = LocationSelection::Catalog(City::NewYork);
        prefs.method = CalculationMethod(2);
        prefs.language = Language::En;
        prefs.time_format_24h = false;
        prefs.set_notification(
            PrayerKey::Asr,
            NotificationPreference {
                enabled: false,
                sound: SoundId("adhan-makkah".to_string()),
            },
        );
        prefs.save(&store);

        assert_eq!(store.get("selectedCity").as_deref(), Some("New York"));
        assert_eq!(store.get("notify.Asr.enabled").as_deref(), Some("false"));
        assert_eq!(Preferences::load(&store), prefs);
    }

    #[test]
    fn unknown_city_selects_device_location() {
        let store = MemoryPreferenceStore::new();
        store.set(keys::SELECTED_CITY, "Atlantis");
        assert_eq!(Preferences::load(&store).location, LocationSelection::Device);

        store.set(keys::SELECTED_CITY, DEVICE_LOCATION);
        assert_eq!(Preferences::load(&store).location, LocationSelection::Device);
    }

    #[test]
    fn zero_or_garbage_method_keeps_default() {
        let store = MemoryPreferenceStore::new();
        store.set(keys::CALCULATION_METHOD, "0");
        assert_eq!(Preferences::load(&store).method, CalculationMethod::DEFAULT);
        store.set(keys::CALCULATION_METHOD, "five");
        assert_eq!(Preferences::load(&store).method, CalculationMethod::DEFAULT);
        store.set(keys::CALCULATION_METHOD, "4");
        assert_eq!(Preferences::load(&store).method, CalculationMethod(4));
    }
}
