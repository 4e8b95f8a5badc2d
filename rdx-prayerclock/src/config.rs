//! Defines all configuration structures for the prayerclock engine.
//!
//! These structs are deserialized with `serde`, typically through
//! [`EngineConfig::load`], which layers an optional TOML file under
//! `PRAYERCLOCK__*` environment variables. Every field has a default, so an
//! empty configuration is a valid one.

use crate::error::ConfigError;
use crate::location::City;
use crate::time::LocalZone;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The top-level configuration for the `PrayerClockEngine`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How often the countdown is recomputed.
    #[serde(default)]
    pub resolution: ClockResolution,

    /// How the countdown label renders the remaining time.
    #[serde(default)]
    pub label_format: LabelFormat,

    /// The zone that defines "today". Uses the IANA names (e.g.,
    /// "Africa/Cairo"). When absent, the operating system zone is used.
    #[serde(default)]
    pub timezone: Option<Tz>,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    /// The city used when the device location cannot be determined.
    #[serde(default)]
    pub default_city: City,

    /// Re-fetch the schedule when the local date changes.
    #[serde(default = "default_true")]
    pub auto_refresh_on_date_change: bool,
}

/// Defines how often the countdown is recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// Once per second. Needed for a live HH:MM:SS display.
    #[default]
    Second,
    /// Every fifteen seconds. Plenty for a minute-level summary.
    Minute,
    /// A user-defined period.
    Custom { millis: u64 },
}

impl ClockResolution {
    pub fn period(&self) -> Duration {
        match self {
            ClockResolution::Second => Duration::from_secs(1),
            ClockResolution::Minute => Duration::from_secs(15),
            ClockResolution::Custom { millis } => Duration::from_millis((*millis).max(1)),
        }
    }
}

/// How the countdown label renders the remaining time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    /// Minute-level summary, e.g. `Isha 1h 10m`.
    #[default]
    Compact,
    /// Live clock, e.g. `Isha 01:10:00`.
    Clock,
}

/// Timing provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Alert scheduling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Prefix shared by every alert id the engine owns.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Prefix for the single ad-hoc test alert.
    #[serde(default = "default_test_namespace")]
    pub test_namespace: String,
}

impl EngineConfig {
    /// Loads the configuration from an optional TOML file and the environment.
    ///
    /// Environment variables use the `PRAYERCLOCK` prefix and `__` as the
    /// nesting separator, e.g. `PRAYERCLOCK__PROVIDER__BASE_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("PRAYERCLOCK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn local_zone(&self) -> LocalZone {
        self.timezone.map(LocalZone::Named).unwrap_or_default()
    }
}

// --- Default value functions for serde ---

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.aladhan.com".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_namespace() -> String {
    "prayer".to_string()
}

fn default_test_namespace() -> String {
    "test_prayer".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolution: ClockResolution::default(),
            label_format: LabelFormat::default(),
            timezone: None,
            provider: ProviderConfig::default(),
            alerts: AlertConfig::default(),
            default_city: City::default(),
            auto_refresh_on_date_change: default_true(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            test_namespace: default_test_namespace(),
        }
    }
}
