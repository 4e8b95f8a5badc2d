//! Keeps the alert sink's pending set in line with the current schedule and
//! preferences.

use crate::alerts::{AlertRequest, AlertSink, ScheduledAlertId};
use crate::common::SoundId;
use crate::config::AlertConfig;
use crate::error::AlertError;
use crate::i18n::{self, Language, Text};
use crate::prefs::Preferences;
use crate::resolver::instant_for;
use crate::schedule::{PrayerKey, ScheduleSnapshot};
use crate::time::LocalZone;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What one reschedule pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescheduleReport {
    /// Ids removed from the sink before resubmitting.
    pub cancelled: Vec<String>,
    pub submitted: Vec<ScheduledAlertId>,
    /// Keys left out because they were disabled, malformed or unpinnable.
    pub skipped: Vec<PrayerKey>,
    pub failed: Vec<AlertError>,
}

impl RescheduleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The single ad-hoc alert a user can schedule to check delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAlert {
    pub name: String,
    pub at: DateTime<Utc>,
    pub language: Language,
}

/// Cancels and recreates prayer alerts.
///
/// Every pass wipes the namespace first, so running it twice with the same
/// inputs leaves the same pending ids. Passes never interleave.
pub struct NotificationScheduler {
    sink: Arc<dyn AlertSink>,
    config: AlertConfig,
    test_alert: Mutex<Option<TestAlert>>,
}

impl NotificationScheduler {
    pub fn new(sink: Arc<dyn AlertSink>, config: AlertConfig) -> Self {
        Self {
            sink,
            config,
            test_alert: Mutex::new(None),
        }
    }

    fn prayer_prefix(&self) -> String {
        format!("{}_", self.config.namespace)
    }

    fn test_prefix(&self) -> String {
        format!("{}_", self.config.test_namespace)
    }

    /// Replaces every prayer alert with a fresh set derived from `schedule`.
    pub async fn reschedule(
        &self,
        schedule: &ScheduleSnapshot,
        prefs: &Preferences,
        now: DateTime<Utc>,
        zone: LocalZone,
    ) -> RescheduleReport {
        // Held for the whole pass; this is what serializes reschedules.
        let test_alert = self.test_alert.lock().await;
        let mut report = RescheduleReport::default();

        match self.sink.cancel_by_prefix(&self.prayer_prefix()).await {
            Ok(cancelled) => report.cancelled = cancelled,
            Err(e) => {
                warn!("Could not clear pending prayer alerts: {}", e);
                report.failed.push(e);
            }
        }

        let title = i18n::tr(Text::AlertTitle, prefs.language);
        for (key, parsed) in schedule.entries() {
            let pref = prefs.notification(key);
            if !pref.enabled {
                debug!("{} alerts are disabled.", key);
                report.skipped.push(key);
                continue;
            }
            let wall = match parsed {
                Ok(wall) => wall,
                Err(e) => {
                    warn!("Not scheduling {}: {}", key, e);
                    report.skipped.push(key);
                    continue;
                }
            };
            let Some(at) = instant_for(wall, now, zone) else {
                warn!("{} at {} does not exist in {}.", key, wall, zone.name());
                report.skipped.push(key);
                continue;
            };

            let id = ScheduledAlertId::new(self.config.namespace.clone(), key, at);
            let body = i18n::fill(
                i18n::tr(Text::AlertBody, prefs.language),
                i18n::prayer_name(key, prefs.language),
            );
            let request = AlertRequest {
                id: id.to_string(),
                fire_at: at,
                title: title.to_string(),
                body,
                sound: pref.sound.clone(),
            };
            match self.sink.submit(request).await {
                Ok(()) => report.submitted.push(id),
                Err(e) => {
                    warn!("Alert for {} was not accepted: {}", key, e);
                    report.failed.push(e);
                }
            }
        }

        if let Some(test) = test_alert.as_ref() {
            if test.at > now {
                if let Err(e) = self.submit_test(test).await {
                    warn!("Could not restore the test alert: {}", e);
                    report.failed.push(e);
                }
            }
        }

        info!(
            "Rescheduled prayer alerts: {} submitted, {} skipped, {} failed.",
            report.submitted.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Schedules the test alert, replacing any previous one.
    ///
    /// Returns the submitted id.
    pub async fn add_test_alert(
        &self,
        name: impl Into<String>,
        at: DateTime<Utc>,
        language: Language,
    ) -> Result<String, AlertError> {
        let mut slot = self.test_alert.lock().await;
        self.sink.cancel_by_prefix(&self.test_prefix()).await?;
        let test = TestAlert {
            name: name.into(),
            at,
            language,
        };
        let id = self.submit_test(&test).await?;
        info!("Test alert '{}' set for {}.", test.name, at);
        *slot = Some(test);
        Ok(id)
    }

    /// Cancels the test alert. Returns the cancelled ids.
    pub async fn remove_test_alert(&self) -> Result<Vec<String>, AlertError> {
        let mut slot = self.test_alert.lock().await;
        *slot = None;
        self.sink.cancel_by_prefix(&self.test_prefix()).await
    }

    pub async fn test_alert(&self) -> Option<TestAlert> {
        self.test_alert.lock().await.clone()
    }

    async fn submit_test(&self, test: &TestAlert) -> Result<String, AlertError> {
        let id = format!("{}{}", self.test_prefix(), test.at.timestamp());
        let body = i18n::fill(i18n::tr(Text::TestAlertBody, test.language), &test.name);
        self.sink
            .submit(AlertRequest {
                id: id.clone(),
                fire_at: test.at,
                title: i18n::tr(Text::TestAlertTitle, test.language).to_string(),
                body,
                sound: SoundId::system_default(),
            })
            .await?;
        Ok(id)
    }
}
