//! Alert requests, their identifiers, and the sink that accepts them.

use crate::common::SoundId;
use crate::error::AlertError;
use crate::schedule::PrayerKey;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Identifies one scheduled prayer alert: `{namespace}_{Key}_{epoch_seconds}`.
///
/// The same prayer on different days never collides, and deriving the same
/// instant twice yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduledAlertId {
    namespace: String,
    key: PrayerKey,
    epoch: i64,
}

impl ScheduledAlertId {
    pub fn new(namespace: impl Into<String>, key: PrayerKey, at: DateTime<Utc>) -> Self {
        Self {
            namespace: namespace.into(),
            key,
            epoch: at.timestamp(),
        }
    }

    /// Splits an id string back into its parts.
    ///
    /// The namespace may itself contain underscores; the key and epoch are
    /// taken from the right.
    pub fn parse(id: &str) -> Option<Self> {
        let (rest, epoch) = id.rsplit_once('_')?;
        let (namespace, key) = rest.rsplit_once('_')?;
        if namespace.is_empty() {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            key: key.parse().ok()?,
            epoch: epoch.parse().ok()?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> PrayerKey {
        self.key
    }

    pub fn fire_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.epoch, 0).single()
    }
}

impl fmt::Display for ScheduledAlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.namespace, self.key, self.epoch)
    }
}

/// A one-shot alert for the sink to deliver at `fire_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub id: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub sound: SoundId,
}

/// The operating system's scheduled-alert facility.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn submit(&self, request: AlertRequest) -> Result<(), AlertError>;

    async fn list_pending(&self) -> Result<Vec<String>, AlertError>;

    async fn cancel(&self, ids: &[String]) -> Result<(), AlertError>;

    /// Cancels every pending alert whose id starts with `prefix`.
    ///
    /// Returns the cancelled ids.
    async fn cancel_by_prefix(&self, prefix: &str) -> Result<Vec<String>, AlertError> {
        let matching: Vec<String> = self
            .list_pending()
            .await?
            .into_iter()
            .filter(|id| id.starts_with(prefix))
            .collect();
        if !matching.is_empty() {
            self.cancel(&matching).await?;
        }
        Ok(matching)
    }
}

/// An in-process alert sink.
///
/// Holds pending requests in memory and hands out the ones that are due via
/// [`MemoryAlertSink::take_due`]. The shell and the dev binary use it in place
/// of an operating system notification centre.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertSink {
    pending: Arc<RwLock<BTreeMap<String, AlertRequest>>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every pending request, ordered by id.
    pub fn requests(&self) -> Vec<AlertRequest> {
        self.pending
            .read()
            .map(|pending| pending.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes and returns the requests whose fire time is at or before `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<AlertRequest> {
        let Ok(mut pending) = self.pending.write() else {
            return Vec::new();
        };
        let due: Vec<String> = pending
            .iter()
            .filter(|(_, request)| request.fire_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        let mut fired: Vec<AlertRequest> = due
            .iter()
            .filter_map(|id| pending.remove(id))
            .collect();
        fired.sort_by_key(|request| request.fire_at);
        fired
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn submit(&self, request: AlertRequest) -> Result<(), AlertError> {
        let mut pending = self.pending.write().map_err(|e| AlertError::SubmissionFailed {
            id: request.id.clone(),
            message: e.to_string(),
        })?;
        info!("Alert '{}' pending for {}.", request.id, request.fire_at);
        pending.insert(request.id.clone(), request);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<String>, AlertError> {
        self.pending
            .read()
            .map(|pending| pending.keys().cloned().collect())
            .map_err(|e| AlertError::ListFailed(e.to_string()))
    }

    async fn cancel(&self, ids: &[String]) -> Result<(), AlertError> {
        let mut pending = self
            .pending
            .write()
            .map_err(|e| AlertError::CancelFailed(e.to_string()))?;
        for id in ids {
            if pending.remove(id).is_some() {
                debug!("Alert '{}' cancelled.", id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, at: DateTime<Utc>) -> AlertRequest {
        AlertRequest {
            id: id.to_string(),
            fire_at: at,
            title: "Prayer Time".to_string(),
            body: "It's time".to_string(),
            sound: SoundId::system_default(),
        }
    }

    #[test]
    fn alert_ids_encode_key_and_epoch() {
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 19, 20, 0).unwrap();
        let id = ScheduledAlertId::new("prayer", PrayerKey::Isha, at);
        assert_eq!(id.to_string(), format!("prayer_Isha_{}", at.timestamp()));
        assert_eq!(ScheduledAlertId::parse(&id.to_string()), Some(id.clone()));
        assert_eq!(id.fire_at(), Some(at));

        let tomorrow = ScheduledAlertId::new("prayer", PrayerKey::Isha, at + chrono::Duration::days(1));
        assert_ne!(id, tomorrow);
    }

    #[test]
    fn namespaces_with_underscores_parse() {
        let parsed = ScheduledAlertId::parse("test_prayer_Asr_1773170000").unwrap();
        assert_eq!(parsed.namespace(), "test_prayer");
        assert_eq!(parsed.key(), PrayerKey::Asr);
        assert_eq!(ScheduledAlertId::parse("prayer_Tahajjud_1"), None);
        assert_eq!(ScheduledAlertId::parse("_Asr_1"), None);
        assert_eq!(ScheduledAlertId::parse("Asr"), None);
    }

    #[tokio::test]
    async fn cancel_by_prefix_leaves_other_namespaces() {
        let sink = MemoryAlertSink::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        sink.submit(request("prayer_Dhuhr_1", at)).await.unwrap();
        sink.submit(request("prayer_Asr_2", at)).await.unwrap();
        sink.submit(request("test_prayer_3", at)).await.unwrap();
        sink.submit(request("calendar_4", at)).await.unwrap();

        let cancelled = sink.cancel_by_prefix("prayer_").await.unwrap();

        assert_eq!(cancelled, vec!["prayer_Asr_2", "prayer_Dhuhr_1"]);
        assert_eq!(
            sink.list_pending().await.unwrap(),
            vec!["calendar_4", "test_prayer_3"]
        );
    }

    #[tokio::test]
    async fn take_due_removes_only_due_requests() {
        let sink = MemoryAlertSink::new();
        let noon = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        sink.submit(request("a", noon)).await.unwrap();
        sink.submit(request("b", noon + chrono::Duration::hours(1))).await.unwrap();

        assert!(sink.take_due(noon - chrono::Duration::seconds(1)).is_empty());
        let due = sink.take_due(noon);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "a");
        assert_eq!(sink.list_pending().await.unwrap(), vec!["b"]);
    }
}
