//! Fetches a fresh schedule and publishes it.

use crate::error::RefreshError;
use crate::i18n::{self, Text};
use crate::location::{LocationResolver, ResolvedLocation};
use crate::prefs::Preferences;
use crate::provider::TimingProvider;
use crate::schedule::ScheduleSnapshot;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Where the most recent refresh stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RefreshStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// Carries a message fit for the user, in their language.
    Failed(String),
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStatus::Idle => f.write_str("idle"),
            RefreshStatus::Loading => f.write_str("loading"),
            RefreshStatus::Loaded => f.write_str("loaded"),
            RefreshStatus::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Resolves the location, asks the provider and swaps in the new snapshot.
///
/// A failed refresh leaves the previous snapshot in place. Overlapping
/// refreshes are not coordinated; whichever finishes last wins.
pub struct RefreshCoordinator {
    resolver: LocationResolver,
    provider: Arc<dyn TimingProvider>,
    snapshot: RwLock<Option<Arc<ScheduleSnapshot>>>,
    status: RwLock<RefreshStatus>,
    location: RwLock<Option<ResolvedLocation>>,
}

impl RefreshCoordinator {
    pub fn new(resolver: LocationResolver, provider: Arc<dyn TimingProvider>) -> Self {
        Self {
            resolver,
            provider,
            snapshot: RwLock::new(None),
            status: RwLock::new(RefreshStatus::Idle),
            location: RwLock::new(None),
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn status(&self) -> RefreshStatus {
        self.status.read().await.clone()
    }

    /// The location used by the last successful refresh.
    pub async fn location(&self) -> Option<ResolvedLocation> {
        *self.location.read().await
    }

    pub async fn refresh(
        &self,
        prefs: &Preferences,
        now: DateTime<Utc>,
    ) -> Result<Arc<ScheduleSnapshot>, RefreshError> {
        *self.status.write().await = RefreshStatus::Loading;

        match self.fetch(prefs, now).await {
            Ok((location, snapshot)) => {
                let snapshot = Arc::new(snapshot);
                *self.snapshot.write().await = Some(snapshot.clone());
                *self.location.write().await = Some(location);
                *self.status.write().await = RefreshStatus::Loaded;
                info!(
                    "Schedule refreshed for {} ({} prayers, zone {}).",
                    location.coordinate,
                    snapshot.len(),
                    snapshot.timezone()
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Refresh failed, keeping the previous schedule: {}", e);
                let message = i18n::tr(Text::CheckInternet, prefs.language).to_string();
                *self.status.write().await = RefreshStatus::Failed(message);
                Err(e)
            }
        }
    }

    async fn fetch(
        &self,
        prefs: &Preferences,
        now: DateTime<Utc>,
    ) -> Result<(ResolvedLocation, ScheduleSnapshot), RefreshError> {
        let location = self.resolver.resolve(prefs.location).await;
        let response = self
            .provider
            .fetch_timings(location.coordinate, prefs.method)
            .await?;
        let snapshot = ScheduleSnapshot::from_timings(
            &response.timings,
            location.coordinate,
            prefs.method,
            response.timezone,
            now,
        )?;
        Ok((location, snapshot))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::{CalculationMethod, Coordinate};
    use crate::error::{ProviderError, ScheduleError};
    use crate::i18n::Language;
    use crate::location::tests::ScriptedSensor;
    use crate::location::{City, LocationOrigin, LocationSelection};
    use crate::provider::TimingResponse;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Answers with queued results and records each request.
    pub(crate) struct FakeProvider {
        answers: Mutex<VecDeque<Result<TimingResponse, ProviderError>>>,
        pub requests: Mutex<Vec<(Coordinate, CalculationMethod)>>,
    }

    impl FakeProvider {
        pub(crate) fn new(answers: Vec<Result<TimingResponse, ProviderError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TimingProvider for FakeProvider {
        async fn fetch_timings(
            &self,
            coordinate: Coordinate,
            method: CalculationMethod,
        ) -> Result<TimingResponse, ProviderError> {
            self.requests.lock().unwrap().push((coordinate, method));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Unreachable("no answer queued".into())))
        }
    }

    pub(crate) fn cairo_response() -> TimingResponse {
        let timings: HashMap<String, String> = [
            ("Fajr", "04:50"),
            ("Sunrise", "06:15"),
            ("Dhuhr", "12:10"),
            ("Asr", "15:30"),
            ("Maghrib", "18:05"),
            ("Isha", "19:20"),
            ("Midnight", "00:10"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        TimingResponse {
            timings,
            timezone: "Africa/Cairo".to_string(),
        }
    }

    fn coordinator(provider: Arc<FakeProvider>, sensor: Arc<ScriptedSensor>) -> RefreshCoordinator {
        RefreshCoordinator::new(LocationResolver::new(sensor, City::Cairo), provider)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 16, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn successful_refresh_publishes_snapshot() {
        let provider = Arc::new(FakeProvider::new(vec![Ok(cairo_response())]));
        let coordinator = coordinator(provider.clone(), Arc::new(ScriptedSensor::new(vec![])));
        assert_eq!(coordinator.status().await, RefreshStatus::Idle);

        let snapshot = coordinator.refresh(&Preferences::default(), now()).await.unwrap();

        assert_eq!(snapshot.len(), 6);
        assert_eq!(snapshot.method(), CalculationMethod::DEFAULT);
        assert_eq!(snapshot.fetched_at(), now());
        assert_eq!(coordinator.status().await, RefreshStatus::Loaded);
        assert_eq!(coordinator.snapshot().await, Some(snapshot));
        assert_eq!(
            provider.requests.lock().unwrap()[0],
            (City::Cairo.coordinate(), CalculationMethod::DEFAULT)
        );
    }

    #[tokio::test]
    async fn provider_failure_keeps_previous_snapshot() {
        let provider = Arc::new(FakeProvider::new(vec![
            Ok(cairo_response()),
            Err(ProviderError::Status { status: 500 }),
        ]));
        let coordinator = coordinator(provider, Arc::new(ScriptedSensor::new(vec![])));
        let mut prefs = Preferences::default();
        prefs.language = Language::En;

        let first = coordinator.refresh(&prefs, now()).await.unwrap();
        let err = coordinator.refresh(&prefs, now()).await.unwrap_err();

        assert!(matches!(err, RefreshError::Provider(ProviderError::Status { status: 500 })));
        assert_eq!(
            coordinator.status().await,
            RefreshStatus::Failed("Check your internet connection".to_string())
        );
        assert_eq!(coordinator.snapshot().await, Some(first));
    }

    #[tokio::test]
    async fn response_without_prayers_is_a_failure() {
        let empty = TimingResponse {
            timings: HashMap::from([("Imsak".to_string(), "04:40".to_string())]),
            timezone: "UTC".to_string(),
        };
        let provider = Arc::new(FakeProvider::new(vec![Ok(empty)]));
        let coordinator = coordinator(provider, Arc::new(ScriptedSensor::new(vec![])));

        let err = coordinator.refresh(&Preferences::default(), now()).await.unwrap_err();

        assert!(matches!(err, RefreshError::Schedule(ScheduleError::Empty)));
        assert!(matches!(coordinator.status().await, RefreshStatus::Failed(_)));
        assert_eq!(coordinator.snapshot().await, None);
    }

    #[tokio::test]
    async fn device_selection_asks_for_the_sensed_coordinate() {
        let here = Coordinate::new(21.4225, 39.8262).unwrap();
        let provider = Arc::new(FakeProvider::new(vec![Ok(cairo_response())]));
        let coordinator = coordinator(provider.clone(), Arc::new(ScriptedSensor::new(vec![Ok(here)])));
        let mut prefs = Preferences::default();
        prefs.location = LocationSelection::Device;
        prefs.method = CalculationMethod(4);

        coordinator.refresh(&prefs, now()).await.unwrap();

        assert_eq!(provider.requests.lock().unwrap()[0], (here, CalculationMethod(4)));
        let location = coordinator.location().await.unwrap();
        assert_eq!(location.origin, LocationOrigin::Device);
    }
}
