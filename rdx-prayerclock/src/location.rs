//! Location resolution: a fixed catalog city, or the device sensor with a
//! fallback to the default city.

use crate::common::Coordinate;
use crate::error::LocationError;
use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The built-in city catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum City {
    #[default]
    Cairo,
    Riyadh,
    NewYork,
    KafrElSheikh,
    Algiers,
}

impl City {
    pub const ALL: [City; 5] = [
        City::Cairo,
        City::Riyadh,
        City::NewYork,
        City::KafrElSheikh,
        City::Algiers,
    ];

    /// The value stored in preferences.
    pub fn raw_value(&self) -> &'static str {
        match self {
            City::Cairo => "Cairo",
            City::Riyadh => "Riyadh",
            City::NewYork => "New York",
            City::KafrElSheikh => "Kafr El-Sheikh",
            City::Algiers => "Algiers",
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        let (latitude, longitude) = match self {
            City::Cairo => (30.0444, 31.2357),
            City::Riyadh => (24.7136, 46.6753),
            City::NewYork => (40.7128, -74.0060),
            City::KafrElSheikh => (31.1107, 30.9388),
            City::Algiers => (36.7528, 3.0420),
        };
        Coordinate::known(latitude, longitude)
    }

    pub fn display_name(&self, language: Language) -> &'static str {
        match (self, language) {
            (City::Cairo, Language::Ar) => "القاهرة، مصر",
            (City::Riyadh, Language::Ar) => "الرياض، السعودية",
            (City::NewYork, Language::Ar) => "نيويورك، أمريكا",
            (City::KafrElSheikh, Language::Ar) => "كفر الشيخ، مصر",
            (City::Algiers, Language::Ar) => "الجزائر العاصمة",
            (City::Cairo, _) => "Cairo, Egypt",
            (City::Riyadh, _) => "Riyadh, KSA",
            (City::NewYork, _) => "New York, USA",
            (City::KafrElSheikh, _) => "Kafr El-Sheikh, Egypt",
            (City::Algiers, _) => "Algiers, Algeria",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw_value())
    }
}

impl FromStr for City {
    type Err = String;

    /// Accepts the stored value ("New York") or its kebab form ("new-york").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', " ").to_ascii_lowercase();
        City::ALL
            .iter()
            .copied()
            .find(|city| city.raw_value().replace('-', " ").to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown city '{}'", s))
    }
}

/// Where the user wants prayer times for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSelection {
    Catalog(City),
    Device,
}

impl Default for LocationSelection {
    fn default() -> Self {
        LocationSelection::Catalog(City::default())
    }
}

/// How a coordinate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOrigin {
    Catalog(City),
    Device,
    /// The sensor failed and the default city stood in.
    Fallback(City),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub origin: LocationOrigin,
}

impl ResolvedLocation {
    /// The catalog city behind this location, if any.
    pub fn city(&self) -> Option<City> {
        match self.origin {
            LocationOrigin::Catalog(city) | LocationOrigin::Fallback(city) => Some(city),
            LocationOrigin::Device => None,
        }
    }
}

/// A device location sensor.
///
/// `start_updates` begins delivering readings on the returned channel; the
/// channel closing means the sensor gave up. `stop_updates` must release the
/// hardware.
pub trait LocationSensor: Send + Sync {
    fn start_updates(&self) -> mpsc::Receiver<Result<Coordinate, LocationError>>;
    fn stop_updates(&self);
}

/// A sensor for hosts without location hardware. Fails immediately.
#[derive(Debug, Default)]
pub struct NoSensor;

impl LocationSensor for NoSensor {
    fn start_updates(&self) -> mpsc::Receiver<Result<Coordinate, LocationError>> {
        let (tx, rx) = mpsc::channel(1);
        tx.try_send(Err(LocationError::Unavailable(
            "no location hardware".to_string(),
        )))
        .ok();
        rx
    }

    fn stop_updates(&self) {}
}

/// Turns a `LocationSelection` into a coordinate for the timing provider.
pub struct LocationResolver {
    sensor: Arc<dyn LocationSensor>,
    default_city: City,
}

impl LocationResolver {
    pub fn new(sensor: Arc<dyn LocationSensor>, default_city: City) -> Self {
        Self {
            sensor,
            default_city,
        }
    }

    /// Resolves a coordinate.
    ///
    /// A catalog selection answers immediately without touching the sensor.
    /// A device selection waits for the first sensor reading and stops the
    /// sensor straight after it. Sensor failures never reach the caller: the
    /// default city is used instead.
    pub async fn resolve(&self, selection: LocationSelection) -> ResolvedLocation {
        match selection {
            LocationSelection::Catalog(city) => {
                debug!("Using catalog location {}.", city);
                ResolvedLocation {
                    coordinate: city.coordinate(),
                    origin: LocationOrigin::Catalog(city),
                }
            }
            LocationSelection::Device => match self.first_reading().await {
                Ok(coordinate) => {
                    info!("Device location resolved to {}.", coordinate);
                    ResolvedLocation {
                        coordinate,
                        origin: LocationOrigin::Device,
                    }
                }
                Err(e) => {
                    warn!(
                        "Device location failed ({}); falling back to {}.",
                        e, self.default_city
                    );
                    ResolvedLocation {
                        coordinate: self.default_city.coordinate(),
                        origin: LocationOrigin::Fallback(self.default_city),
                    }
                }
            },
        }
    }

    async fn first_reading(&self) -> Result<Coordinate, LocationError> {
        let mut readings = self.sensor.start_updates();
        let reading = readings.recv().await;
        self.sensor.stop_updates();
        reading.ok_or(LocationError::NoReading)?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A sensor that replays canned readings and counts start/stop calls.
    pub(crate) struct ScriptedSensor {
        readings: Vec<Result<Coordinate, LocationError>>,
        pub starts: AtomicUsize,
        pub stops: AtomicUsize,
    }

    impl ScriptedSensor {
        pub(crate) fn new(readings: Vec<Result<Coordinate, LocationError>>) -> Self {
            Self {
                readings,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            }
        }
    }

    impl LocationSensor for ScriptedSensor {
        fn start_updates(&self) -> mpsc::Receiver<Result<Coordinate, LocationError>> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(self.readings.len().max(1));
            for reading in &self.readings {
                tx.try_send(reading.clone()).ok();
            }
            rx
        }

        fn stop_updates(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn london() -> Coordinate {
        Coordinate::new(51.5072, -0.1276).unwrap()
    }

    #[tokio::test]
    async fn catalog_selection_never_touches_the_sensor() {
        let sensor = Arc::new(ScriptedSensor::new(vec![Ok(london())]));
        let resolver = LocationResolver::new(sensor.clone(), City::Cairo);

        let resolved = resolver
            .resolve(LocationSelection::Catalog(City::Riyadh))
            .await;

        assert_eq!(resolved.origin, LocationOrigin::Catalog(City::Riyadh));
        assert_eq!(resolved.coordinate, City::Riyadh.coordinate());
        assert_eq!(sensor.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn device_selection_takes_first_reading_and_stops() {
        let second = Coordinate::new(48.8566, 2.3522).unwrap();
        let sensor = Arc::new(ScriptedSensor::new(vec![Ok(london()), Ok(second)]));
        let resolver = LocationResolver::new(sensor.clone(), City::Cairo);

        let resolved = resolver.resolve(LocationSelection::Device).await;

        assert_eq!(resolved.origin, LocationOrigin::Device);
        assert_eq!(resolved.coordinate, london());
        assert_eq!(resolved.city(), None);
        assert_eq!(sensor.starts.load(Ordering::SeqCst), 1);
        assert_eq!(sensor.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sensor_error_falls_back_to_default_city() {
        let sensor = Arc::new(ScriptedSensor::new(vec![Err(LocationError::Unavailable(
            "denied".to_string(),
        ))]));
        let resolver = LocationResolver::new(sensor.clone(), City::Algiers);

        let resolved = resolver.resolve(LocationSelection::Device).await;

        assert_eq!(resolved.origin, LocationOrigin::Fallback(City::Algiers));
        assert_eq!(resolved.coordinate, City::Algiers.coordinate());
        assert_eq!(sensor.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn silent_or_garbage_sensor_falls_back() {
        let silent = Arc::new(ScriptedSensor::new(vec![]));
        let resolver = LocationResolver::new(silent, City::Cairo);
        let resolved = resolver.resolve(LocationSelection::Device).await;
        assert_eq!(resolved.origin, LocationOrigin::Fallback(City::Cairo));

        let garbage = Arc::new(ScriptedSensor::new(vec![Coordinate::new(123.0, 0.0)]));
        let resolver = LocationResolver::new(garbage, City::Cairo);
        let resolved = resolver.resolve(LocationSelection::Device).await;
        assert_eq!(resolved.origin, LocationOrigin::Fallback(City::Cairo));
    }

    #[test]
    fn catalog_coordinates_are_in_range() {
        for city in City::ALL {
            let c = city.coordinate();
            assert_eq!(Coordinate::new(c.latitude(), c.longitude()), Ok(c));
        }
    }

    #[test]
    fn city_parses_stored_and_kebab_forms() {
        assert_eq!("New York".parse::<City>(), Ok(City::NewYork));
        assert_eq!("new-york".parse::<City>(), Ok(City::NewYork));
        assert_eq!("kafr-el-sheikh".parse::<City>(), Ok(City::KafrElSheikh));
        assert_eq!("Kafr El-Sheikh".parse::<City>(), Ok(City::KafrElSheikh));
        assert!("Atlantis".parse::<City>().is_err());
    }
}
