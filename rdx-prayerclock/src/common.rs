//! Contains common, primitive types shared across the engine.
//!
//! This module defines the ID types used to identify registered listeners, and
//! the small value types (coordinates, calculation methods, sounds) that flow
//! between the engine and its external collaborators.

use crate::error::LocationError;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a registered listener within the engine.
    ///
    /// This key is returned when a new listener (e.g., for a prayer or a date
    /// change) is added to the engine. It is guaranteed to be unique and will not
    /// be reused, preventing stale ID bugs.
    pub struct ListenerId;
}

/// A geographic position in degrees.
///
/// Every value is range-checked: build one with [`Coordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = LocationError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Builds a coordinate, rejecting values outside the valid degree ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Catalog entries only. The values must already be in range.
    pub(crate) const fn known(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Identifies which convention the timing provider should use.
///
/// The engine attaches no meaning to the value beyond passing it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalculationMethod(pub u8);

impl CalculationMethod {
    /// Egyptian General Authority of Survey.
    pub const DEFAULT: CalculationMethod = CalculationMethod(5);

    /// Method ids understood by the default provider, with English labels.
    pub const KNOWN: &'static [(u8, &'static str)] = &[
        (1, "University of Islamic Sciences, Karachi"),
        (2, "Islamic Society of North America (ISNA)"),
        (3, "Muslim World League"),
        (4, "Umm Al-Qura University, Makkah"),
        (5, "Egyptian General Authority of Survey"),
        (7, "Institute of Geophysics, University of Tehran"),
        (8, "Gulf Region"),
        (9, "Kuwait"),
        (10, "Qatar"),
        (11, "Majlis Ugama Islam Singapura"),
        (12, "Union Organization Islamic de France"),
        (13, "Diyanet Isleri Baskanligi, Turkey"),
        (14, "Spiritual Administration of Muslims of Russia"),
        (15, "Moonsighting Committee Worldwide"),
        (16, "Dubai"),
        (17, "Jabatan Kemajuan Islam Malaysia (JAKIM)"),
        (18, "Tunisia"),
        (19, "Algeria"),
        (20, "Kementerian Agama Republik Indonesia"),
        (21, "Morocco"),
        (22, "Comunidade Islamica de Lisboa"),
        (23, "Ministry of Awqaf, Jordan"),
    ];

    /// Maps a stored value to a method, treating `0` as "not set".
    pub fn from_stored(value: u8) -> Self {
        if value == 0 {
            Self::DEFAULT
        } else {
            Self(value)
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        Self::KNOWN
            .iter()
            .find(|(id, _)| *id == self.0)
            .map(|(_, label)| *label)
    }
}

impl Default for CalculationMethod {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names the sound an alert should play. `"default"` is the sink's system sound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(pub String);

impl SoundId {
    pub fn system_default() -> Self {
        Self("default".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SoundId {
    fn default() -> Self {
        Self::system_default()
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
