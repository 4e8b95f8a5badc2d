//! Error types for the prayerclock engine.
//!
//! Every error here is recoverable: the engine either falls back to a default
//! or keeps the last valid state in place. None of them stop the process.

use crate::schedule::PrayerKey;
use thiserror::Error;

/// Failures of the device location sensor.
///
/// These never reach the caller of `LocationResolver::resolve`; the resolver
/// falls back to the default city instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location sensor unavailable: {0}")]
    Unavailable(String),

    #[error("Location sensor stopped before reporting a position")]
    NoReading,

    #[error("Invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

/// Failures talking to the timing provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Timing provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered with a non-2xx status.
    #[error("Timing provider returned HTTP {status}")]
    Status { status: u16 },

    /// The body could not be decoded into a timing response.
    #[error("Malformed timing provider response: {0}")]
    Malformed(String),
}

/// Problems with schedule contents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Timing response contained no known prayers")]
    Empty,

    #[error("Invalid time string for {key}: '{value}'")]
    InvalidTimeString { key: PrayerKey, value: String },
}

/// Failures reported by an alert sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Failed to submit alert '{id}': {message}")]
    SubmissionFailed { id: String, message: String },

    #[error("Failed to cancel alerts: {0}")]
    CancelFailed(String),

    #[error("Failed to list pending alerts: {0}")]
    ListFailed(String),
}

/// Why a refresh did not produce a new schedule.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
