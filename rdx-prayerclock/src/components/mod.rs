//! Contains the building blocks the engine runs on every tick.
//!
//! Watchers turn the tick stream into calendar and prayer milestones;
//! listeners hold the callbacks users register against those milestones.
//! The `PrayerClockEngine` owns collections of both.

pub mod listener;
pub mod watcher;
