//! The live countdown to the next prayer.

use crate::config::LabelFormat;
use crate::i18n::{self, Language, Text};
use crate::resolver::next_prayer;
use crate::schedule::{PrayerKey, ScheduleSnapshot};
use crate::time::LocalZone;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What a display needs to render the countdown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountdownState {
    pub upcoming: Option<PrayerKey>,
    pub upcoming_at: Option<DateTime<Utc>>,
    pub remaining: Duration,
    pub label: String,
}

/// Tracks the next prayer and renders the time left until it.
///
/// Idle until a schedule arrives. Every recompute is a pure function of the
/// held schedule, `now`, the zone and the language.
pub struct CountdownEngine {
    format: LabelFormat,
    zone: LocalZone,
    language: Language,
    schedule: Option<Arc<ScheduleSnapshot>>,
    state: CountdownState,
}

impl CountdownEngine {
    pub fn new(format: LabelFormat, zone: LocalZone, language: Language) -> Self {
        Self {
            format,
            zone,
            language,
            schedule: None,
            state: CountdownState::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn state(&self) -> &CountdownState {
        &self.state
    }

    pub fn schedule_updated(&mut self, schedule: Arc<ScheduleSnapshot>, now: DateTime<Utc>) -> &CountdownState {
        self.schedule = Some(schedule);
        self.tick(now)
    }

    /// Recomputes in place. Does nothing while idle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> &CountdownState {
        if let Some(schedule) = &self.schedule {
            self.state = compute(schedule, now, self.zone, self.language, self.format);
        }
        &self.state
    }

    pub fn schedule_cleared(&mut self) {
        self.schedule = None;
        self.state = CountdownState::default();
    }

    pub fn language_changed(&mut self, language: Language, now: DateTime<Utc>) -> &CountdownState {
        self.language = language;
        self.tick(now)
    }
}

fn compute(
    schedule: &ScheduleSnapshot,
    now: DateTime<Utc>,
    zone: LocalZone,
    language: Language,
    format: LabelFormat,
) -> CountdownState {
    match next_prayer(schedule, now, zone) {
        None => CountdownState {
            upcoming: None,
            upcoming_at: None,
            remaining: Duration::ZERO,
            label: i18n::tr(Text::NoSchedule, language).to_string(),
        },
        Some(next) => {
            let remaining = next.remaining(now);
            let label = format!(
                "{} {}",
                i18n::prayer_name(next.key, language),
                format_remaining(remaining, language, format)
            );
            CountdownState {
                upcoming: Some(next.key),
                upcoming_at: Some(next.at),
                remaining,
                label,
            }
        }
    }
}

/// Renders a duration as `1h 10m` or `01:10:00`.
pub fn format_remaining(remaining: Duration, language: Language, format: LabelFormat) -> String {
    let total = remaining.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match format {
        LabelFormat::Clock => format!("{:02}:{:02}:{:02}", hours, minutes, seconds),
        LabelFormat::Compact => {
            let h = i18n::tr(Text::HourUnit, language);
            let m = i18n::tr(Text::MinuteUnit, language);
            if hours > 0 {
                format!("{}{} {}{}", hours, h, minutes, m)
            } else if minutes > 0 {
                format!("{}{}", minutes, m)
            } else {
                format!("{}{}", seconds, i18n::tr(Text::SecondUnit, language))
            }
        }
    }
}
