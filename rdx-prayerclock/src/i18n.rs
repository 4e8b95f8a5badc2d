//! Lookup tables for the few strings the engine itself produces: alert
//! titles and bodies, countdown units, prayer names and the connectivity
//! error. Missing entries fall back to English.

use crate::schedule::PrayerKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ar,
    En,
    Ru,
    Id,
    Tr,
    Ur,
    Fa,
    De,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Ar,
        Language::En,
        Language::Ru,
        Language::Id,
        Language::Tr,
        Language::Ur,
        Language::Fa,
        Language::De,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::En => "en",
            Language::Ru => "ru",
            Language::Id => "id",
            Language::Tr => "tr",
            Language::Ur => "ur",
            Language::Fa => "fa",
            Language::De => "de",
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, Language::Ar | Language::Ur | Language::Fa)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported language '{}'", s))
    }
}

/// Keys into the string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    Prayer(PrayerKey),
    AlertTitle,
    /// Contains a single `{}` placeholder for the prayer name.
    AlertBody,
    TestAlertTitle,
    TestAlertBody,
    HourUnit,
    MinuteUnit,
    SecondUnit,
    NoSchedule,
    CheckInternet,
}

/// Per-language rows, ordered ar, en, ru, id, tr, ur, fa, de.
type Row = [Option<&'static str>; 8];

fn row(text: Text) -> Row {
    use PrayerKey::*;
    match text {
        Text::Prayer(Fajr) => [
            Some("الفجر"), Some("Fajr"), Some("Фаджр"), Some("Subuh"),
            Some("Fecir"), Some("فجر"), Some("فجر"), Some("Fajr"),
        ],
        Text::Prayer(Sunrise) => [
            Some("الشروق"), Some("Sunrise"), Some("Восход"), Some("Terbit"),
            Some("Güneş"), Some("طلوع آفتاب"), Some("طلوع"), Some("Sonnenaufgang"),
        ],
        Text::Prayer(Dhuhr) => [
            Some("الظهر"), Some("Dhuhr"), Some("Зухр"), Some("Dzuhur"),
            Some("Öğle"), Some("ظہر"), Some("ظهر"), Some("Dhuhr"),
        ],
        Text::Prayer(Asr) => [
            Some("العصر"), Some("Asr"), Some("Аср"), Some("Ashar"),
            Some("İkindi"), Some("عصر"), Some("عصر"), Some("Asr"),
        ],
        Text::Prayer(Maghrib) => [
            Some("المغرب"), Some("Maghrib"), Some("Магриб"), Some("Maghrib"),
            Some("Akşam"), Some("مغرب"), Some("مغرب"), Some("Maghrib"),
        ],
        Text::Prayer(Isha) => [
            Some("العشاء"), Some("Isha"), Some("Иша"), Some("Isya"),
            Some("Yatsı"), Some("عشاء"), Some("عشاء"), Some("Isha"),
        ],
        Text::AlertTitle => [
            Some("حان وقت الصلاة"), Some("Prayer Time"), Some("Время молитвы"),
            Some("Waktu Sholat"), Some("Namaz Vakti"), Some("نماز کا وقت"),
            Some("وقت نماز"), Some("Gebetszeit"),
        ],
        Text::AlertBody => [
            Some("حان وقت صلاة {}"), Some("It's time for {} prayer"),
            Some("Время для молитвы {}"), Some("Waktunya sholat {}"),
            Some("{} namazı vakti"), Some("{} نماز کا وقت ہے"),
            Some("وقت نماز {} است"), Some("Es ist Zeit für das {} Gebet"),
        ],
        Text::TestAlertTitle => [
            Some("اختبار: حان وقت الصلاة"), Some("Test: Prayer Time"),
            None, None, None, None, None, None,
        ],
        Text::TestAlertBody => [
            Some("اختبار: حان وقت صلاة {}"), Some("Test: It's time for {} prayer"),
            None, None, None, None, None, None,
        ],
        Text::HourUnit => [
            Some("س"), Some("h"), Some("ч"), Some("j"),
            Some("sa"), Some("گھنٹے"), Some("ساعت"), Some("Std"),
        ],
        Text::MinuteUnit => [
            Some("د"), Some("m"), Some("мин"), Some("m"),
            Some("dk"), Some("منٹ"), Some("دقیقه"), Some("Min"),
        ],
        Text::SecondUnit => [
            Some("ث"), Some("s"), Some("с"), Some("d"),
            Some("sn"), Some("سیکنڈ"), Some("ثانیه"), Some("Sek"),
        ],
        Text::NoSchedule => [
            Some("لا توجد مواقيت"), Some("No prayer times"), None, None,
            None, None, None, Some("Keine Gebetszeiten"),
        ],
        Text::CheckInternet => [
            Some("تأكد من الاتصال بالإنترنت"),
            Some("Check your internet connection"),
            Some("Проверьте подключение к интернету"),
            Some("Periksa koneksi internet Anda"),
            Some("İnternet bağlantınızı kontrol edin"),
            Some("اپنا انٹرنیٹ کنکشن چیک کریں"),
            Some("اتصال اینترنت خود را بررسی کنید"),
            Some("Überprüfen Sie Ihre Internetverbindung"),
        ],
    }
}

/// Looks up `text` in `language`, falling back to English.
pub fn tr(text: Text, language: Language) -> &'static str {
    let row = row(text);
    let index = Language::ALL
        .iter()
        .position(|l| *l == language)
        .unwrap_or(1);
    row[index].or(row[1]).unwrap_or("")
}

/// Localized display name of a prayer.
pub fn prayer_name(key: PrayerKey, language: Language) -> &'static str {
    tr(Text::Prayer(key), language)
}

/// Fills the single `{}` placeholder of a template.
pub fn fill(template: &str, value: &str) -> String {
    template.replacen("{}", value, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_fall_back_to_english() {
        assert_eq!(tr(Text::TestAlertTitle, Language::De), "Test: Prayer Time");
        assert_eq!(tr(Text::NoSchedule, Language::Ru), "No prayer times");
        assert_eq!(tr(Text::NoSchedule, Language::De), "Keine Gebetszeiten");
    }

    #[test]
    fn alert_body_fills_prayer_name() {
        let body = fill(
            tr(Text::AlertBody, Language::En),
            prayer_name(PrayerKey::Asr, Language::En),
        );
        assert_eq!(body, "It's time for Asr prayer");
        let body = fill(
            tr(Text::AlertBody, Language::Ar),
            prayer_name(PrayerKey::Asr, Language::Ar),
        );
        assert_eq!(body, "حان وقت صلاة العصر");
    }

    #[test]
    fn language_codes_round_trip() {
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>(), Ok(lang));
        }
        assert!("xx".parse::<Language>().is_err());
        assert!(Language::Ur.is_rtl());
        assert!(!Language::De.is_rtl());
    }
}
