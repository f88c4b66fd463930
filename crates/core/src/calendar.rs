//! Rest-day classification shared by the calendar and scheduling crates.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Why a date counts as a rest day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestDayKind {
    /// Ordinary workday.
    None,
    Weekend,
    PublicHoliday,
    SubstituteHoliday,
    TemporaryHoliday,
}

/// Answer to "is date D a rest day, and why". Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestDayInfo {
    pub date: NaiveDate,
    pub is_rest_day: bool,
    pub kind: RestDayKind,
    /// Registry-provided name ("Chuseok", …) or a fixed weekend/workday label.
    pub label: String,
}

impl RestDayInfo {
    /// Classify by weekday alone. This is also the degraded answer when the
    /// remote registry is unreachable.
    pub fn weekday_only(date: NaiveDate) -> Self {
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        if weekend {
            Self {
                date,
                is_rest_day: true,
                kind: RestDayKind::Weekend,
                label: "weekend".to_string(),
            }
        } else {
            Self {
                date,
                is_rest_day: false,
                kind: RestDayKind::None,
                label: "workday".to_string(),
            }
        }
    }
}
