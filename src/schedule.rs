//! Dose Schedule Engine
//!
//! Expands a cycle's recurrence rule into concrete dose slots where each
//! slot has:
//! - a scheduled calendar date
//! - a wall-clock time label (HH:MM)
//!
//! Key principles:
//! - Expansion is pure: no database access, persistence happens elsewhere
//! - The closed date interval is walked day by day, both endpoints included
//! - (date, time label) pairs are deterministic so regeneration upserts
//!   cleanly instead of duplicating
//! - An empty weekday/day-of-month selection means "no doses", not an error

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
/// Time Slots
// ---------------------------------------------------------------------------

pub const MORNING_SLOT: &str = "08:00";
pub const MIDDAY_SLOT: &str = "14:00";
pub const EVENING_SLOT: &str = "20:00";

/// Map a daily repetition count onto fixed time-of-day labels.
/// One dose lands in the morning, two split morning/evening, three or more
/// clamp to the three fixed slots.
pub fn slot_labels(times_per_day: u32) -> &'static [&'static str] {
    match times_per_day {
        0 | 1 => &[MORNING_SLOT],
        2 => &[MORNING_SLOT, EVENING_SLOT],
        _ => &[MORNING_SLOT, MIDDAY_SLOT, EVENING_SLOT],
    }
}

// ---------------------------------------------------------------------------
/// Weekday Codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekdayCode {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl WeekdayCode {
    pub fn matches(&self, weekday: Weekday) -> bool {
        matches!(
            (self, weekday),
            (Self::Mon, Weekday::Mon)
                | (Self::Tue, Weekday::Tue)
                | (Self::Wed, Weekday::Wed)
                | (Self::Thu, Weekday::Thu)
                | (Self::Fri, Weekday::Fri)
                | (Self::Sat, Weekday::Sat)
                | (Self::Sun, Weekday::Sun)
        )
    }
}

// ---------------------------------------------------------------------------
/// Schedule Rule
// ---------------------------------------------------------------------------

/// How often doses occur within a cycle. Serialized onto the cycle row as
/// JSON, e.g. `{"kind":"weekly","days_of_week":["mon","thu"]}`. Each kind
/// carries exactly the fields it consults; unknown JSON fields are ignored
/// on parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleRule {
    /// N administrations per day, every day.
    Daily { times_per_day: u32 },
    /// One administration on each listed weekday.
    Weekly { days_of_week: Vec<WeekdayCode> },
    /// One administration on each listed day of the month (1-31).
    Monthly { days_of_month: Vec<u32> },
}

impl ScheduleRule {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse schedule rule: {}", e))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Human label for list views ("2x daily", "weekly (mon, thu)", ...).
    pub fn describe(&self) -> String {
        match self {
            Self::Daily { times_per_day } => match *times_per_day {
                0 | 1 => "daily".to_string(),
                n => format!("{}x daily", n.min(3)),
            },
            Self::Weekly { days_of_week } => {
                let days: Vec<String> = days_of_week
                    .iter()
                    .map(|d| format!("{:?}", d).to_lowercase())
                    .collect();
                format!("weekly ({})", days.join(", "))
            }
            Self::Monthly { days_of_month } => {
                let days: Vec<String> = days_of_month.iter().map(|d| d.to_string()).collect();
                format!("monthly ({})", days.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
/// Planned Dose
// ---------------------------------------------------------------------------

/// One concrete slot produced by expansion. Together with the owning cycle id
/// this forms the dose's natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDose {
    pub scheduled_date: NaiveDate,
    pub time_label: String,
}

// ---------------------------------------------------------------------------
/// Expansion
// ---------------------------------------------------------------------------

/// Expand a rule over the closed interval [start, end], ordered by
/// (date, time label). Returns an empty list when end precedes start or when
/// a weekly/monthly rule selects no days.
pub fn expand_schedule(rule: &ScheduleRule, start: NaiveDate, end: NaiveDate) -> Vec<PlannedDose> {
    let mut planned = Vec::new();

    if end < start {
        return planned;
    }

    let mut day = start;
    while day <= end {
        match rule {
            ScheduleRule::Daily { times_per_day } => {
                for label in slot_labels(*times_per_day) {
                    planned.push(PlannedDose {
                        scheduled_date: day,
                        time_label: (*label).to_string(),
                    });
                }
            }
            ScheduleRule::Weekly { days_of_week } => {
                if days_of_week.iter().any(|d| d.matches(day.weekday())) {
                    planned.push(PlannedDose {
                        scheduled_date: day,
                        time_label: MORNING_SLOT.to_string(),
                    });
                }
            }
            ScheduleRule::Monthly { days_of_month } => {
                if days_of_month.contains(&day.day()) {
                    planned.push(PlannedDose {
                        scheduled_date: day,
                        time_label: MORNING_SLOT.to_string(),
                    });
                }
            }
        }

        day += Duration::days(1);
    }

    planned
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
