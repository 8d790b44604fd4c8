use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cycle {
  pub id: i64,
  pub peptide_name: String,
  pub dose_amount: String,
  pub dose_unit: String,
  pub route: String,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  /// Serialized `schedule::ScheduleRule`
  pub schedule_json: String,
  pub status: String,
  pub notes: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// For creating new cycles (without id, created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCycle {
  pub peptide_name: String,
  pub dose_amount: String,
  pub dose_unit: String,
  pub route: Option<String>,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub schedule: crate::schedule::ScheduleRule,
  pub notes: Option<String>,
}

/// ---------------------------------------------------------------------------
/// Cycle Lifecycle Status
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
  #[default]
  Active,
  Paused,
  Completed,
}

impl std::fmt::Display for CycleStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Active => write!(f, "active"),
      Self::Paused => write!(f, "paused"),
      Self::Completed => write!(f, "completed"),
    }
  }
}

impl std::str::FromStr for CycleStatus {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "active" => Ok(Self::Active),
      "paused" => Ok(Self::Paused),
      "completed" => Ok(Self::Completed),
      _ => Err(format!("Unknown cycle status: {}", s)),
    }
  }
}
