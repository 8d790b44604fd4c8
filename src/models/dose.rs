use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled administration. Natural key is
/// (cycle_id, scheduled_date, time_label); peptide/dose fields are a
/// snapshot taken from the cycle when the dose was generated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dose {
  pub id: i64,
  pub cycle_id: i64,
  pub peptide_name: String,
  pub dose_amount: String,
  pub dose_unit: String,
  pub route: String,
  pub scheduled_date: NaiveDate,
  pub time_label: String,
  pub status: String,
  pub notes: Option<String>,
  pub logged_at: Option<DateTime<Utc>>,
  pub created_at: Option<DateTime<Utc>>,
}

/// ---------------------------------------------------------------------------
/// Dose Fulfillment Status
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
  #[default]
  Scheduled,
  Logged,
  Missed,
}

impl std::fmt::Display for DoseStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Scheduled => write!(f, "scheduled"),
      Self::Logged => write!(f, "logged"),
      Self::Missed => write!(f, "missed"),
    }
  }
}

impl std::str::FromStr for DoseStatus {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "scheduled" => Ok(Self::Scheduled),
      "logged" => Ok(Self::Logged),
      "missed" => Ok(Self::Missed),
      _ => Err(format!("Unknown dose status: {}", s)),
    }
  }
}
