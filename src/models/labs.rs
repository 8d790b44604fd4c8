use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single blood marker from one draw.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LabResult {
  pub id: i64,
  pub marker: String,
  pub value: f64,
  pub unit: Option<String>,
  pub reference_low: Option<f64>,
  pub reference_high: Option<f64>,
  pub flag: Option<String>,
  pub drawn_on: NaiveDate,
  pub lab_name: Option<String>,
  /// 'manual' or 'import'
  pub source: String,
  pub created_at: Option<DateTime<Utc>>,
}

/// For inserting new lab results (without id, created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLabResult {
  pub marker: String,
  pub value: f64,
  pub unit: Option<String>,
  pub reference_low: Option<f64>,
  pub reference_high: Option<f64>,
  pub flag: Option<String>,
  pub drawn_on: NaiveDate,
  pub lab_name: Option<String>,
}
