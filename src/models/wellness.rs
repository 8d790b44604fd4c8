use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SideEffect {
  pub id: i64,
  pub cycle_id: Option<i64>,
  pub symptom: String,
  /// 1 (mild) to 5 (severe)
  pub severity: i64,
  pub noted_on: NaiveDate,
  pub notes: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSideEffect {
  pub cycle_id: Option<i64>,
  pub symptom: String,
  pub severity: i64,
  pub noted_on: NaiveDate,
  pub notes: Option<String>,
}

/// One body-composition entry per calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BodyMetric {
  pub id: i64,
  pub recorded_on: NaiveDate,
  pub weight_kg: Option<f64>,
  pub body_fat_pct: Option<f64>,
  pub waist_cm: Option<f64>,
  pub notes: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBodyMetric {
  pub recorded_on: NaiveDate,
  pub weight_kg: Option<f64>,
  pub body_fat_pct: Option<f64>,
  pub waist_cm: Option<f64>,
  pub notes: Option<String>,
}
