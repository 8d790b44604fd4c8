//! Tracking context for insight generation
//!
//! Gathers one trailing period - cycles, adherence, side effects, body
//! trend, recent labs, spend - into a single serializable package that is
//! handed to the LLM as JSON. The numeric summaries are computed here, not
//! by the model.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Cycle;
use crate::schedule::ScheduleRule;

/// ---------------------------------------------------------------------------
/// Context Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSnapshot {
  pub peptide_name: String,
  pub dose: String,
  pub route: String,
  pub schedule: String,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdherenceStats {
  /// Doses whose scheduled date falls inside the period and has passed
  pub due: i64,
  pub logged: i64,
  pub missed: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub adherence_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffectSummary {
  pub symptom: String,
  pub occurrences: i64,
  pub max_severity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyTrend {
  pub first_weight_kg: f64,
  pub last_weight_kg: f64,
  pub delta_kg: f64,
  pub entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabSnapshot {
  pub marker: String,
  pub value: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unit: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flag: Option<String>,
  pub drawn_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightContext {
  pub period_days: i64,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub active_cycles: Vec<CycleSnapshot>,
  pub adherence: AdherenceStats,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub side_effects: Vec<SideEffectSummary>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body_trend: Option<BodyTrend>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub recent_labs: Vec<LabSnapshot>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub period_spend: Option<f64>,
}

impl InsightContext {
  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_default()
  }
}

/// ---------------------------------------------------------------------------
/// Pure Computations
/// ---------------------------------------------------------------------------

/// Percentage of due doses that were logged. None when nothing was due yet.
pub fn compute_adherence_pct(due: i64, logged: i64) -> Option<f64> {
  if due <= 0 {
    return None;
  }
  let pct = (logged as f64 / due as f64) * 100.0;
  Some((pct * 10.0).round() / 10.0)
}

/// First-to-last weight movement over the period. Needs at least two
/// entries to call it a trend.
pub fn compute_weight_trend(entries: &[(NaiveDate, f64)]) -> Option<BodyTrend> {
  if entries.len() < 2 {
    return None;
  }

  let (_, first) = entries.first()?;
  let (_, last) = entries.last()?;
  let delta = ((last - first) * 10.0).round() / 10.0;

  Some(BodyTrend {
    first_weight_kg: *first,
    last_weight_kg: *last,
    delta_kg: delta,
    entries: entries.len(),
  })
}

/// ---------------------------------------------------------------------------
/// Context Assembly
/// ---------------------------------------------------------------------------

pub async fn build_insight_context(
  db: &crate::db::DbPool,
  period_days: i64,
) -> Result<InsightContext, String> {
  let today = Utc::now().date_naive();
  let since = today - Duration::days(period_days);

  // Active cycles
  let cycles: Vec<Cycle> =
    sqlx::query_as("SELECT * FROM cycles WHERE status = 'active' ORDER BY start_date")
      .fetch_all(db)
      .await
      .map_err(|e| format!("Failed to fetch cycles: {}", e))?;

  let active_cycles = cycles
    .into_iter()
    .map(|c| {
      let schedule = ScheduleRule::from_json(&c.schedule_json)
        .map(|r| r.describe())
        .unwrap_or_else(|_| "custom".to_string());
      CycleSnapshot {
        peptide_name: c.peptide_name,
        dose: format!("{}{}", c.dose_amount, c.dose_unit),
        route: c.route,
        schedule,
        start_date: c.start_date,
        end_date: c.end_date,
      }
    })
    .collect();

  // Adherence over doses that came due inside the period
  let (due, logged, missed): (i64, i64, i64) = sqlx::query_as(
    r#"
    SELECT
      COUNT(*),
      COALESCE(SUM(status = 'logged'), 0),
      COALESCE(SUM(status = 'missed'), 0)
    FROM doses
    WHERE scheduled_date >= ?1 AND scheduled_date <= ?2
    "#,
  )
  .bind(since)
  .bind(today)
  .fetch_one(db)
  .await
  .map_err(|e| format!("Failed to compute adherence: {}", e))?;

  let adherence = AdherenceStats {
    due,
    logged,
    missed,
    adherence_pct: compute_adherence_pct(due, logged),
  };

  // Side effects grouped by symptom
  let side_effects: Vec<(String, i64, i64)> = sqlx::query_as(
    r#"
    SELECT symptom, COUNT(*), MAX(severity)
    FROM side_effects
    WHERE noted_on >= ?1
    GROUP BY symptom
    ORDER BY COUNT(*) DESC, symptom
    "#,
  )
  .bind(since)
  .fetch_all(db)
  .await
  .map_err(|e| format!("Failed to fetch side effects: {}", e))?;

  let side_effects = side_effects
    .into_iter()
    .map(|(symptom, occurrences, max_severity)| SideEffectSummary {
      symptom,
      occurrences,
      max_severity,
    })
    .collect();

  // Weight trend
  let weights: Vec<(NaiveDate, f64)> = sqlx::query_as(
    r#"
    SELECT recorded_on, weight_kg FROM body_metrics
    WHERE recorded_on >= ?1 AND weight_kg IS NOT NULL
    ORDER BY recorded_on
    "#,
  )
  .bind(since)
  .fetch_all(db)
  .await
  .map_err(|e| format!("Failed to fetch body metrics: {}", e))?;

  let body_trend = compute_weight_trend(&weights);

  // Most recent lab markers
  let labs: Vec<(String, f64, Option<String>, Option<String>, NaiveDate)> = sqlx::query_as(
    r#"
    SELECT marker, value, unit, flag, drawn_on
    FROM lab_results
    ORDER BY drawn_on DESC, marker
    LIMIT 12
    "#,
  )
  .fetch_all(db)
  .await
  .map_err(|e| format!("Failed to fetch lab results: {}", e))?;

  let recent_labs = labs
    .into_iter()
    .map(|(marker, value, unit, flag, drawn_on)| LabSnapshot {
      marker,
      value,
      unit,
      flag,
      drawn_on,
    })
    .collect();

  // Spend inside the period
  let spend: f64 = sqlx::query_scalar(
    "SELECT COALESCE(SUM(amount), 0.0) FROM expenses WHERE purchased_on >= ?1",
  )
  .bind(since)
  .fetch_one(db)
  .await
  .map_err(|e| format!("Failed to compute spend: {}", e))?;

  Ok(InsightContext {
    period_days,
    active_cycles,
    adherence,
    side_effects,
    body_trend,
    recent_labs,
    period_spend: if spend > 0.0 { Some(spend) } else { None },
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;
  use serial_test::serial;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn test_adherence_pct_basic() {
    assert_eq!(compute_adherence_pct(10, 9), Some(90.0));
    assert_eq!(compute_adherence_pct(3, 1), Some(33.3));
  }

  #[test]
  fn test_adherence_pct_nothing_due() {
    assert_eq!(compute_adherence_pct(0, 0), None);
  }

  #[test]
  fn test_weight_trend_needs_two_entries() {
    assert!(compute_weight_trend(&[]).is_none());
    assert!(compute_weight_trend(&[(date(2024, 1, 1), 82.0)]).is_none());
  }

  #[test]
  fn test_weight_trend_delta() {
    let entries = vec![
      (date(2024, 1, 1), 83.2),
      (date(2024, 1, 8), 82.7),
      (date(2024, 1, 15), 82.4),
    ];
    let trend = compute_weight_trend(&entries).unwrap();

    assert_eq!(trend.first_weight_kg, 83.2);
    assert_eq!(trend.last_weight_kg, 82.4);
    assert_eq!(trend.delta_kg, -0.8);
    assert_eq!(trend.entries, 3);
  }

  #[tokio::test]
  #[serial]
  async fn test_build_context_on_empty_db() {
    let pool = setup_test_db().await;

    let context = build_insight_context(&pool, 30).await.unwrap();

    assert_eq!(context.period_days, 30);
    assert!(context.active_cycles.is_empty());
    assert_eq!(context.adherence.due, 0);
    assert!(context.adherence.adherence_pct.is_none());
    assert!(context.body_trend.is_none());
    assert!(context.period_spend.is_none());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_build_context_counts_dose_statuses() {
    let pool = setup_test_db().await;
    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;

    seed_test_dose(&pool, cycle_id, -3, "08:00", "logged").await;
    seed_test_dose(&pool, cycle_id, -2, "08:00", "logged").await;
    seed_test_dose(&pool, cycle_id, -1, "08:00", "missed").await;

    let context = build_insight_context(&pool, 30).await.unwrap();

    assert_eq!(context.adherence.due, 3);
    assert_eq!(context.adherence.logged, 2);
    assert_eq!(context.adherence.missed, 1);
    assert_eq!(context.adherence.adherence_pct, Some(66.7));
    assert_eq!(context.active_cycles.len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_context_serializes_without_empty_sections() {
    let pool = setup_test_db().await;

    let context = build_insight_context(&pool, 7).await.unwrap();
    let json = context.to_json();

    // Empty collections are dropped from the payload sent to the model
    assert!(!json.contains("recent_labs"));
    assert!(!json.contains("side_effects"));
    assert!(json.contains("adherence"));

    teardown_test_db(pool).await;
  }
}
