use crate::db::AppState;
use crate::models::wellness::{BodyMetric, NewBodyMetric, NewSideEffect, SideEffect};
use chrono::NaiveDate;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Side Effects
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn log_side_effect(
  state: State<'_, Arc<AppState>>,
  entry: NewSideEffect,
) -> Result<i64, String> {
  if !(1..=5).contains(&entry.severity) {
    return Err("Severity must be between 1 and 5".to_string());
  }

  let result = sqlx::query(
    r#"
    INSERT INTO side_effects (cycle_id, symptom, severity, noted_on, notes)
    VALUES (?1, ?2, ?3, ?4, ?5)
    "#,
  )
  .bind(entry.cycle_id)
  .bind(&entry.symptom)
  .bind(entry.severity)
  .bind(entry.noted_on)
  .bind(&entry.notes)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to log side effect: {}", e))?;

  Ok(result.last_insert_rowid())
}

#[tauri::command]
pub async fn get_side_effects(
  state: State<'_, Arc<AppState>>,
  limit: Option<i64>,
) -> Result<Vec<SideEffect>, String> {
  let limit = limit.unwrap_or(100);

  sqlx::query_as::<_, SideEffect>(
    "SELECT * FROM side_effects ORDER BY noted_on DESC, id DESC LIMIT ?1",
  )
  .bind(limit)
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch side effects: {}", e))
}

/// ---------------------------------------------------------------------------
/// Body Composition
/// ---------------------------------------------------------------------------

/// One entry per day; logging twice on the same date overwrites the fields
/// that were provided.
#[tauri::command]
pub async fn log_body_metrics(
  state: State<'_, Arc<AppState>>,
  entry: NewBodyMetric,
) -> Result<(), String> {
  sqlx::query(
    r#"
    INSERT INTO body_metrics (recorded_on, weight_kg, body_fat_pct, waist_cm, notes)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(recorded_on) DO UPDATE SET
      weight_kg = COALESCE(excluded.weight_kg, weight_kg),
      body_fat_pct = COALESCE(excluded.body_fat_pct, body_fat_pct),
      waist_cm = COALESCE(excluded.waist_cm, waist_cm),
      notes = COALESCE(excluded.notes, notes)
    "#,
  )
  .bind(entry.recorded_on)
  .bind(entry.weight_kg)
  .bind(entry.body_fat_pct)
  .bind(entry.waist_cm)
  .bind(&entry.notes)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to log body metrics: {}", e))?;

  Ok(())
}

#[tauri::command]
pub async fn get_body_metrics(
  state: State<'_, Arc<AppState>>,
  start: NaiveDate,
  end: NaiveDate,
) -> Result<Vec<BodyMetric>, String> {
  sqlx::query_as::<_, BodyMetric>(
    r#"
    SELECT * FROM body_metrics
    WHERE recorded_on >= ?1 AND recorded_on <= ?2
    ORDER BY recorded_on DESC
    "#,
  )
  .bind(start)
  .bind(end)
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch body metrics: {}", e))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
