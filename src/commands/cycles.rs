use crate::db::AppState;
use crate::models::cycle::{CycleStatus, NewCycle};
use crate::models::Cycle;
use crate::schedule::expand_schedule;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Create Cycle (and generate its dose schedule)
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CycleCreateResult {
  pub cycle_id: i64,
  /// Doses produced by expanding the schedule rule
  pub generated: usize,
  /// Doses actually persisted; lower than `generated` when writes failed
  pub saved: usize,
}

#[tauri::command]
pub async fn create_cycle(
  state: State<'_, Arc<AppState>>,
  cycle: NewCycle,
) -> Result<CycleCreateResult, String> {
  if cycle.end_date < cycle.start_date {
    return Err("End date must be on or after start date".to_string());
  }

  let route = cycle.route.unwrap_or_else(|| "subcutaneous".to_string());

  let result = sqlx::query(
    r#"
    INSERT INTO cycles (
      peptide_name, dose_amount, dose_unit, route,
      start_date, end_date, schedule_json, status, notes
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8)
    "#,
  )
  .bind(&cycle.peptide_name)
  .bind(&cycle.dose_amount)
  .bind(&cycle.dose_unit)
  .bind(&route)
  .bind(cycle.start_date)
  .bind(cycle.end_date)
  .bind(cycle.schedule.to_json())
  .bind(&cycle.notes)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to create cycle: {}", e))?;

  let cycle_id = result.last_insert_rowid();

  let stored = load_cycle(&state.db, cycle_id).await?;
  let (generated, saved) = regenerate_doses(&state.db, &stored).await?;

  println!(
    "Cycle {} created: {} doses generated, {} saved",
    cycle_id, generated, saved
  );

  Ok(CycleCreateResult {
    cycle_id,
    generated,
    saved,
  })
}

/// ---------------------------------------------------------------------------
/// Update Cycle Schedule (re-expansion)
/// ---------------------------------------------------------------------------

/// Change a cycle's date range and/or rule, then regenerate its doses.
/// Regeneration upserts by (cycle_id, scheduled_date, time_label), so doses
/// that already exist - including ones the user has logged - are untouched.
#[tauri::command]
pub async fn update_cycle_schedule(
  state: State<'_, Arc<AppState>>,
  cycle_id: i64,
  start_date: chrono::NaiveDate,
  end_date: chrono::NaiveDate,
  schedule: crate::schedule::ScheduleRule,
) -> Result<CycleCreateResult, String> {
  if end_date < start_date {
    return Err("End date must be on or after start date".to_string());
  }

  sqlx::query(
    "UPDATE cycles SET start_date = ?1, end_date = ?2, schedule_json = ?3 WHERE id = ?4",
  )
  .bind(start_date)
  .bind(end_date)
  .bind(schedule.to_json())
  .bind(cycle_id)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to update cycle {}: {}", cycle_id, e))?;

  let stored = load_cycle(&state.db, cycle_id).await?;
  let (generated, saved) = regenerate_doses(&state.db, &stored).await?;

  Ok(CycleCreateResult {
    cycle_id,
    generated,
    saved,
  })
}

/// ---------------------------------------------------------------------------
/// Cycle Lifecycle
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn set_cycle_status(
  state: State<'_, Arc<AppState>>,
  cycle_id: i64,
  status: String,
) -> Result<(), String> {
  let parsed = CycleStatus::from_str(&status)?;

  sqlx::query("UPDATE cycles SET status = ?1 WHERE id = ?2")
    .bind(parsed.to_string())
    .bind(cycle_id)
    .execute(&state.db)
    .await
    .map_err(|e| format!("Failed to update cycle {}: {}", cycle_id, e))?;

  Ok(())
}

/// Delete a cycle and every dose generated from it. Doses are never deleted
/// individually; this cascade is the only deletion path.
#[tauri::command]
pub async fn delete_cycle(state: State<'_, Arc<AppState>>, cycle_id: i64) -> Result<(), String> {
  sqlx::query("DELETE FROM doses WHERE cycle_id = ?1")
    .bind(cycle_id)
    .execute(&state.db)
    .await
    .map_err(|e| format!("Failed to delete doses for cycle {}: {}", cycle_id, e))?;

  sqlx::query("DELETE FROM cycles WHERE id = ?1")
    .bind(cycle_id)
    .execute(&state.db)
    .await
    .map_err(|e| format!("Failed to delete cycle {}: {}", cycle_id, e))?;

  println!("Cycle {} deleted", cycle_id);
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Dose Generation Helpers
/// ---------------------------------------------------------------------------

async fn load_cycle(db: &crate::db::DbPool, cycle_id: i64) -> Result<Cycle, String> {
  sqlx::query_as::<_, Cycle>("SELECT * FROM cycles WHERE id = ?1")
    .bind(cycle_id)
    .fetch_optional(db)
    .await
    .map_err(|e| format!("Failed to load cycle {}: {}", cycle_id, e))?
    .ok_or_else(|| format!("Cycle {} not found", cycle_id))
}

/// Expand the cycle's rule and upsert every planned dose, snapshotting the
/// cycle's peptide/dose fields onto each row. Returns (generated, saved);
/// a failed write is logged and skipped rather than aborting the batch.
pub async fn regenerate_doses(
  db: &crate::db::DbPool,
  cycle: &Cycle,
) -> Result<(usize, usize), String> {
  let rule = crate::schedule::ScheduleRule::from_json(&cycle.schedule_json)?;
  let planned = expand_schedule(&rule, cycle.start_date, cycle.end_date);

  let mut saved = 0;
  for dose in &planned {
    match upsert_dose(db, cycle, &dose.scheduled_date, &dose.time_label).await {
      Ok(()) => saved += 1,
      Err(e) => {
        eprintln!(
          "Warning: failed to save dose {} {} for cycle {}: {}",
          dose.scheduled_date, dose.time_label, cycle.id, e
        );
      }
    }
  }

  Ok((planned.len(), saved))
}

/// Upsert by natural key. An existing row (possibly already logged by the
/// user) is left untouched.
async fn upsert_dose(
  db: &crate::db::DbPool,
  cycle: &Cycle,
  scheduled_date: &chrono::NaiveDate,
  time_label: &str,
) -> Result<(), String> {
  sqlx::query(
    r#"
    INSERT INTO doses (
      cycle_id, peptide_name, dose_amount, dose_unit, route,
      scheduled_date, time_label, status
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'scheduled')
    ON CONFLICT(cycle_id, scheduled_date, time_label) DO NOTHING
    "#,
  )
  .bind(cycle.id)
  .bind(&cycle.peptide_name)
  .bind(&cycle.dose_amount)
  .bind(&cycle.dose_unit)
  .bind(&cycle.route)
  .bind(scheduled_date)
  .bind(time_label)
  .execute(db)
  .await
  .map_err(|e| e.to_string())?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
