pub mod calendar;
pub mod cycles;
pub mod doses;
pub mod expenses;
pub mod insights;
pub mod labs;
pub mod wellness;

use crate::db::AppState;
use crate::models::{Cycle, Dose};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tauri::State;

#[tauri::command]
pub async fn get_cycles(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<Cycle>, String> {
  sqlx::query_as::<_, Cycle>(
    "SELECT * FROM cycles ORDER BY start_date DESC LIMIT 50"
  )
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch cycles: {}", e))
}

/// The dashboard's "next 7 days" strip.
#[tauri::command]
pub async fn get_upcoming_doses(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<Dose>, String> {
  let today = Utc::now().date_naive();
  let horizon = today + Duration::days(7);

  sqlx::query_as::<_, Dose>(
    r#"
    SELECT * FROM doses
    WHERE scheduled_date >= ?1 AND scheduled_date <= ?2
    ORDER BY scheduled_date, time_label
    "#,
  )
  .bind(today)
  .bind(horizon)
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch upcoming doses: {}", e))
}
