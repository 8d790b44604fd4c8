use crate::db::AppState;
use crate::models::dose::DoseStatus;
use crate::models::Dose;
use chrono::{NaiveDate, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// List Doses
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_doses_in_range(
  state: State<'_, Arc<AppState>>,
  start: NaiveDate,
  end: NaiveDate,
) -> Result<Vec<Dose>, String> {
  sqlx::query_as::<_, Dose>(
    r#"
    SELECT * FROM doses
    WHERE scheduled_date >= ?1 AND scheduled_date <= ?2
    ORDER BY scheduled_date, time_label
    "#,
  )
  .bind(start)
  .bind(end)
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch doses: {}", e))
}

#[tauri::command]
pub async fn get_cycle_doses(
  state: State<'_, Arc<AppState>>,
  cycle_id: i64,
) -> Result<Vec<Dose>, String> {
  sqlx::query_as::<_, Dose>(
    "SELECT * FROM doses WHERE cycle_id = ?1 ORDER BY scheduled_date, time_label",
  )
  .bind(cycle_id)
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch doses for cycle {}: {}", cycle_id, e))
}

/// ---------------------------------------------------------------------------
/// Dose Status Transitions
/// ---------------------------------------------------------------------------

/// Move a dose between scheduled / logged / missed. Logging stamps
/// `logged_at`; reverting to scheduled clears it so the record reads as
/// never taken.
#[tauri::command]
pub async fn set_dose_status(
  state: State<'_, Arc<AppState>>,
  dose_id: i64,
  status: String,
  notes: Option<String>,
) -> Result<(), String> {
  let parsed = DoseStatus::from_str(&status)?;

  let logged_at = match parsed {
    DoseStatus::Logged => Some(Utc::now()),
    DoseStatus::Scheduled | DoseStatus::Missed => None,
  };

  let result = sqlx::query(
    r#"
    UPDATE doses SET
      status = ?1,
      logged_at = ?2,
      notes = COALESCE(?3, notes)
    WHERE id = ?4
    "#,
  )
  .bind(parsed.to_string())
  .bind(logged_at)
  .bind(notes)
  .bind(dose_id)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to update dose {}: {}", dose_id, e))?;

  if result.rows_affected() == 0 {
    return Err(format!("Dose {} not found", dose_id));
  }

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;
  use serial_test::serial;
  use tauri::Manager;

  #[tokio::test]
  #[serial]
  async fn test_set_dose_status_logged_stamps_timestamp() {
    let pool = setup_test_db().await;
    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    seed_test_dose(&pool, cycle_id, 1, "08:00", "scheduled").await;

    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let dose_id: i64 = sqlx::query_scalar("SELECT id FROM doses LIMIT 1")
      .fetch_one(&pool)
      .await
      .unwrap();

    set_dose_status(app.state(), dose_id, "logged".to_string(), None)
      .await
      .unwrap();

    let (status, logged_at): (String, Option<String>) =
      sqlx::query_as("SELECT status, logged_at FROM doses WHERE id = ?1")
        .bind(dose_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(status, "logged");
    assert!(logged_at.is_some());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_unlogging_clears_timestamp() {
    let pool = setup_test_db().await;
    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    seed_test_dose(&pool, cycle_id, 1, "08:00", "scheduled").await;

    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let dose_id: i64 = sqlx::query_scalar("SELECT id FROM doses LIMIT 1")
      .fetch_one(&pool)
      .await
      .unwrap();

    set_dose_status(app.state(), dose_id, "logged".to_string(), None)
      .await
      .unwrap();
    set_dose_status(app.state(), dose_id, "scheduled".to_string(), None)
      .await
      .unwrap();

    let (status, logged_at): (String, Option<String>) =
      sqlx::query_as("SELECT status, logged_at FROM doses WHERE id = ?1")
        .bind(dose_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(status, "scheduled");
    assert!(logged_at.is_none());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_set_dose_status_unknown_dose() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let result = set_dose_status(app.state(), 9999, "logged".to_string(), None).await;
    assert!(result.is_err());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_doses_in_range_bounds_inclusive() {
    let pool = setup_test_db().await;
    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    for offset in 1..=5 {
      seed_test_dose(&pool, cycle_id, offset, "08:00", "scheduled").await;
    }

    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let start = datetime_days_from_now(1).date_naive();
    let end = datetime_days_from_now(3).date_naive();
    let doses = get_doses_in_range(app.state(), start, end).await.unwrap();

    assert_eq!(doses.len(), 3);

    teardown_test_db(pool).await;
  }
}
