//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seed helpers for cycles, doses, and calendar connections
//! - Mock data factories
//! - Time helpers

use crate::models::Dose;
use crate::schedule::ScheduleRule;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// Seed Helpers
/// ---------------------------------------------------------------------------

/// Insert a 60-day daily cycle centered on today. Returns the cycle id.
pub async fn seed_test_cycle(pool: &SqlitePool, peptide: &str) -> i64 {
  let start = Utc::now().date_naive() - Duration::days(30);
  let end = Utc::now().date_naive() + Duration::days(30);
  let rule = ScheduleRule::Daily { times_per_day: 1 };

  let result = sqlx::query(
    r#"
    INSERT INTO cycles (
      peptide_name, dose_amount, dose_unit, route,
      start_date, end_date, schedule_json, status
    )
    VALUES (?1, '250', 'mcg', 'subcutaneous', ?2, ?3, ?4, 'active')
    "#,
  )
  .bind(peptide)
  .bind(start)
  .bind(end)
  .bind(rule.to_json())
  .execute(pool)
  .await
  .expect("Failed to insert test cycle");

  result.last_insert_rowid()
}

/// Insert one dose `offset_days` from today (negative for the past).
/// Returns the scheduled date as its ISO string.
pub async fn seed_test_dose(
  pool: &SqlitePool,
  cycle_id: i64,
  offset_days: i64,
  time_label: &str,
  status: &str,
) -> String {
  let scheduled = Utc::now().date_naive() + Duration::days(offset_days);
  let peptide: String = sqlx::query_scalar("SELECT peptide_name FROM cycles WHERE id = ?1")
    .bind(cycle_id)
    .fetch_one(pool)
    .await
    .expect("Cycle for test dose missing");

  sqlx::query(
    r#"
    INSERT INTO doses (
      cycle_id, peptide_name, dose_amount, dose_unit, route,
      scheduled_date, time_label, status
    )
    VALUES (?1, ?2, '250', 'mcg', 'subcutaneous', ?3, ?4, ?5)
    "#,
  )
  .bind(cycle_id)
  .bind(&peptide)
  .bind(scheduled)
  .bind(time_label)
  .bind(status)
  .execute(pool)
  .await
  .expect("Failed to insert test dose");

  scheduled.to_string()
}

/// Insert a Google connection whose token expires `expires_offset` from now.
/// A negative offset seeds an already-expired token.
pub async fn seed_calendar_connection(pool: &SqlitePool, expires_offset: Duration) {
  sqlx::query(
    r#"
    INSERT INTO calendar_connections (
      provider, access_token, refresh_token, token_expires_at,
      account_email, sync_enabled, sync_status
    )
    VALUES ('google', 'test-access-token', 'test-refresh-token', ?1,
            'user@example.com', 1, 'active')
    "#,
  )
  .bind(Utc::now() + expires_offset)
  .execute(pool)
  .await
  .expect("Failed to insert test calendar connection");
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Create a mock dose for pure-function tests
pub fn mock_dose(peptide: &str, offset_days: i64) -> Dose {
  Dose {
    id: 1,
    cycle_id: 1,
    peptide_name: peptide.to_string(),
    dose_amount: "250".to_string(),
    dose_unit: "mcg".to_string(),
    route: "subcutaneous".to_string(),
    scheduled_date: Utc::now().date_naive() + Duration::days(offset_days),
    time_label: "08:00".to_string(),
    status: "scheduled".to_string(),
    notes: None,
    logged_at: None,
    created_at: None,
  }
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

/// Create a DateTime N days from now (negative for the past)
pub fn datetime_days_from_now(days: i64) -> DateTime<Utc> {
  Utc::now() + Duration::days(days)
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[tokio::test]
  #[serial]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('cycles', 'doses', 'calendar_connections', 'lab_results')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert!(tables.len() >= 4, "Expected at least 4 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_seed_cycle_and_dose() {
    let pool = setup_test_db().await;

    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    let date = seed_test_dose(&pool, cycle_id, 2, "08:00", "scheduled").await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doses WHERE cycle_id = ?1")
      .bind(cycle_id)
      .fetch_one(&pool)
      .await
      .unwrap();

    assert_eq!(count, 1);
    assert_eq!(date, (Utc::now().date_naive() + Duration::days(2)).to_string());

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_dose_factory() {
    let dose = mock_dose("TB-500", 3);
    assert_eq!(dose.peptide_name, "TB-500");
    assert_eq!(dose.status, "scheduled");
  }
}
