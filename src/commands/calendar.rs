use crate::db::AppState;
use crate::gcal::{
  build_dose_event, wait_for_callback, CalendarClient, CalendarError, CalendarTokens, GoogleConfig,
};
use crate::models::calendar::SyncStatus;
use crate::models::{CalendarConnection, Dose};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

const PROVIDER: &str = "google";

/// ---------------------------------------------------------------------------
/// Start OAuth Flow
/// ---------------------------------------------------------------------------

/// Initiates Google OAuth by returning the authorization URL.
/// Frontend should open this URL in the default browser.
#[tauri::command]
pub async fn calendar_start_auth() -> Result<String, CalendarError> {
  let config = GoogleConfig::from_env()?;
  let client = CalendarClient::new(config);
  client.build_auth_url()
}

/// ---------------------------------------------------------------------------
/// Wait for Callback and Exchange Code
/// ---------------------------------------------------------------------------

/// Waits for the OAuth callback, exchanges the code for tokens, and stores
/// the connection. This should be called immediately after
/// calendar_start_auth.
#[tauri::command]
pub async fn calendar_complete_auth(state: State<'_, Arc<AppState>>) -> Result<(), CalendarError> {
  let config = GoogleConfig::from_env()?;
  let client = CalendarClient::new(config);

  // Wait for callback (blocking - runs in Tauri's async runtime)
  let callback = tokio::task::spawn_blocking(|| wait_for_callback(120))
    .await
    .map_err(|e| CalendarError::Server(e.to_string()))??;

  // Exchange authorization code for tokens
  let tokens = client.exchange_code(&callback.code).await?;

  // Linked account label, best effort
  let email = client.fetch_account_email(&tokens.access_token).await;

  save_connection(&state.db, &tokens, email.as_deref()).await?;

  println!("Google Calendar OAuth completed successfully");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Connection Status
/// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CalendarStatus {
  pub connected: bool,
  pub account_email: Option<String>,
  pub sync_enabled: bool,
  pub sync_status: Option<String>,
  pub last_sync_at: Option<String>,
  pub last_error: Option<String>,
  pub needs_refresh: bool,
}

#[tauri::command]
pub async fn calendar_get_status(
  state: State<'_, Arc<AppState>>,
) -> Result<CalendarStatus, CalendarError> {
  match load_connection(&state.db).await? {
    Some(connection) => {
      let needs_refresh = connection_tokens(&connection)
        .map(|t| t.needs_refresh())
        .unwrap_or(false);

      Ok(CalendarStatus {
        connected: true,
        account_email: connection.account_email,
        sync_enabled: connection.sync_enabled,
        sync_status: Some(connection.sync_status),
        last_sync_at: connection.last_sync_at.map(|t| t.to_rfc3339()),
        last_error: connection.last_error,
        needs_refresh,
      })
    }
    None => Ok(CalendarStatus {
      connected: false,
      account_email: None,
      sync_enabled: false,
      sync_status: None,
      last_sync_at: None,
      last_error: None,
      needs_refresh: false,
    }),
  }
}

/// ---------------------------------------------------------------------------
/// Toggle Sync
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn calendar_set_sync_enabled(
  state: State<'_, Arc<AppState>>,
  enabled: bool,
) -> Result<(), CalendarError> {
  sqlx::query("UPDATE calendar_connections SET sync_enabled = ?1 WHERE provider = ?2")
    .bind(enabled)
    .bind(PROVIDER)
    .execute(&state.db)
    .await
    .map_err(|e| CalendarError::Database(e.to_string()))?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Disconnect
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn calendar_disconnect(state: State<'_, Arc<AppState>>) -> Result<(), CalendarError> {
  sqlx::query("DELETE FROM calendar_connections WHERE provider = ?1")
    .bind(PROVIDER)
    .execute(&state.db)
    .await
    .map_err(|e| CalendarError::Database(e.to_string()))?;

  println!("Google Calendar disconnected");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Sync Now
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SyncSummary {
  pub message: String,
  pub event_count: usize,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub errors: Vec<String>,
}

/// Push every upcoming scheduled dose to the linked calendar as an all-day
/// event.
#[tauri::command]
pub async fn calendar_sync_now(
  state: State<'_, Arc<AppState>>,
) -> Result<SyncSummary, CalendarError> {
  let config = GoogleConfig::from_env()?;
  let client = CalendarClient::new(config);
  run_sync(&state.db, &client).await
}

/// One reconciliation batch: resolve a valid token, create one event per
/// pending dose (each item isolated), then record the batch outcome on the
/// connection row. Doses already in the past are skipped - a calendar entry
/// for an elapsed dose has no value.
pub async fn run_sync(
  db: &crate::db::DbPool,
  client: &CalendarClient,
) -> Result<SyncSummary, CalendarError> {
  let connection = load_connection(db).await?.ok_or(CalendarError::NotConnected)?;

  // Visibility marker for the frontend, not a lock. Concurrent batches
  // race last-write-wins on the final status.
  if let Err(e) = set_sync_status(db, SyncStatus::Syncing, None).await {
    eprintln!("Warning: failed to mark sync in flight: {}", e);
  }

  let access_token = match ensure_valid_token(db, client, &connection).await {
    Ok(token) => token,
    Err(e) => {
      // Abort before any event calls; a stale token would fail every one.
      if let Err(write_err) = set_sync_status(db, SyncStatus::Error, Some(&e.to_string())).await {
        eprintln!("Warning: failed to record sync error: {}", write_err);
      }
      return Err(e);
    }
  };

  let today = Utc::now().date_naive();
  let pending: Vec<Dose> = sqlx::query_as(
    r#"
    SELECT * FROM doses
    WHERE status = 'scheduled' AND scheduled_date >= ?1
    ORDER BY scheduled_date, time_label
    "#,
  )
  .bind(today)
  .fetch_all(db)
  .await
  .map_err(|e| CalendarError::Database(e.to_string()))?;

  let mut created = 0usize;
  let mut errors: Vec<String> = Vec::new();

  for dose in &pending {
    let event = build_dose_event(dose);
    match client.create_event(&access_token, &event).await {
      Ok(()) => created += 1,
      Err(message) => {
        // One rejected event must not block the rest of the batch
        errors.push(format!(
          "{} on {}: {}",
          dose.peptide_name, dose.scheduled_date, message
        ));
      }
    }
  }

  let final_status = if errors.is_empty() {
    SyncStatus::Success
  } else {
    SyncStatus::Error
  };

  if let Err(e) = finalize_sync(db, final_status, errors.first().map(String::as_str)).await {
    eprintln!("Warning: failed to record sync outcome: {}", e);
  }

  println!(
    "Calendar sync complete: {} events created, {} errors",
    created,
    errors.len()
  );

  Ok(SyncSummary {
    message: format!("Synced {} upcoming doses to Google Calendar", created),
    event_count: created,
    errors,
  })
}

/// ---------------------------------------------------------------------------
/// Get Valid Access Token (with auto-refresh)
/// ---------------------------------------------------------------------------

/// Return a usable access token, refreshing when stale. New tokens are
/// persisted before they are returned; the connection row is the single
/// source of truth.
async fn ensure_valid_token(
  db: &crate::db::DbPool,
  client: &CalendarClient,
  connection: &CalendarConnection,
) -> Result<String, CalendarError> {
  let tokens = connection_tokens(connection).ok_or(CalendarError::NotConnected)?;

  if !tokens.needs_refresh() {
    return Ok(tokens.access_token);
  }

  let refreshed = client.refresh_tokens(&tokens.refresh_token).await?;
  save_tokens(db, &refreshed).await?;
  println!("Calendar tokens auto-refreshed");

  Ok(refreshed.access_token)
}

fn connection_tokens(connection: &CalendarConnection) -> Option<CalendarTokens> {
  match (
    &connection.access_token,
    &connection.refresh_token,
    connection.token_expires_at,
  ) {
    (Some(access), Some(refresh), Some(expires)) => Some(CalendarTokens {
      access_token: access.clone(),
      refresh_token: refresh.clone(),
      expires_at: expires,
    }),
    _ => None,
  }
}

/// ---------------------------------------------------------------------------
/// Database Helpers
/// ---------------------------------------------------------------------------

async fn load_connection(
  db: &crate::db::DbPool,
) -> Result<Option<CalendarConnection>, CalendarError> {
  sqlx::query_as("SELECT * FROM calendar_connections WHERE provider = ?1")
    .bind(PROVIDER)
    .fetch_optional(db)
    .await
    .map_err(|e| CalendarError::Database(e.to_string()))
}

async fn save_connection(
  db: &crate::db::DbPool,
  tokens: &CalendarTokens,
  account_email: Option<&str>,
) -> Result<(), CalendarError> {
  sqlx::query(
    r#"
    INSERT INTO calendar_connections
      (provider, access_token, refresh_token, token_expires_at, account_email,
       sync_enabled, sync_status)
    VALUES (?1, ?2, ?3, ?4, ?5, 1, 'active')
    ON CONFLICT(provider) DO UPDATE SET
      access_token = excluded.access_token,
      refresh_token = excluded.refresh_token,
      token_expires_at = excluded.token_expires_at,
      account_email = excluded.account_email,
      sync_status = 'active',
      last_error = NULL
    "#,
  )
  .bind(PROVIDER)
  .bind(&tokens.access_token)
  .bind(&tokens.refresh_token)
  .bind(tokens.expires_at)
  .bind(account_email)
  .execute(db)
  .await
  .map_err(|e| CalendarError::Database(e.to_string()))?;

  Ok(())
}

async fn save_tokens(
  db: &crate::db::DbPool,
  tokens: &CalendarTokens,
) -> Result<(), CalendarError> {
  sqlx::query(
    r#"
    UPDATE calendar_connections SET
      access_token = ?1,
      refresh_token = ?2,
      token_expires_at = ?3
    WHERE provider = ?4
    "#,
  )
  .bind(&tokens.access_token)
  .bind(&tokens.refresh_token)
  .bind(tokens.expires_at)
  .bind(PROVIDER)
  .execute(db)
  .await
  .map_err(|e| CalendarError::Database(e.to_string()))?;

  Ok(())
}

async fn set_sync_status(
  db: &crate::db::DbPool,
  status: SyncStatus,
  last_error: Option<&str>,
) -> Result<(), CalendarError> {
  sqlx::query(
    "UPDATE calendar_connections SET sync_status = ?1, last_error = ?2 WHERE provider = ?3",
  )
  .bind(status.to_string())
  .bind(last_error)
  .bind(PROVIDER)
  .execute(db)
  .await
  .map_err(|e| CalendarError::Database(e.to_string()))?;

  Ok(())
}

/// Batch outcome: status reflects the error list, last_sync_at is stamped
/// regardless.
async fn finalize_sync(
  db: &crate::db::DbPool,
  status: SyncStatus,
  last_error: Option<&str>,
) -> Result<(), CalendarError> {
  sqlx::query(
    r#"
    UPDATE calendar_connections SET
      sync_status = ?1,
      last_error = ?2,
      last_sync_at = ?3
    WHERE provider = ?4
    "#,
  )
  .bind(status.to_string())
  .bind(last_error)
  .bind(Utc::now())
  .bind(PROVIDER)
  .execute(db)
  .await
  .map_err(|e| CalendarError::Database(e.to_string()))?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;
  use chrono::Duration;
  use mockito::Matcher;
  use serial_test::serial;
  use tauri::Manager;

  fn test_client(base: &str) -> CalendarClient {
    let config = GoogleConfig {
      client_id: "client-id".to_string(),
      client_secret: "client-secret".to_string(),
      redirect_uri: "http://localhost:8767/callback".to_string(),
    };
    CalendarClient::with_base_url(config, base)
  }

  async fn sync_status_row(pool: &sqlx::SqlitePool) -> (String, Option<String>, Option<String>) {
    sqlx::query_as(
      "SELECT sync_status, last_error, last_sync_at FROM calendar_connections WHERE provider = 'google'",
    )
    .fetch_one(pool)
    .await
    .expect("connection row missing")
  }

  #[tokio::test]
  #[serial]
  async fn test_sync_without_connection_short_circuits() {
    let pool = setup_test_db().await;
    let mut server = mockito::Server::new_async().await;
    let events_mock = server
      .mock("POST", "/calendars/primary/events")
      .expect(0)
      .create_async()
      .await;

    let result = run_sync(&pool, &test_client(&server.url())).await;

    assert!(matches!(result, Err(CalendarError::NotConnected)));
    events_mock.assert_async().await;

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_sync_zero_pending_is_success() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(1)).await;

    let mut server = mockito::Server::new_async().await;
    let events_mock = server
      .mock("POST", "/calendars/primary/events")
      .expect(0)
      .create_async()
      .await;

    let summary = run_sync(&pool, &test_client(&server.url()))
      .await
      .expect("sync should succeed");

    assert_eq!(summary.event_count, 0);
    assert!(summary.errors.is_empty());
    events_mock.assert_async().await;

    let (status, last_error, last_sync) = sync_status_row(&pool).await;
    assert_eq!(status, "success");
    assert!(last_error.is_none());
    assert!(last_sync.is_some());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_sync_all_success() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(1)).await;

    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    for offset in 1..=3 {
      seed_test_dose(&pool, cycle_id, offset, "08:00", "scheduled").await;
    }

    let mut server = mockito::Server::new_async().await;
    let events_mock = server
      .mock("POST", "/calendars/primary/events")
      .with_status(200)
      .with_body("{}")
      .expect(3)
      .create_async()
      .await;

    let summary = run_sync(&pool, &test_client(&server.url()))
      .await
      .expect("sync should succeed");

    assert_eq!(summary.event_count, 3);
    assert!(summary.errors.is_empty());
    events_mock.assert_async().await;

    let (status, last_error, last_sync) = sync_status_row(&pool).await;
    assert_eq!(status, "success");
    assert!(last_error.is_none());
    assert!(last_sync.is_some());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_sync_isolates_individual_failures() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(1)).await;

    let cycle_id = seed_test_cycle(&pool, "TB-500").await;
    let mut dates = Vec::new();
    for offset in 1..=5 {
      dates.push(seed_test_dose(&pool, cycle_id, offset, "08:00", "scheduled").await);
    }

    let mut server = mockito::Server::new_async().await;

    // One mock per dose, matched on its date, so items 2 and 4 are rejected
    // and the rest succeed
    let mut ok_mocks = Vec::new();
    let mut fail_mocks = Vec::new();
    for (i, dose_date) in dates.iter().enumerate() {
      let matcher =
        Matcher::PartialJsonString(format!(r#"{{"start":{{"date":"{}"}}}}"#, dose_date));
      let mock = server.mock("POST", "/calendars/primary/events").match_body(matcher);

      if i == 1 || i == 3 {
        fail_mocks.push(
          mock
            .with_status(500)
            .with_body(r#"{"error":{"message":"backend unavailable"}}"#)
            .expect(1)
            .create_async()
            .await,
        );
      } else {
        ok_mocks.push(mock.with_status(200).with_body("{}").expect(1).create_async().await);
      }
    }

    let summary = run_sync(&pool, &test_client(&server.url()))
      .await
      .expect("batch should complete despite item failures");

    assert_eq!(summary.event_count, 3);
    assert_eq!(summary.errors.len(), 2);
    for error in &summary.errors {
      assert!(error.contains("TB-500"), "error should name the peptide: {}", error);
      assert!(
        error.contains("backend unavailable"),
        "error should carry the provider message: {}",
        error
      );
    }

    for mock in ok_mocks.into_iter().chain(fail_mocks) {
      mock.assert_async().await;
    }

    let (status, last_error, last_sync) = sync_status_row(&pool).await;
    assert_eq!(status, "error");
    assert!(last_error.is_some());
    assert!(last_sync.is_some());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_expired_token_failed_refresh_aborts_batch() {
    let pool = setup_test_db().await;
    // Token already expired
    seed_calendar_connection(&pool, Duration::hours(-1)).await;

    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    seed_test_dose(&pool, cycle_id, 1, "08:00", "scheduled").await;

    let mut server = mockito::Server::new_async().await;
    let token_mock = server
      .mock("POST", "/token")
      .with_status(400)
      .with_body(r#"{"error":"invalid_grant"}"#)
      .expect(1)
      .create_async()
      .await;
    let events_mock = server
      .mock("POST", "/calendars/primary/events")
      .expect(0)
      .create_async()
      .await;

    let result = run_sync(&pool, &test_client(&server.url())).await;

    assert!(matches!(result, Err(CalendarError::OAuth(_))));
    token_mock.assert_async().await;
    // Zero event-creation calls after an aborted refresh
    events_mock.assert_async().await;

    let (status, last_error, _) = sync_status_row(&pool).await;
    assert_eq!(status, "error");
    assert!(last_error.unwrap().contains("refresh failed"));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_refresh_persists_new_token_before_batch() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(-1)).await;

    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    seed_test_dose(&pool, cycle_id, 1, "08:00", "scheduled").await;

    let mut server = mockito::Server::new_async().await;
    let _token_mock = server
      .mock("POST", "/token")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"access_token":"fresh-at","expires_in":3600}"#)
      .create_async()
      .await;
    let _events_mock = server
      .mock("POST", "/calendars/primary/events")
      .match_header("authorization", "Bearer fresh-at")
      .with_status(200)
      .with_body("{}")
      .expect(1)
      .create_async()
      .await;

    let summary = run_sync(&pool, &test_client(&server.url()))
      .await
      .expect("sync should succeed after refresh");
    assert_eq!(summary.event_count, 1);

    let (access, refresh): (String, String) = sqlx::query_as(
      "SELECT access_token, refresh_token FROM calendar_connections WHERE provider = 'google'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(access, "fresh-at");
    // Provider omitted refresh_token on refresh; the stored one survives
    assert_eq!(refresh, "test-refresh-token");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_past_doses_are_skipped() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(1)).await;

    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    seed_test_dose(&pool, cycle_id, -3, "08:00", "scheduled").await;
    seed_test_dose(&pool, cycle_id, 2, "08:00", "scheduled").await;

    let mut server = mockito::Server::new_async().await;
    let events_mock = server
      .mock("POST", "/calendars/primary/events")
      .with_status(200)
      .with_body("{}")
      .expect(1)
      .create_async()
      .await;

    let summary = run_sync(&pool, &test_client(&server.url())).await.unwrap();

    assert_eq!(summary.event_count, 1);
    events_mock.assert_async().await;

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_logged_doses_are_not_resynced() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(1)).await;

    let cycle_id = seed_test_cycle(&pool, "BPC-157").await;
    seed_test_dose(&pool, cycle_id, 1, "08:00", "logged").await;
    seed_test_dose(&pool, cycle_id, 2, "08:00", "scheduled").await;

    let mut server = mockito::Server::new_async().await;
    let events_mock = server
      .mock("POST", "/calendars/primary/events")
      .with_status(200)
      .with_body("{}")
      .expect(1)
      .create_async()
      .await;

    let summary = run_sync(&pool, &test_client(&server.url())).await.unwrap();

    assert_eq!(summary.event_count, 1);
    events_mock.assert_async().await;

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_calendar_get_status_without_connection() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let status = calendar_get_status(app.state()).await.unwrap();
    assert!(!status.connected);
    assert!(status.sync_status.is_none());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_calendar_disconnect_removes_connection() {
    let pool = setup_test_db().await;
    seed_calendar_connection(&pool, Duration::hours(1)).await;

    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    calendar_disconnect(app.state()).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calendar_connections")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(count, 0);

    teardown_test_db(pool).await;
  }
}
