use crate::db::AppState;
use crate::llm::ClaudeClient;
use crate::models::labs::{LabResult, NewLabResult};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Manual Entry
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn add_lab_result(
  state: State<'_, Arc<AppState>>,
  result: NewLabResult,
) -> Result<i64, String> {
  let inserted = sqlx::query(
    r#"
    INSERT INTO lab_results (
      marker, value, unit, reference_low, reference_high, flag,
      drawn_on, lab_name, source
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'manual')
    "#,
  )
  .bind(&result.marker)
  .bind(result.value)
  .bind(&result.unit)
  .bind(result.reference_low)
  .bind(result.reference_high)
  .bind(&result.flag)
  .bind(result.drawn_on)
  .bind(&result.lab_name)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to save lab result: {}", e))?;

  Ok(inserted.last_insert_rowid())
}

/// ---------------------------------------------------------------------------
/// LLM Import
/// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LabImportResult {
  pub imported: usize,
  pub drawn_on: NaiveDate,
  pub lab_name: Option<String>,
}

/// Paste raw report text; Claude extracts the markers and each one is stored
/// as an imported row. When the report carries no draw date, today is used.
#[tauri::command]
pub async fn import_lab_report(
  state: State<'_, Arc<AppState>>,
  report_text: String,
) -> Result<LabImportResult, String> {
  if report_text.trim().is_empty() {
    return Err("Report text is empty".to_string());
  }

  let client = ClaudeClient::from_env().map_err(|e| e.to_string())?;
  let (panel, usage) = client
    .extract_lab_panel(&report_text)
    .await
    .map_err(|e| e.to_string())?;

  println!(
    "Lab extraction used {} input / {} output tokens",
    usage.input_tokens, usage.output_tokens
  );

  let drawn_on = panel
    .drawn_on
    .as_deref()
    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    .unwrap_or_else(|| Utc::now().date_naive());

  let mut imported = 0;
  for marker in &panel.markers {
    let result = sqlx::query(
      r#"
      INSERT INTO lab_results (
        marker, value, unit, reference_low, reference_high, flag,
        drawn_on, lab_name, source
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'import')
      "#,
    )
    .bind(&marker.marker)
    .bind(marker.value)
    .bind(&marker.unit)
    .bind(marker.reference_low)
    .bind(marker.reference_high)
    .bind(&marker.flag)
    .bind(drawn_on)
    .bind(&panel.lab_name)
    .execute(&state.db)
    .await;

    match result {
      Ok(_) => imported += 1,
      Err(e) => eprintln!("Warning: failed to store marker {}: {}", marker.marker, e),
    }
  }

  println!(
    "Lab import complete: {} of {} markers stored",
    imported,
    panel.markers.len()
  );

  Ok(LabImportResult {
    imported,
    drawn_on,
    lab_name: panel.lab_name,
  })
}

/// ---------------------------------------------------------------------------
/// Listing
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_lab_results(
  state: State<'_, Arc<AppState>>,
  marker: Option<String>,
) -> Result<Vec<LabResult>, String> {
  match marker {
    Some(name) => sqlx::query_as::<_, LabResult>(
      "SELECT * FROM lab_results WHERE marker = ?1 ORDER BY drawn_on DESC",
    )
    .bind(name)
    .fetch_all(&state.db)
    .await
    .map_err(|e| format!("Failed to fetch lab results: {}", e)),
    None => sqlx::query_as::<_, LabResult>(
      "SELECT * FROM lab_results ORDER BY drawn_on DESC, marker LIMIT 200",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| format!("Failed to fetch lab results: {}", e)),
  }
}

#[tauri::command]
pub async fn delete_lab_result(
  state: State<'_, Arc<AppState>>,
  result_id: i64,
) -> Result<(), String> {
  sqlx::query("DELETE FROM lab_results WHERE id = ?1")
    .bind(result_id)
    .execute(&state.db)
    .await
    .map_err(|e| format!("Failed to delete lab result {}: {}", result_id, e))?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
