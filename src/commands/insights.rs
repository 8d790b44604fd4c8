use crate::db::AppState;
use crate::insights::build_insight_context;
use crate::llm::{ClaudeClient, InsightReport};
use crate::models::insight::Insight;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Generate Insight
/// ---------------------------------------------------------------------------

/// Build the period context, have the model write the narrative, store it,
/// and hand it back.
#[tauri::command]
pub async fn generate_insight(
  state: State<'_, Arc<AppState>>,
  period_days: Option<i64>,
) -> Result<InsightReport, String> {
  let period_days = period_days.unwrap_or(30).clamp(7, 365);

  let context = build_insight_context(&state.db, period_days).await?;
  let context_json = context.to_json();

  let client = ClaudeClient::from_env().map_err(|e| e.to_string())?;
  let (report, usage) = client
    .generate_insight(&context_json)
    .await
    .map_err(|e| e.to_string())?;

  println!(
    "Insight generation used {} input / {} output tokens",
    usage.input_tokens, usage.output_tokens
  );

  save_insight(&state.db, period_days, &report).await?;

  Ok(report)
}

async fn save_insight(
  db: &crate::db::DbPool,
  period_days: i64,
  report: &InsightReport,
) -> Result<(), String> {
  sqlx::query(
    r#"
    INSERT INTO insights (
      period_days, summary, observations_json, suggestions_json,
      caution_flags_json, model_version
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    "#,
  )
  .bind(period_days)
  .bind(&report.summary)
  .bind(serde_json::to_string(&report.observations).unwrap_or_default())
  .bind(serde_json::to_string(&report.suggestions).unwrap_or_default())
  .bind(serde_json::to_string(&report.caution_flags).unwrap_or_default())
  .bind(ClaudeClient::model_version())
  .execute(db)
  .await
  .map_err(|e| format!("Failed to store insight: {}", e))?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// History
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_insights(
  state: State<'_, Arc<AppState>>,
  limit: Option<i64>,
) -> Result<Vec<Insight>, String> {
  let limit = limit.unwrap_or(20);

  sqlx::query_as::<_, Insight>("SELECT * FROM insights ORDER BY id DESC LIMIT ?1")
    .bind(limit)
    .fetch_all(&state.db)
    .await
    .map_err(|e| format!("Failed to fetch insights: {}", e))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
