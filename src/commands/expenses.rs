use crate::db::AppState;
use crate::models::expense::{Expense, NewExpense};
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Expense CRUD
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn add_expense(
  state: State<'_, Arc<AppState>>,
  expense: NewExpense,
) -> Result<i64, String> {
  if expense.amount < 0.0 {
    return Err("Amount cannot be negative".to_string());
  }

  let category = expense.category.unwrap_or_else(|| "peptide".to_string());

  let result = sqlx::query(
    r#"
    INSERT INTO expenses (
      label, category, peptide_name, vendor, amount, quantity, purchased_on, notes
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
  )
  .bind(&expense.label)
  .bind(&category)
  .bind(&expense.peptide_name)
  .bind(&expense.vendor)
  .bind(expense.amount)
  .bind(expense.quantity)
  .bind(expense.purchased_on)
  .bind(&expense.notes)
  .execute(&state.db)
  .await
  .map_err(|e| format!("Failed to save expense: {}", e))?;

  Ok(result.last_insert_rowid())
}

#[tauri::command]
pub async fn get_expenses(
  state: State<'_, Arc<AppState>>,
  limit: Option<i64>,
) -> Result<Vec<Expense>, String> {
  let limit = limit.unwrap_or(200);

  sqlx::query_as::<_, Expense>(
    "SELECT * FROM expenses ORDER BY purchased_on DESC, id DESC LIMIT ?1",
  )
  .bind(limit)
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch expenses: {}", e))
}

#[tauri::command]
pub async fn delete_expense(
  state: State<'_, Arc<AppState>>,
  expense_id: i64,
) -> Result<(), String> {
  sqlx::query("DELETE FROM expenses WHERE id = ?1")
    .bind(expense_id)
    .execute(&state.db)
    .await
    .map_err(|e| format!("Failed to delete expense {}: {}", expense_id, e))?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Summaries
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CategorySpend {
  pub category: String,
  pub total: f64,
}

#[tauri::command]
pub async fn get_spending_summary(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<CategorySpend>, String> {
  let rows: Vec<(String, f64)> = sqlx::query_as(
    "SELECT category, SUM(amount) FROM expenses GROUP BY category ORDER BY SUM(amount) DESC",
  )
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to compute spending summary: {}", e))?;

  Ok(
    rows
      .into_iter()
      .map(|(category, total)| CategorySpend { category, total })
      .collect(),
  )
}

#[derive(Debug, Serialize)]
pub struct InventorySummary {
  pub peptide_name: String,
  /// Vials/kits purchased across all expenses for this peptide
  pub purchased_quantity: f64,
  pub total_spent: f64,
  pub doses_logged: i64,
}

/// Per-peptide purchases next to the doses actually taken, so the user can
/// eyeball how much stock remains.
#[tauri::command]
pub async fn get_inventory_summary(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<InventorySummary>, String> {
  let rows: Vec<(String, f64, f64, i64)> = sqlx::query_as(
    r#"
    SELECT
      e.peptide_name,
      COALESCE(SUM(e.quantity), 0.0),
      COALESCE(SUM(e.amount), 0.0),
      (SELECT COUNT(*) FROM doses d
       WHERE d.peptide_name = e.peptide_name AND d.status = 'logged')
    FROM expenses e
    WHERE e.peptide_name IS NOT NULL
    GROUP BY e.peptide_name
    ORDER BY e.peptide_name
    "#,
  )
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to compute inventory summary: {}", e))?;

  Ok(
    rows
      .into_iter()
      .map(
        |(peptide_name, purchased_quantity, total_spent, doses_logged)| InventorySummary {
          peptide_name,
          purchased_quantity,
          total_spent,
          doses_logged,
        },
      )
      .collect(),
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
