use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Expense {
  pub id: i64,
  pub label: String,
  /// 'peptide', 'supplies', 'labs', ...
  pub category: String,
  pub peptide_name: Option<String>,
  pub vendor: Option<String>,
  pub amount: f64,
  /// Vials/kits purchased, when the expense is stock
  pub quantity: Option<f64>,
  pub purchased_on: NaiveDate,
  pub notes: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
  pub label: String,
  pub category: Option<String>,
  pub peptide_name: Option<String>,
  pub vendor: Option<String>,
  pub amount: f64,
  pub quantity: Option<f64>,
  pub purchased_on: NaiveDate,
  pub notes: Option<String>,
}
