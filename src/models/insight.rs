use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored AI-generated narrative over the trailing period.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Insight {
  pub id: i64,
  pub period_days: i64,
  pub summary: String,
  pub observations_json: Option<String>,
  pub suggestions_json: Option<String>,
  pub caution_flags_json: Option<String>,
  pub model_version: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}
