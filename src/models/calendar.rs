use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One linked external calendar account per provider.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CalendarConnection {
  pub id: i64,
  pub provider: String,
  pub access_token: Option<String>,
  pub refresh_token: Option<String>,
  pub token_expires_at: Option<DateTime<Utc>>,
  pub account_email: Option<String>,
  pub sync_enabled: bool,
  pub sync_status: String,
  pub last_sync_at: Option<DateTime<Utc>>,
  pub last_error: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// ---------------------------------------------------------------------------
/// Sync Status
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
  /// Connected, no batch run yet
  #[default]
  Active,
  /// A batch is currently in flight
  Syncing,
  /// Last batch completed with no per-item errors
  Success,
  /// Last batch recorded at least one error
  Error,
}

impl std::fmt::Display for SyncStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Active => write!(f, "active"),
      Self::Syncing => write!(f, "syncing"),
      Self::Success => write!(f, "success"),
      Self::Error => write!(f, "error"),
    }
  }
}

impl std::str::FromStr for SyncStatus {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "active" => Ok(Self::Active),
      "syncing" => Ok(Self::Syncing),
      "success" => Ok(Self::Success),
      "error" => Ok(Self::Error),
      _ => Err(format!("Unknown sync status: {}", s)),
    }
  }
}
