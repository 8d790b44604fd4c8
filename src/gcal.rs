//! Google Calendar integration
//!
//! OAuth2 (authorization code + refresh token grants) and all-day event
//! creation against the user's primary calendar. Dose pushes are handled
//! per event so one rejected item never blocks the rest of a batch.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration as StdDuration;
use url::Url;

use crate::models::Dose;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const CALENDAR_SCOPE: &str =
  "https://www.googleapis.com/auth/calendar.events https://www.googleapis.com/auth/userinfo.email";
const REDIRECT_PORT: u16 = 8767;
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Basil, Google's green. Marks dose events as health-related.
const DOSE_EVENT_COLOR_ID: &str = "10";

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GoogleConfig {
  pub client_id: String,
  pub client_secret: String,
  pub redirect_uri: String,
}

impl GoogleConfig {
  pub fn from_env() -> Result<Self, CalendarError> {
    Ok(Self {
      client_id: env::var("GOOGLE_CLIENT_ID")
        .map_err(|_| CalendarError::MissingConfig("GOOGLE_CLIENT_ID".into()))?,
      client_secret: env::var("GOOGLE_CLIENT_SECRET")
        .map_err(|_| CalendarError::MissingConfig("GOOGLE_CLIENT_SECRET".into()))?,
      redirect_uri: format!("http://localhost:{}/callback", REDIRECT_PORT),
    })
  }
}

/// Response from the Google token endpoint. `refresh_token` is only present
/// on the initial code exchange (and sometimes not even then, hence
/// `prompt=consent` on the auth URL).
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub expires_in: i64, // seconds
  pub refresh_token: Option<String>,
  pub token_type: Option<String>,
  pub scope: Option<String>,
}

/// Stored token state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl CalendarTokens {
  /// Build stored tokens from a token-endpoint response. Google omits the
  /// refresh token on refresh grants; the previously stored one is kept.
  pub fn from_response(resp: TokenResponse, previous_refresh: Option<&str>) -> Result<Self, CalendarError> {
    let refresh_token = resp
      .refresh_token
      .or_else(|| previous_refresh.map(String::from))
      .ok_or_else(|| CalendarError::OAuth("Provider issued no refresh token".into()))?;

    Ok(Self {
      access_token: resp.access_token,
      refresh_token,
      expires_at: Utc::now() + Duration::seconds(resp.expires_in),
    })
  }

  pub fn needs_refresh(&self) -> bool {
    let buffer = Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
    Utc::now() + buffer >= self.expires_at
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Callback server error: {0}")]
  Server(String),

  #[error("Database error: {0}")]
  Database(String),

  #[error("No calendar connection")]
  NotConnected,
}

impl Serialize for CalendarError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// Error body Google returns on non-2xx event calls: {"error":{"message":..}}
#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
  error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Event Payload
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDate {
  pub date: String, // YYYY-MM-DD
}

/// All-day event object for the provider's events collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
  pub summary: String,
  pub description: String,
  pub start: EventDate,
  pub end: EventDate,
  #[serde(rename = "colorId")]
  pub color_id: String,
}

/// Build the all-day event for one dose. Start and end are both the
/// scheduled date.
pub fn build_dose_event(dose: &Dose) -> EventPayload {
  let date = dose.scheduled_date.to_string();

  EventPayload {
    summary: format!(
      "Dose: {} {}{}",
      dose.peptide_name, dose.dose_amount, dose.dose_unit
    ),
    description: format!(
      "{} {}{} ({})\nScheduled for {}\n\nAdded by Peptide Log",
      dose.peptide_name, dose.dose_amount, dose.dose_unit, dose.route, dose.time_label
    ),
    start: EventDate { date: date.clone() },
    end: EventDate { date },
    color_id: DOSE_EVENT_COLOR_ID.to_string(),
  }
}

/// ---------------------------------------------------------------------------
/// Calendar Client
/// ---------------------------------------------------------------------------

pub struct CalendarClient {
  client: Client,
  config: GoogleConfig,
  token_url: String,
  api_base: String,
  userinfo_url: String,
}

impl CalendarClient {
  pub fn new(config: GoogleConfig) -> Self {
    Self {
      client: Client::new(),
      config,
      token_url: GOOGLE_TOKEN_URL.to_string(),
      api_base: GOOGLE_API_BASE.to_string(),
      userinfo_url: GOOGLE_USERINFO_URL.to_string(),
    }
  }

  /// Point every endpoint at one base URL. Used by tests to talk to a local
  /// mock server instead of Google.
  pub fn with_base_url(config: GoogleConfig, base: &str) -> Self {
    Self {
      client: Client::new(),
      config,
      token_url: format!("{}/token", base),
      api_base: base.to_string(),
      userinfo_url: format!("{}/userinfo", base),
    }
  }

  /// -------------------------------------------------------------------------
  /// OAuth URL Generation
  /// -------------------------------------------------------------------------

  /// `access_type=offline` + `prompt=consent` so a refresh token is issued.
  pub fn build_auth_url(&self) -> Result<String, CalendarError> {
    let mut url = Url::parse(GOOGLE_AUTH_URL).map_err(|e| CalendarError::OAuth(e.to_string()))?;

    url
      .query_pairs_mut()
      .append_pair("client_id", &self.config.client_id)
      .append_pair("redirect_uri", &self.config.redirect_uri)
      .append_pair("response_type", "code")
      .append_pair("scope", CALENDAR_SCOPE)
      .append_pair("access_type", "offline")
      .append_pair("prompt", "consent");

    Ok(url.to_string())
  }

  /// -------------------------------------------------------------------------
  /// Token Exchange (Authorization Code -> Tokens)
  /// -------------------------------------------------------------------------

  pub async fn exchange_code(&self, code: &str) -> Result<CalendarTokens, CalendarError> {
    let response = self
      .client
      .post(&self.token_url)
      .form(&[
        ("client_id", self.config.client_id.as_str()),
        ("client_secret", self.config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", self.config.redirect_uri.as_str()),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      let error_text = response.text().await.unwrap_or_default();
      return Err(CalendarError::OAuth(format!(
        "Token exchange failed: {}",
        error_text
      )));
    }

    let token_response: TokenResponse = response.json().await?;
    CalendarTokens::from_response(token_response, None)
  }

  /// -------------------------------------------------------------------------
  /// Token Refresh
  /// -------------------------------------------------------------------------

  pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<CalendarTokens, CalendarError> {
    let response = self
      .client
      .post(&self.token_url)
      .form(&[
        ("client_id", self.config.client_id.as_str()),
        ("client_secret", self.config.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      let error_text = response.text().await.unwrap_or_default();
      return Err(CalendarError::OAuth(format!(
        "Token refresh failed: {}",
        error_text
      )));
    }

    let token_response: TokenResponse = response.json().await?;
    CalendarTokens::from_response(token_response, Some(refresh_token))
  }

  /// -------------------------------------------------------------------------
  /// Linked Account Email
  /// -------------------------------------------------------------------------

  /// Best effort; connection works without it.
  pub async fn fetch_account_email(&self, access_token: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct UserInfo {
      email: Option<String>,
    }

    let response = self
      .client
      .get(&self.userinfo_url)
      .bearer_auth(access_token)
      .send()
      .await
      .ok()?;

    if !response.status().is_success() {
      return None;
    }

    response.json::<UserInfo>().await.ok()?.email
  }

  /// -------------------------------------------------------------------------
  /// Event Creation
  /// -------------------------------------------------------------------------

  /// Create one all-day event on the primary calendar. Failures come back as
  /// a plain message string so the caller can record them per item; a
  /// transport error is reported the same way as a provider rejection.
  pub async fn create_event(&self, access_token: &str, event: &EventPayload) -> Result<(), String> {
    let url = format!("{}/calendars/primary/events", self.api_base);

    let response = self
      .client
      .post(&url)
      .bearer_auth(access_token)
      .json(event)
      .send()
      .await
      .map_err(|e| format!("Request failed: {}", e))?;

    if response.status().is_success() {
      return Ok(());
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ProviderErrorResponse>(&body) {
      Ok(parsed) => Err(parsed.error.message),
      Err(_) => Err(format!("Event creation failed (HTTP {})", status)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// OAuth Callback Server
/// ---------------------------------------------------------------------------

pub struct CallbackResult {
  pub code: String,
}

/// Start a temporary HTTP server, wait for the provider redirect, extract
/// the auth code
pub fn wait_for_callback(timeout_seconds: u64) -> Result<CallbackResult, CalendarError> {
  let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
    .map_err(|e| CalendarError::Server(format!("Failed to bind port {}: {}", REDIRECT_PORT, e)))?;

  listener
    .set_nonblocking(true)
    .map_err(|e| CalendarError::Server(e.to_string()))?;

  let start = std::time::Instant::now();
  let timeout = StdDuration::from_secs(timeout_seconds);

  loop {
    if start.elapsed() > timeout {
      return Err(CalendarError::Server(
        "Callback timeout - no response received".into(),
      ));
    }

    match listener.accept() {
      Ok((mut stream, _)) => {
        let mut buffer = [0; 2048];
        stream.read(&mut buffer).ok();

        let request = String::from_utf8_lossy(&buffer);

        if let Some(code) = extract_code_from_request(&request) {
          let response = build_success_response();
          stream.write_all(response.as_bytes()).ok();
          stream.flush().ok();

          return Ok(CallbackResult { code });
        } else if request.contains("error=") {
          let error =
            extract_error_from_request(&request).unwrap_or_else(|| "Unknown error".to_string());

          let response = build_error_response(&error);
          stream.write_all(response.as_bytes()).ok();
          stream.flush().ok();

          return Err(CalendarError::OAuth(error));
        }
      }
      Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
        std::thread::sleep(StdDuration::from_millis(100));
        continue;
      }
      Err(e) => {
        return Err(CalendarError::Server(e.to_string()));
      }
    }
  }
}

fn extract_code_from_request(request: &str) -> Option<String> {
  let first_line = request.lines().next()?;

  if !first_line.contains("/callback?") {
    return None;
  }

  let url_part = first_line.split_whitespace().nth(1)?;

  for param in url_part.split('?').nth(1)?.split('&') {
    let mut kv = param.split('=');
    if kv.next() == Some("code") {
      return kv.next().map(String::from);
    }
  }
  None
}

fn extract_error_from_request(request: &str) -> Option<String> {
  let first_line = request.lines().next()?;
  let url_part = first_line.split_whitespace().nth(1)?;

  for param in url_part.split('?').nth(1)?.split('&') {
    let mut kv = param.split('=');
    if kv.next() == Some("error") {
      return kv.next().map(|s| s.replace("%20", " "));
    }
  }
  None
}

fn build_success_response() -> String {
  let body = r#"<!DOCTYPE html>
<html>
<head><title>Peptide Log - Connected!</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
  <h1>Google Calendar Connected!</h1>
  <p>You can close this window and return to Peptide Log.</p>
</body>
</html>"#;
  format!(
    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
    body.len(),
    body
  )
}

fn build_error_response(error: &str) -> String {
  let body = format!(
    r#"<!DOCTYPE html>
<html>
<head><title>Peptide Log - Error</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
  <h1>Connection Failed</h1>
  <p>Error: {}</p>
  <p>Please try again.</p>
</body>
</html>"#,
    error
  );
  format!(
    "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
    body.len(),
    body
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
