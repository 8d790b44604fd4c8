//! LLM integration for lab-report extraction and narrative insights
//!
//! This module handles communication with the Claude API for pulling
//! structured markers out of pasted lab reports and for generating the
//! periodic insight narrative over the user's history.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  #[allow(dead_code)]
  model: String,
  #[allow(dead_code)]
  stop_reason: Option<String>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Lab Extraction Response (from Claude)
/// ---------------------------------------------------------------------------

/// One draw's worth of markers extracted from pasted report text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLabPanel {
  /// ISO date of the draw when the report states one
  pub drawn_on: Option<String>,
  pub lab_name: Option<String>,
  pub markers: Vec<ExtractedMarker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMarker {
  pub marker: String,
  pub value: f64,
  pub unit: Option<String>,
  pub reference_low: Option<f64>,
  pub reference_high: Option<f64>,
  /// "high", "low", or null when inside the reference interval
  pub flag: Option<String>,
}

/// ---------------------------------------------------------------------------
/// Insight Response (from Claude)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
  /// Narrative over the period (2-4 sentences)
  pub summary: String,

  /// Concrete observations tied to the numbers provided
  pub observations: Vec<String>,

  /// What to consider adjusting next
  pub suggestions: Vec<String>,

  /// Anything that warrants talking to a clinician
  pub caution_flags: Vec<String>,
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: String,
}

impl ClaudeClient {
  /// Create a new Claude client, loading API key from environment
  pub fn from_env() -> Result<Self, LlmError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;

    Ok(Self {
      client: Client::new(),
      api_key,
    })
  }

  pub fn model_version() -> &'static str {
    CLAUDE_MODEL
  }

  /// Call Claude with a system prompt and user message
  pub async fn complete(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: CLAUDE_MODEL.to_string(),
      max_tokens,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(CLAUDE_API_URL)
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      // Try to parse error response
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    // Extract text from the first text content block
    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    Ok((text, claude_response.usage))
  }

  /// Extract a marker panel from pasted lab-report text.
  pub async fn extract_lab_panel(
    &self,
    report_text: &str,
  ) -> Result<(ExtractedLabPanel, Usage), LlmError> {
    let system_prompt = include_str!("prompts/lab_extraction.txt");

    let user_message = format!(
      r#"Extract every blood marker from this lab report.

REPORT TEXT:
{}

Respond with valid JSON matching the OUTPUT FORMAT specified in your instructions."#,
      report_text
    );

    let (response_text, usage) = self.complete(system_prompt, &user_message, 2048).await?;

    let json_str = extract_json(&response_text)?;

    let panel: ExtractedLabPanel = serde_json::from_str(&json_str)
      .map_err(|e| LlmError::Parse(format!("{}: {}", e, json_str)))?;

    Ok((panel, usage))
  }

  /// Generate the periodic narrative over the user's tracked history.
  pub async fn generate_insight(
    &self,
    context_json: &str,
  ) -> Result<(InsightReport, Usage), LlmError> {
    let system_prompt = include_str!("prompts/insight_system.txt");

    let user_message = format!(
      r#"Review this tracking period and write the insight report.

TRACKING CONTEXT:
{}

Respond with valid JSON matching the OUTPUT FORMAT specified in your instructions."#,
      context_json
    );

    let (response_text, usage) = self.complete(system_prompt, &user_message, 1500).await?;

    let json_str = extract_json(&response_text)?;

    let report: InsightReport = serde_json::from_str(&json_str)
      .map_err(|e| LlmError::Parse(format!("{}: {}", e, json_str)))?;

    Ok((report, usage))
  }
}

/// Extract JSON from Claude's response (handles markdown code blocks)
fn extract_json(text: &str) -> Result<String, LlmError> {
  // Try direct parse first
  if text.trim().starts_with('{') {
    return Ok(text.trim().to_string());
  }

  // Look for JSON in code blocks
  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      return Ok(text[start..start + end].trim().to_string());
    }
  }

  // Look for plain code blocks
  if let Some(start) = text.find("```") {
    let start = start + 3;
    // Skip language identifier if present
    let content_start = text[start..]
      .find('\n')
      .map(|i| start + i + 1)
      .unwrap_or(start);
    if let Some(end) = text[content_start..].find("```") {
      return Ok(text[content_start..content_start + end].trim().to_string());
    }
  }

  // Last resort: find first { to last }
  if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
    return Ok(text[start..=end].to_string());
  }

  Err(LlmError::Parse("Could not extract JSON from response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
