//! Minimal OpenAI client used as the grading service.
//!
//! We only call chat.completions with a system + user message and ask for plain text.
//! Calls are instrumented and log model names, latencies and response sizes (not contents).
//!
//! NOTE: We never log the API key, prompts or completions (they carry student answers).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::grading::{Grader, GradingError, GradingRequest};
use crate::util::trunc_for_log;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TIMEOUT_SECS: u64 = 20;
/// Error bodies longer than this are cut before they reach errors and logs.
const ERROR_BODY_MAX: usize = 300;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OPENAI_GRADING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    Self::new(api_key, base_url, model).ok()
  }

  pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, GradingError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(TIMEOUT_SECS))
      .build()
      .map_err(|e| GradingError::Transport(e.to_string()))?;
    let base_url = base_url.trim_end_matches('/').to_string();
    Ok(Self { client, api_key, base_url, model })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<String, GradingError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      max_tokens: Some(max_tokens),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "learn-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| GradingError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(GradingError::Http { status, message: trunc_for_log(&message, ERROR_BODY_MAX) });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GradingError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "OpenAI completion received");

    if text.is_empty() {
      return Err(GradingError::Empty);
    }
    Ok(text)
  }
}

#[async_trait]
impl Grader for OpenAI {
  async fn complete(&self, request: &GradingRequest) -> Result<String, GradingError> {
    self.chat_plain(&request.system, &request.prompt, request.temperature, request.max_tokens).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn request() -> GradingRequest {
    GradingRequest {
      system: "Eres un profesor".into(),
      prompt: "Pregunta: 2+2\nRespuesta del alumno: 4".into(),
      temperature: 0.2,
      max_tokens: 50,
    }
  }

  fn client(server: &MockServer) -> OpenAI {
    OpenAI::new("test-key".into(), format!("{}/", server.uri()), "gpt-4o-mini".into()).unwrap()
  }

  #[tokio::test]
  async fn successful_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("Authorization", "Bearer test-key"))
      .and(body_partial_json(serde_json::json!({
        "model": "gpt-4o-mini",
        "max_tokens": 50,
        "messages": [
          {"role": "system", "content": "Eres un profesor"},
          {"role": "user", "content": "Pregunta: 2+2\nRespuesta del alumno: 4"}
        ]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "  true comentario: correcto\n"}}],
        "usage": {"prompt_tokens": 30, "completion_tokens": 5, "total_tokens": 35}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let text = client(&server).complete(&request()).await.unwrap();
    assert_eq!(text, "true comentario: correcto");
  }

  #[tokio::test]
  async fn error_envelope_message_is_extracted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
        "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
      })))
      .mount(&server)
      .await;

    match client(&server).complete(&request()).await.unwrap_err() {
      GradingError::Http { status, message } => {
        assert_eq!(status, 401);
        assert_eq!(message, "Incorrect API key provided");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn raw_error_body_is_kept() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
      .mount(&server)
      .await;

    let err = client(&server).complete(&request()).await.unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("internal error"));
  }

  #[tokio::test]
  async fn long_error_body_is_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(5_000)))
      .mount(&server)
      .await;

    match client(&server).complete(&request()).await.unwrap_err() {
      GradingError::Http { status, message } => {
        assert_eq!(status, 502);
        assert!(message.starts_with(&"x".repeat(ERROR_BODY_MAX)));
        assert!(message.ends_with("(5000 bytes total)"));
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn empty_choices_and_bad_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
      .mount(&server)
      .await;
    assert!(matches!(client(&server).complete(&request()).await, Err(GradingError::Empty)));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
      .mount(&server)
      .await;
    assert!(matches!(client(&server).complete(&request()).await, Err(GradingError::Decode(_))));
  }

  #[tokio::test]
  async fn unreachable_service_is_transport_error() {
    let oa = OpenAI::new("k".into(), "http://127.0.0.1:9".into(), "m".into()).unwrap();
    assert!(matches!(oa.complete(&request()).await, Err(GradingError::Transport(_))));
  }
}
