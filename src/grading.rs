//! Boundary to the external grading service (a text-completion API).
//!
//! The evaluator only needs "send a prompt, get text back"; `OpenAI` implements it
//! over HTTP and tests plug in `mock::MockGrader`.

use async_trait::async_trait;
use thiserror::Error;

/// One completion request: system + user prompt, sampling temperature and a length cap.
#[derive(Clone, Debug, PartialEq)]
pub struct GradingRequest {
  pub system: String,
  pub prompt: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

#[derive(Debug, Error)]
pub enum GradingError {
  #[error("grading request failed: {0}")]
  Transport(String),
  #[error("grading service returned HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("could not decode grading response: {0}")]
  Decode(String),
  #[error("grading service returned no content")]
  Empty,
}

#[async_trait]
pub trait Grader: Send + Sync {
  async fn complete(&self, request: &GradingRequest) -> Result<String, GradingError>;
}

#[cfg(test)]
pub mod mock {
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;

  use super::*;

  /// Grader returning a canned completion (or a canned failure).
  pub struct MockGrader {
    reply: Result<String, (u16, String)>,
    calls: AtomicU32,
    last_request: Mutex<Option<GradingRequest>>,
  }

  impl MockGrader {
    pub fn replying(text: &str) -> Self {
      Self { reply: Ok(text.to_string()), calls: AtomicU32::new(0), last_request: Mutex::new(None) }
    }

    pub fn failing(status: u16, message: &str) -> Self {
      Self { reply: Err((status, message.to_string())), calls: AtomicU32::new(0), last_request: Mutex::new(None) }
    }

    pub fn calls(&self) -> u32 {
      self.calls.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GradingRequest> {
      self.last_request.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Grader for MockGrader {
    async fn complete(&self, request: &GradingRequest) -> Result<String, GradingError> {
      self.calls.fetch_add(1, Ordering::Relaxed);
      *self.last_request.lock().unwrap() = Some(request.clone());
      match &self.reply {
        Ok(text) => Ok(text.clone()),
        Err((status, message)) => Err(GradingError::Http { status: *status, message: message.clone() }),
      }
    }
  }
}
