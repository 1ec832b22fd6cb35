//! Public request/response DTOs for the HTTP endpoints (serde ready).
//! Stored records (`Activity`, `Course`) are returned as-is; drafts come from `domain`.

use serde::{Deserialize, Serialize};

use crate::evaluator::Evaluation;
use crate::identity::Role;

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub grading: bool,
}

/// Generic acknowledgement and error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOut {
  pub status: u16,
  pub message: String,
}

#[derive(Deserialize)]
pub struct CheckIn {
  pub answer: String,
}

/// `graded = false` means the grading service could not judge the answer;
/// `correct` is then always false.
#[derive(Debug, Serialize)]
pub struct CheckOut {
  pub correct: bool,
  pub graded: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rationale: Option<String>,
}

impl From<Evaluation> for CheckOut {
  fn from(e: Evaluation) -> Self {
    CheckOut { correct: e.correct(), graded: e.graded(), rationale: e.rationale }
  }
}

#[derive(Serialize)]
pub struct RolesOut {
  pub roles: Vec<Role>,
}

#[derive(Deserialize)]
pub struct NicknameIn {
  #[serde(default)]
  pub nickname: String,
}

#[derive(Serialize)]
pub struct NicknameOut {
  pub message: String,
  pub data: serde_json::Value,
}
