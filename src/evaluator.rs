//! Answer evaluation: decides whether a submitted answer is correct for an activity.
//!
//! - True/False and Multiple options are compared locally, by exact string equality
//!   (no trimming, no case folding).
//! - Text answers go to the grading service; its completion is scanned for a
//!   `true`/`false` token and an optional rationale after `comentario: `.
//!
//! Grading failures never turn into errors. They come back as
//! `Verdict::Ungraded`, which still reads as "not correct" through
//! `Evaluation::correct` but lets the caller tell "wrong" from "not graded".

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::config::{GradingSettings, Prompts};
use crate::domain::{Activity, ActivityKind};
use crate::grading::{Grader, GradingRequest};
use crate::util::fill_template;

/// Marker preceding the rationale in grading completions.
pub const RATIONALE_MARKER: &str = "comentario: ";

/// Handling of activities whose type tag has no evaluation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
  /// Evaluate as incorrect, silently.
  #[default]
  Incorrect,
  /// Refuse to evaluate.
  Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GradingFailure {
  /// Service not configured, unreachable, or answered with an error.
  Unavailable(String),
  /// The completion had neither a `true` nor a `false` token.
  Unparseable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
  Correct,
  Incorrect,
  Ungraded(GradingFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
  pub verdict: Verdict,
  pub rationale: Option<String>,
}

impl Evaluation {
  fn plain(correct: bool) -> Self {
    let verdict = if correct { Verdict::Correct } else { Verdict::Incorrect };
    Self { verdict, rationale: None }
  }

  fn ungraded(failure: GradingFailure) -> Self {
    Self { verdict: Verdict::Ungraded(failure), rationale: None }
  }

  pub fn correct(&self) -> bool {
    self.verdict == Verdict::Correct
  }

  pub fn graded(&self) -> bool {
    !matches!(self.verdict, Verdict::Ungraded(_))
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
  #[error("activity type `{0}` has no evaluation strategy")]
  UnrecognizedActivityType(String),
}

#[derive(Clone)]
pub struct AnswerEvaluator {
  grader: Option<Arc<dyn Grader>>,
  prompts: Prompts,
  settings: GradingSettings,
}

impl AnswerEvaluator {
  pub fn new(grader: Option<Arc<dyn Grader>>, prompts: Prompts, settings: GradingSettings) -> Self {
    Self { grader, prompts, settings }
  }

  pub fn has_grader(&self) -> bool {
    self.grader.is_some()
  }

  /// Evaluate `answer` against `activity`. Never mutates or persists anything.
  #[instrument(level = "info", skip(self, answer, activity), fields(activity_id = %activity.id, kind = %activity.kind, answer_len = answer.len()))]
  pub async fn evaluate(&self, answer: &str, activity: &Activity) -> Result<Evaluation, EvaluationError> {
    let evaluation = match &activity.kind {
      ActivityKind::TrueFalse => {
        Evaluation::plain(activity.is_true.is_some_and(|truth| answer == truth.to_string()))
      }
      ActivityKind::MultipleOptions => {
        Evaluation::plain(activity.correct_option().is_some_and(|o| o.text == answer))
      }
      ActivityKind::Text => self.grade_text(&activity.content, answer).await,
      ActivityKind::Unrecognized(tag) => match self.settings.unknown_type_policy {
        UnknownTypePolicy::Incorrect => {
          warn!(target: "grading", activity_id = %activity.id, %tag, "No evaluation strategy for activity type; counting as incorrect");
          Evaluation::plain(false)
        }
        UnknownTypePolicy::Reject => return Err(EvaluationError::UnrecognizedActivityType(tag.clone())),
      },
    };
    debug!(target: "grading", activity_id = %activity.id, verdict = ?evaluation.verdict, "Answer evaluated");
    Ok(evaluation)
  }

  async fn grade_text(&self, question: &str, answer: &str) -> Evaluation {
    let Some(grader) = &self.grader else {
      warn!(target: "grading", "Grading service not configured; text answer left ungraded");
      return Evaluation::ungraded(GradingFailure::Unavailable("grading service is not configured".into()));
    };

    let request = GradingRequest {
      system: self.prompts.grading_system.clone(),
      prompt: fill_template(&self.prompts.grading_user_template, &[("question", question), ("answer", answer)]),
      temperature: self.settings.temperature,
      max_tokens: self.settings.max_tokens,
    };

    let start = std::time::Instant::now();
    match grader.complete(&request).await {
      Ok(text) => {
        let evaluation = parse_grading(&text);
        debug!(target: "grading", elapsed = ?start.elapsed(), reply_len = text.len(), graded = evaluation.graded(), "Grading reply received");
        evaluation
      }
      Err(e) => {
        error!(target: "grading", elapsed = ?start.elapsed(), error = %e, "Grading call failed; answer left ungraded");
        Evaluation::ungraded(GradingFailure::Unavailable(e.to_string()))
      }
    }
  }
}

/// Parse a grading completion.
///
/// The rationale is whatever follows the first `comentario: ` (ASCII case-insensitive).
/// The verdict is the earliest `true`/`false` token before that marker.
pub fn parse_grading(text: &str) -> Evaluation {
  // ASCII lowering keeps byte offsets aligned with `text`.
  let lower = text.to_ascii_lowercase();
  let (head, rationale) = match lower.find(RATIONALE_MARKER) {
    Some(at) => {
      let rest = text[at + RATIONALE_MARKER.len()..].trim();
      (&lower[..at], (!rest.is_empty()).then(|| rest.to_string()))
    }
    None => (lower.as_str(), None),
  };

  let verdict = match (head.find("true"), head.find("false")) {
    (Some(t), Some(f)) if t < f => Verdict::Correct,
    (Some(_), Some(_)) => Verdict::Incorrect,
    (Some(_), None) => Verdict::Correct,
    (None, Some(_)) => Verdict::Incorrect,
    (None, None) => Verdict::Ungraded(GradingFailure::Unparseable),
  };
  Evaluation { verdict, rationale }
}
