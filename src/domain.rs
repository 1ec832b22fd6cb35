//! Domain models: activities (with their kind and options) and courses.
//!
//! Field names on the wire follow the stored document layout (`type`, `isTrue`,
//! `created_at`, `viewed_by`, ...), so records exported from the old store load as-is.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::util::now_millis;

/// What kind of question an activity is. Decides how answers are evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
  /// Free-text answer, judged by the grading service.
  Text,
  /// Answer must be the canonical `"true"` / `"false"`.
  TrueFalse,
  /// Answer must equal the text of the correct option.
  MultipleOptions,
  /// Any other tag. Only reachable when strict type checks are disabled
  /// or for records written before they existed.
  Unrecognized(String),
}

impl ActivityKind {
  pub fn as_str(&self) -> &str {
    match self {
      ActivityKind::Text => "Text",
      ActivityKind::TrueFalse => "True/False",
      ActivityKind::MultipleOptions => "Multiple options",
      ActivityKind::Unrecognized(tag) => tag,
    }
  }

  pub fn is_known(&self) -> bool {
    !matches!(self, ActivityKind::Unrecognized(_))
  }
}

impl From<String> for ActivityKind {
  fn from(tag: String) -> Self {
    match tag.as_str() {
      "Text" => ActivityKind::Text,
      "True/False" => ActivityKind::TrueFalse,
      "Multiple options" => ActivityKind::MultipleOptions,
      _ => ActivityKind::Unrecognized(tag),
    }
  }
}

impl From<ActivityKind> for String {
  fn from(kind: ActivityKind) -> Self {
    match kind {
      ActivityKind::Unrecognized(tag) => tag,
      known => known.as_str().to_string(),
    }
  }
}

impl fmt::Display for ActivityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityOption {
  pub text: String,
  #[serde(default)]
  pub correct: bool,
}

/// Stored activity record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  #[serde(rename = "type")]
  pub kind: ActivityKind,
  pub content: String,
  #[serde(rename = "isTrue", default)]
  pub is_true: Option<bool>,
  #[serde(default)] pub options: Vec<ActivityOption>,
  pub created_at: String,
  pub created_by: String,
  #[serde(default)] pub viewed_by: Vec<String>,
  #[serde(default)] pub image: String,
}

/// Why an activity or course write was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("field `{0}` is required")]
  MissingField(&'static str),
  #[error("unknown activity type `{0}`")]
  UnknownKind(String),
  #[error("True/False activities need `isTrue`")]
  MissingTruth,
  #[error("Multiple options activities need at least one option")]
  NoOptions,
  #[error("exactly one option must be correct, found {0}")]
  CorrectOptionCount(usize),
}

impl Activity {
  /// The option marked correct. Validation guarantees exactly one for new records.
  pub fn correct_option(&self) -> Option<&ActivityOption> {
    self.options.iter().find(|o| o.correct)
  }

  /// Record that `sub` has seen this activity. Returns false if already recorded.
  pub fn mark_viewed(&mut self, sub: &str) -> bool {
    if self.viewed_by.iter().any(|s| s == sub) {
      return false;
    }
    self.viewed_by.push(sub.to_string());
    true
  }

  /// Write-time invariants. `strict` rejects type tags without an evaluation strategy.
  pub fn validate(&self, strict: bool) -> Result<(), ValidationError> {
    if self.title.trim().is_empty() { return Err(ValidationError::MissingField("title")); }
    if self.content.trim().is_empty() { return Err(ValidationError::MissingField("content")); }
    match &self.kind {
      ActivityKind::TrueFalse if self.is_true.is_none() => Err(ValidationError::MissingTruth),
      ActivityKind::MultipleOptions => {
        if self.options.is_empty() {
          return Err(ValidationError::NoOptions);
        }
        match self.options.iter().filter(|o| o.correct).count() {
          1 => Ok(()),
          n => Err(ValidationError::CorrectOptionCount(n)),
        }
      }
      kind if strict && !kind.is_known() => Err(ValidationError::UnknownKind(kind.to_string())),
      _ => Ok(()),
    }
  }

  /// Merge the fields present in `draft` into this record.
  /// A type change drops `isTrue` and `options` of the previous type first.
  pub fn apply(&mut self, draft: ActivityDraft) {
    if let Some(v) = draft.title { self.title = v; }
    if let Some(v) = draft.description { self.description = v; }
    if let Some(v) = draft.kind {
      if v != self.kind {
        self.is_true = None;
        self.options.clear();
      }
      self.kind = v;
    }
    if let Some(v) = draft.content { self.content = v; }
    if let Some(v) = draft.is_true { self.is_true = Some(v); }
    if let Some(v) = draft.options { self.options = v; }
    if let Some(v) = draft.image { self.image = v; }
  }
}

/// Writable activity fields, used for both create (all required ones present)
/// and partial update.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ActivityDraft {
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub description: Option<String>,
  #[serde(rename = "type", default)]
  pub kind: Option<ActivityKind>,
  #[serde(default)] pub content: Option<String>,
  #[serde(rename = "isTrue", default)]
  pub is_true: Option<bool>,
  #[serde(default)] pub options: Option<Vec<ActivityOption>>,
  #[serde(default)] pub image: Option<String>,
}

impl ActivityDraft {
  /// Build and validate a new record owned by `created_by`.
  pub fn into_activity(self, id: Option<String>, created_by: &str, strict: bool) -> Result<Activity, ValidationError> {
    let kind = self.kind.ok_or(ValidationError::MissingField("type"))?;
    let activity = Activity {
      id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      title: self.title.unwrap_or_default(),
      description: self.description.unwrap_or_default(),
      kind,
      content: self.content.unwrap_or_default(),
      is_true: self.is_true,
      options: self.options.unwrap_or_default(),
      created_at: now_millis(),
      created_by: created_by.to_string(),
      viewed_by: Vec::new(),
      image: self.image.unwrap_or_default(),
    };
    activity.validate(strict)?;
    Ok(activity)
  }
}

/// Stored course record. `activities` keeps insertion order and never holds duplicates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub activities: Vec<String>,
  pub created_at: String,
  pub created_by: String,
  #[serde(default)] pub image: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CourseDraft {
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub description: Option<String>,
  #[serde(default)] pub image: Option<String>,
}

impl CourseDraft {
  fn title(&self) -> Result<&str, ValidationError> {
    match self.title.as_deref().map(str::trim) {
      Some(t) if !t.is_empty() => Ok(t),
      _ => Err(ValidationError::MissingField("title")),
    }
  }

  pub fn into_course(self, id: Option<String>, created_by: &str) -> Result<Course, ValidationError> {
    let title = self.title()?.to_string();
    Ok(Course {
      id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      title,
      description: self.description.unwrap_or_default(),
      activities: Vec::new(),
      created_at: now_millis(),
      created_by: created_by.to_string(),
      image: self.image.unwrap_or_default(),
    })
  }
}

impl Course {
  /// Course updates always carry a title; the other fields are optional.
  pub fn apply(&mut self, draft: CourseDraft) -> Result<(), ValidationError> {
    self.title = draft.title()?.to_string();
    if let Some(v) = draft.description { self.description = v; }
    if let Some(v) = draft.image { self.image = v; }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn draft(value: serde_json::Value) -> ActivityDraft {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn kind_keeps_wire_strings() {
    for tag in ["Text", "True/False", "Multiple options", "Essay"] {
      let kind: ActivityKind = serde_json::from_value(json!(tag)).unwrap();
      assert_eq!(serde_json::to_value(&kind).unwrap(), json!(tag));
    }
    assert_eq!(ActivityKind::from("Essay".to_string()), ActivityKind::Unrecognized("Essay".into()));
    assert!(!ActivityKind::from("true/false".to_string()).is_known());
  }

  #[test]
  fn activity_serializes_document_field_names() {
    let a = draft(json!({"title": "t", "type": "True/False", "content": "c", "isTrue": false}))
      .into_activity(Some("a1".into()), "auth0|u", true)
      .unwrap();
    let v = serde_json::to_value(&a).unwrap();
    assert_eq!(v["type"], "True/False");
    assert_eq!(v["isTrue"], false);
    assert_eq!(v["created_by"], "auth0|u");
    assert_eq!(v["viewed_by"], json!([]));
    assert!(v["created_at"].as_str().unwrap().parse::<i64>().is_ok());
  }

  #[test]
  fn multiple_options_need_exactly_one_correct() {
    let none = draft(json!({"title": "t", "type": "Multiple options", "content": "c",
      "options": [{"text": "a", "correct": false}, {"text": "b", "correct": false}]}));
    assert_eq!(none.into_activity(None, "u", true).unwrap_err(), ValidationError::CorrectOptionCount(0));

    let two = draft(json!({"title": "t", "type": "Multiple options", "content": "c",
      "options": [{"text": "a", "correct": true}, {"text": "b", "correct": true}]}));
    assert_eq!(two.into_activity(None, "u", true).unwrap_err(), ValidationError::CorrectOptionCount(2));

    let empty = draft(json!({"title": "t", "type": "Multiple options", "content": "c"}));
    assert_eq!(empty.into_activity(None, "u", true).unwrap_err(), ValidationError::NoOptions);
  }

  #[test]
  fn required_fields_and_truth_value() {
    let no_type = draft(json!({"title": "t", "content": "c"}));
    assert_eq!(no_type.into_activity(None, "u", true).unwrap_err(), ValidationError::MissingField("type"));

    let no_title = draft(json!({"type": "Text", "content": "c"}));
    assert_eq!(no_title.into_activity(None, "u", true).unwrap_err(), ValidationError::MissingField("title"));

    let no_truth = draft(json!({"title": "t", "type": "True/False", "content": "c"}));
    assert_eq!(no_truth.into_activity(None, "u", true).unwrap_err(), ValidationError::MissingTruth);
  }

  #[test]
  fn unknown_kind_only_allowed_when_not_strict() {
    let essay = json!({"title": "t", "type": "Essay", "content": "c"});
    assert_eq!(
      draft(essay.clone()).into_activity(None, "u", true).unwrap_err(),
      ValidationError::UnknownKind("Essay".into())
    );
    let a = draft(essay).into_activity(None, "u", false).unwrap();
    assert_eq!(a.kind, ActivityKind::Unrecognized("Essay".into()));
  }

  #[test]
  fn apply_merges_only_present_fields() {
    let mut a = draft(json!({"title": "t", "type": "Text", "content": "c", "description": "d"}))
      .into_activity(None, "u", true)
      .unwrap();
    a.apply(draft(json!({"title": "new"})));
    assert_eq!(a.title, "new");
    assert_eq!(a.description, "d");
    assert_eq!(a.kind, ActivityKind::Text);
  }

  #[test]
  fn type_change_drops_previous_type_fields() {
    let mut tf = draft(json!({"title": "t", "type": "True/False", "content": "c", "isTrue": true}))
      .into_activity(None, "u", true)
      .unwrap();
    tf.apply(draft(json!({"type": "Text"})));
    assert_eq!(tf.kind, ActivityKind::Text);
    assert_eq!(tf.is_true, None);

    let mut mo = draft(json!({
      "title": "t", "type": "Multiple options", "content": "c",
      "options": [{"text": "a", "correct": true}, {"text": "b"}]
    }))
    .into_activity(None, "u", true)
    .unwrap();
    mo.apply(draft(json!({"type": "True/False", "isTrue": false})));
    assert!(mo.options.is_empty());
    assert_eq!(mo.is_true, Some(false));
    assert!(mo.validate(true).is_ok());

    // Same type keeps the existing answer data.
    mo.apply(draft(json!({"type": "True/False", "title": "t2"})));
    assert_eq!(mo.is_true, Some(false));
  }

  #[test]
  fn viewed_by_has_no_duplicates() {
    let mut a = draft(json!({"title": "t", "type": "Text", "content": "c"}))
      .into_activity(None, "u", true)
      .unwrap();
    assert!(a.mark_viewed("s1"));
    assert!(a.mark_viewed("s2"));
    assert!(!a.mark_viewed("s1"));
    assert_eq!(a.viewed_by, vec!["s1".to_string(), "s2".to_string()]);
  }

  #[test]
  fn course_title_is_required() {
    let err = CourseDraft { title: Some("  ".into()), ..Default::default() }.into_course(None, "u").unwrap_err();
    assert_eq!(err, ValidationError::MissingField("title"));

    let mut c = CourseDraft { title: Some("Rust".into()), ..Default::default() }.into_course(None, "u").unwrap();
    assert!(c.activities.is_empty());
    assert!(c.apply(CourseDraft::default()).is_err());
    c.apply(CourseDraft { title: Some("Rust II".into()), image: Some("x.png".into()), ..Default::default() }).unwrap();
    assert_eq!(c.title, "Rust II");
    assert_eq!(c.image, "x.png");
  }
}
