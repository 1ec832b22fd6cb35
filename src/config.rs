//! Loading application configuration (grading tunables, prompts, seed bank) from TOML.
//!
//! Secrets and service endpoints are read from the environment by the clients
//! themselves (`OpenAI::from_env`, `Auth0::from_env`); this file only holds
//! what is safe to commit.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ActivityDraft;
use crate::evaluator::UnknownTypePolicy;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Refuse activity writes whose `type` has no evaluation strategy.
  pub strict_activity_types: bool,
  /// Role name (as reported by the identity provider) allowed to write content.
  pub admin_role: String,
  pub grading: GradingSettings,
  pub prompts: Prompts,
  pub activities: Vec<ActivitySeed>,
  pub courses: Vec<CourseSeed>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      strict_activity_types: true,
      admin_role: "admin".into(),
      grading: GradingSettings::default(),
      prompts: Prompts::default(),
      activities: Vec::new(),
      courses: Vec::new(),
    }
  }
}

/// Knobs for the free-text grading call.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GradingSettings {
  pub temperature: f32,
  pub max_tokens: u32,
  /// What to do with activities whose type tag is not recognized.
  pub unknown_type_policy: UnknownTypePolicy,
}

impl Default for GradingSettings {
  fn default() -> Self {
    Self { temperature: 0.2, max_tokens: 120, unknown_type_policy: UnknownTypePolicy::Incorrect }
  }
}

/// Prompts sent to the grading service. The user template accepts `{question}` and `{answer}`.
/// The reply format (a `true`/`false` token, then `comentario: ` and a short
/// explanation) is what the response parser expects, so keep it if you override them.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub grading_system: String,
  pub grading_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      grading_system: "Eres un profesor que corrige respuestas de alumnos. Sé breve y objetivo.".into(),
      grading_user_template: "Pregunta: {question}\nRespuesta del alumno: {answer}\n\nResponde únicamente 'true' si la respuesta es correcta o 'false' si no lo es. Después escribe 'comentario: ' seguido de una explicación de una frase.".into(),
    }
  }
}

/// Activity entry accepted in the TOML seed bank.
#[derive(Clone, Debug, Deserialize)]
pub struct ActivitySeed {
  #[serde(default)] pub id: Option<String>,
  #[serde(default)] pub created_by: Option<String>,
  #[serde(flatten)]
  pub draft: ActivityDraft,
}

/// Course entry accepted in the TOML seed bank. `activities` lists seed activity ids.
#[derive(Clone, Debug, Deserialize)]
pub struct CourseSeed {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub image: String,
  #[serde(default)] pub activities: Vec<String>,
}

impl AppConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }
}

/// Attempt to load `AppConfig` from LEARN_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("LEARN_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match AppConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "learn_backend", %path, activities = cfg.activities.len(), courses = cfg.courses.len(), "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "learn_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "learn_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ActivityKind;

  #[test]
  fn empty_toml_gives_defaults() {
    let cfg = AppConfig::from_toml_str("").unwrap();
    assert!(cfg.strict_activity_types);
    assert_eq!(cfg.admin_role, "admin");
    assert_eq!(cfg.grading.max_tokens, 120);
    assert_eq!(cfg.grading.unknown_type_policy, UnknownTypePolicy::Incorrect);
    assert!(cfg.prompts.grading_user_template.contains("{question}"));
    assert!(cfg.prompts.grading_user_template.contains("comentario: "));
  }

  #[test]
  fn parses_settings_and_seed_bank() {
    let cfg = AppConfig::from_toml_str(
      r#"
strict_activity_types = false
admin_role = "instructor"

[grading]
temperature = 0.0
max_tokens = 64
unknown_type_policy = "reject"

[[activities]]
id = "a1"
title = "Capital"
type = "Multiple options"
content = "Capital of Spain?"
options = [ { text = "Madrid", correct = true }, { text = "Lisbon", correct = false } ]

[[activities]]
id = "a2"
title = "Sky"
type = "True/False"
content = "The sky is green"
isTrue = false

[[courses]]
id = "c1"
title = "Geography"
activities = ["a1", "a2"]
"#,
    )
    .unwrap();

    assert!(!cfg.strict_activity_types);
    assert_eq!(cfg.admin_role, "instructor");
    assert_eq!(cfg.grading.max_tokens, 64);
    assert_eq!(cfg.grading.unknown_type_policy, UnknownTypePolicy::Reject);
    assert_eq!(cfg.activities.len(), 2);
    assert_eq!(cfg.activities[0].draft.kind, Some(ActivityKind::MultipleOptions));
    assert_eq!(cfg.activities[1].draft.is_true, Some(false));
    assert_eq!(cfg.courses[0].activities, vec!["a1", "a2"]);
  }
}
