//! Built-in demo content, loaded when no seed bank is configured so a fresh
//! instance has one activity of each kind and a course grouping them.

use crate::config::{ActivitySeed, CourseSeed};
use crate::domain::{ActivityDraft, ActivityKind, ActivityOption};

fn seed(id: &str, draft: ActivityDraft) -> ActivitySeed {
  ActivitySeed { id: Some(id.into()), created_by: None, draft }
}

pub fn demo_activities() -> Vec<ActivitySeed> {
  vec![
    seed("demo-true-false", ActivityDraft {
      title: Some("Préstamos".into()),
      kind: Some(ActivityKind::TrueFalse),
      content: Some("En Rust puede haber varias referencias mutables al mismo valor a la vez.".into()),
      is_true: Some(false),
      ..Default::default()
    }),
    seed("demo-multiple", ActivityDraft {
      title: Some("Tipos de cadena".into()),
      kind: Some(ActivityKind::MultipleOptions),
      content: Some("¿Qué tipo representa una cadena con propiedad y tamaño variable?".into()),
      options: Some(vec![
        ActivityOption { text: "&str".into(), correct: false },
        ActivityOption { text: "String".into(), correct: true },
        ActivityOption { text: "char".into(), correct: false },
      ]),
      ..Default::default()
    }),
    seed("demo-text", ActivityDraft {
      title: Some("Ownership".into()),
      kind: Some(ActivityKind::Text),
      content: Some("Explica con tus palabras qué ocurre con un valor cuando su propietario sale de ámbito.".into()),
      ..Default::default()
    }),
  ]
}

pub fn demo_courses() -> Vec<CourseSeed> {
  vec![CourseSeed {
    id: Some("demo-course".into()),
    title: "Introducción a Rust".into(),
    description: "Conceptos básicos de propiedad y tipos.".into(),
    image: String::new(),
    activities: vec!["demo-true-false".into(), "demo-multiple".into(), "demo-text".into()],
  }]
}
