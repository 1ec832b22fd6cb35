//! Application state: in-memory document stores, the answer evaluator and the identity client.
//!
//! This module owns:
//!   - the activity and course stores (by id)
//!   - the app config (from TOML or defaults)
//!   - the answer evaluator (with the optional OpenAI grader)
//!   - the optional identity provider client
//!
//! Store operations keep the cross-record invariants: course activity lists never
//! hold duplicates, and deleting an activity removes it from every course.

use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{load_app_config_from_env, AppConfig};
use crate::domain::{Activity, ActivityDraft, Course, CourseDraft, ValidationError};
use crate::evaluator::AnswerEvaluator;
use crate::grading::Grader;
use crate::identity::{Auth0, IdentityProvider};
use crate::openai::OpenAI;
use crate::seeds::{demo_activities, demo_courses};

/// Subject recorded as creator of records loaded from the seed bank.
const SEED_CREATOR: &str = "seed";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("activity not found: {0}")]
    ActivityNotFound(String),
    #[error("course not found: {0}")]
    CourseNotFound(String),
    #[error("activity {activity} is already in course {course}")]
    AlreadyInCourse { course: String, activity: String },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Clone)]
pub struct AppState {
    pub activities: Arc<RwLock<HashMap<String, Activity>>>,
    pub courses: Arc<RwLock<HashMap<String, Course>>>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub evaluator: AnswerEvaluator,
    pub config: AppConfig,
}

impl AppState {
    /// Build state from env: load config, seed stores, init OpenAI and identity clients.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let mut cfg = load_app_config_from_env().unwrap_or_default();
        if cfg.activities.is_empty() && cfg.courses.is_empty() {
            info!(target: "learn_backend", "No seed bank configured; loading built-in demo content");
            cfg.activities = demo_activities();
            cfg.courses = demo_courses();
        }

        let grader: Option<Arc<dyn Grader>> = match OpenAI::from_env() {
            Some(oa) => {
                info!(target: "learn_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI grading enabled.");
                Some(Arc::new(oa))
            }
            None => {
                warn!(target: "learn_backend", "OpenAI grading disabled (no OPENAI_API_KEY). Text answers will be ungraded.");
                None
            }
        };

        let identity: Option<Arc<dyn IdentityProvider>> = match Auth0::from_env() {
            Some(auth0) => {
                info!(target: "learn_backend", domain = %auth0.domain, management = auth0.has_management_access(), "Identity provider enabled.");
                Some(Arc::new(auth0))
            }
            None => {
                error!(target: "learn_backend", "IDENTITY_DOMAIN not set; authenticated routes will answer 503.");
                None
            }
        };

        Self::with_parts(cfg, grader, identity)
    }

    /// Build state from explicit parts, loading the config's seed bank.
    pub fn with_parts(
        config: AppConfig,
        grader: Option<Arc<dyn Grader>>,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let strict = config.strict_activity_types;
        let mut activities = HashMap::<String, Activity>::new();
        for seed in &config.activities {
            let created_by = seed.created_by.as_deref().unwrap_or(SEED_CREATOR);
            match seed.draft.clone().into_activity(seed.id.clone(), created_by, strict) {
                Ok(a) => {
                    activities.insert(a.id.clone(), a);
                }
                Err(e) => {
                    error!(target: "learn_backend", id = ?seed.id, error = %e, "Skipping seed activity");
                }
            }
        }

        let mut courses = HashMap::<String, Course>::new();
        for seed in &config.courses {
            let draft = CourseDraft {
                title: Some(seed.title.clone()),
                description: Some(seed.description.clone()),
                image: Some(seed.image.clone()),
            };
            let mut course = match draft.into_course(seed.id.clone(), SEED_CREATOR) {
                Ok(c) => c,
                Err(e) => {
                    error!(target: "learn_backend", id = ?seed.id, error = %e, "Skipping seed course");
                    continue;
                }
            };
            for id in &seed.activities {
                if !activities.contains_key(id) {
                    warn!(target: "learn_backend", course = %course.id, activity = %id, "Seed course references unknown activity");
                } else if !course.activities.contains(id) {
                    course.activities.push(id.clone());
                }
            }
            courses.insert(course.id.clone(), course);
        }

        info!(target: "learn_backend", activities = activities.len(), courses = courses.len(), "Startup inventory");

        let evaluator = AnswerEvaluator::new(grader, config.prompts.clone(), config.grading.clone());
        Self {
            activities: Arc::new(RwLock::new(activities)),
            courses: Arc::new(RwLock::new(courses)),
            identity,
            evaluator,
            config,
        }
    }

    // --- activities ---

    /// All activities, oldest first.
    pub async fn list_activities(&self) -> Vec<Activity> {
        let mut all: Vec<Activity> = self.activities.read().await.values().cloned().collect();
        all.sort_by(|a, b| by_creation(&a.created_at, &a.id, &b.created_at, &b.id));
        all
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_activity(&self, id: &str) -> Result<Activity, StoreError> {
        self.activities
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ActivityNotFound(id.to_string()))
    }

    #[instrument(level = "debug", skip(self, draft), fields(%created_by))]
    pub async fn insert_activity(&self, draft: ActivityDraft, created_by: &str) -> Result<Activity, StoreError> {
        let activity = draft.into_activity(None, created_by, self.config.strict_activity_types)?;
        self.activities.write().await.insert(activity.id.clone(), activity.clone());
        Ok(activity)
    }

    /// Partial update; the merged record must still pass validation.
    #[instrument(level = "debug", skip(self, draft), fields(%id))]
    pub async fn update_activity(&self, id: &str, draft: ActivityDraft) -> Result<Activity, StoreError> {
        let mut activities = self.activities.write().await;
        let current = activities
            .get(id)
            .ok_or_else(|| StoreError::ActivityNotFound(id.to_string()))?;
        let mut updated = current.clone();
        updated.apply(draft);
        updated.validate(self.config.strict_activity_types)?;
        activities.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Delete an activity and drop it from every course that lists it.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn delete_activity(&self, id: &str) -> Result<Activity, StoreError> {
        let removed = self
            .activities
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StoreError::ActivityNotFound(id.to_string()))?;
        let mut courses = self.courses.write().await;
        for course in courses.values_mut() {
            course.activities.retain(|a| a != id);
        }
        Ok(removed)
    }

    /// Record that `sub` viewed the activity. Idempotent.
    #[instrument(level = "debug", skip(self), fields(%id, %sub))]
    pub async fn mark_viewed(&self, id: &str, sub: &str) -> Result<Activity, StoreError> {
        let mut activities = self.activities.write().await;
        let activity = activities
            .get_mut(id)
            .ok_or_else(|| StoreError::ActivityNotFound(id.to_string()))?;
        if activity.mark_viewed(sub) {
            info!(target: "learn_backend", activity_id = %id, %sub, viewers = activity.viewed_by.len(), "Activity marked as viewed");
        }
        Ok(activity.clone())
    }

    // --- courses ---

    /// All courses, oldest first.
    pub async fn list_courses(&self) -> Vec<Course> {
        let mut all: Vec<Course> = self.courses.read().await.values().cloned().collect();
        all.sort_by(|a, b| by_creation(&a.created_at, &a.id, &b.created_at, &b.id));
        all
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_course(&self, id: &str) -> Result<Course, StoreError> {
        self.courses
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::CourseNotFound(id.to_string()))
    }

    #[instrument(level = "debug", skip(self, draft), fields(%created_by))]
    pub async fn insert_course(&self, draft: CourseDraft, created_by: &str) -> Result<Course, StoreError> {
        let course = draft.into_course(None, created_by)?;
        self.courses.write().await.insert(course.id.clone(), course.clone());
        Ok(course)
    }

    #[instrument(level = "debug", skip(self, draft), fields(%id))]
    pub async fn update_course(&self, id: &str, draft: CourseDraft) -> Result<Course, StoreError> {
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(id)
            .ok_or_else(|| StoreError::CourseNotFound(id.to_string()))?;
        course.apply(draft)?;
        Ok(course.clone())
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn delete_course(&self, id: &str) -> Result<Course, StoreError> {
        self.courses
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StoreError::CourseNotFound(id.to_string()))
    }

    #[instrument(level = "debug", skip(self), fields(%course_id, %activity_id))]
    pub async fn add_activity_to_course(&self, course_id: &str, activity_id: &str) -> Result<Course, StoreError> {
        // Lock order: activities, then courses (same as delete_activity).
        let activities = self.activities.read().await;
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(course_id)
            .ok_or_else(|| StoreError::CourseNotFound(course_id.to_string()))?;
        if course.activities.iter().any(|a| a == activity_id) {
            return Err(StoreError::AlreadyInCourse {
                course: course_id.to_string(),
                activity: activity_id.to_string(),
            });
        }
        if !activities.contains_key(activity_id) {
            return Err(StoreError::ActivityNotFound(activity_id.to_string()));
        }
        course.activities.push(activity_id.to_string());
        Ok(course.clone())
    }

    /// Remove an activity from a course. Both must exist; an activity that is
    /// not in the course leaves it unchanged.
    #[instrument(level = "debug", skip(self), fields(%course_id, %activity_id))]
    pub async fn remove_activity_from_course(&self, course_id: &str, activity_id: &str) -> Result<Course, StoreError> {
        let activities = self.activities.read().await;
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(course_id)
            .ok_or_else(|| StoreError::CourseNotFound(course_id.to_string()))?;
        if !activities.contains_key(activity_id) {
            return Err(StoreError::ActivityNotFound(activity_id.to_string()));
        }
        course.activities.retain(|a| a != activity_id);
        Ok(course.clone())
    }

    /// Activities of a course, in course order.
    #[instrument(level = "debug", skip(self), fields(%course_id))]
    pub async fn course_activities(&self, course_id: &str) -> Result<Vec<Activity>, StoreError> {
        let course = self.get_course(course_id).await?;
        let activities = self.activities.read().await;
        Ok(course
            .activities
            .iter()
            .filter_map(|id| activities.get(id).cloned())
            .collect())
    }
}

/// Oldest first by numeric `created_at`, ties broken by id.
fn by_creation(a_at: &str, a_id: &str, b_at: &str, b_id: &str) -> std::cmp::Ordering {
    let parse = |s: &str| s.parse::<i64>().unwrap_or(i64::MAX);
    parse(a_at).cmp(&parse(b_at)).then_with(|| a_id.cmp(b_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityKind;
    use serde_json::json;

    fn state() -> AppState {
        AppState::with_parts(AppConfig::default(), None, None)
    }

    fn text_draft(title: &str) -> ActivityDraft {
        serde_json::from_value(json!({"title": title, "type": "Text", "content": "¿Qué es un trait?"})).unwrap()
    }

    #[tokio::test]
    async fn activity_crud_roundtrip() {
        let st = state();
        let a = st.insert_activity(text_draft("Traits"), "auth0|admin").await.unwrap();
        assert_eq!(st.get_activity(&a.id).await.unwrap(), a);

        let patch: ActivityDraft = serde_json::from_value(json!({"description": "intro"})).unwrap();
        let updated = st.update_activity(&a.id, patch).await.unwrap();
        assert_eq!(updated.description, "intro");
        assert_eq!(updated.created_at, a.created_at);

        let bad: ActivityDraft = serde_json::from_value(json!({"type": "True/False"})).unwrap();
        assert!(matches!(st.update_activity(&a.id, bad).await, Err(StoreError::Invalid(ValidationError::MissingTruth))));
        assert_eq!(st.get_activity(&a.id).await.unwrap().kind, ActivityKind::Text);

        st.delete_activity(&a.id).await.unwrap();
        assert!(matches!(st.get_activity(&a.id).await, Err(StoreError::ActivityNotFound(_))));
        assert!(matches!(st.delete_activity(&a.id).await, Err(StoreError::ActivityNotFound(_))));
    }

    #[tokio::test]
    async fn course_membership_rules() {
        let st = state();
        let a = st.insert_activity(text_draft("A"), "u").await.unwrap();
        let b = st.insert_activity(text_draft("B"), "u").await.unwrap();
        let c = st
            .insert_course(CourseDraft { title: Some("Rust".into()), ..Default::default() }, "u")
            .await
            .unwrap();

        st.add_activity_to_course(&c.id, &b.id).await.unwrap();
        st.add_activity_to_course(&c.id, &a.id).await.unwrap();
        assert!(matches!(
            st.add_activity_to_course(&c.id, &a.id).await,
            Err(StoreError::AlreadyInCourse { .. })
        ));
        assert!(matches!(
            st.add_activity_to_course(&c.id, "missing").await,
            Err(StoreError::ActivityNotFound(_))
        ));
        assert!(matches!(
            st.add_activity_to_course("missing", &a.id).await,
            Err(StoreError::CourseNotFound(_))
        ));

        let listed: Vec<String> = st.course_activities(&c.id).await.unwrap().into_iter().map(|x| x.title).collect();
        assert_eq!(listed, vec!["B", "A"]);

        st.delete_activity(&b.id).await.unwrap();
        assert_eq!(st.get_course(&c.id).await.unwrap().activities, vec![a.id.clone()]);

        let unrelated = st.insert_activity(text_draft("C"), "u").await.unwrap();
        let unchanged = st.remove_activity_from_course(&c.id, &unrelated.id).await.unwrap();
        assert_eq!(unchanged.activities, vec![a.id.clone()]);
        let emptied = st.remove_activity_from_course(&c.id, &a.id).await.unwrap();
        assert!(emptied.activities.is_empty());
    }

    #[tokio::test]
    async fn mark_viewed_is_idempotent() {
        let st = state();
        let a = st.insert_activity(text_draft("A"), "u").await.unwrap();
        st.mark_viewed(&a.id, "auth0|s1").await.unwrap();
        let again = st.mark_viewed(&a.id, "auth0|s1").await.unwrap();
        assert_eq!(again.viewed_by, vec!["auth0|s1".to_string()]);
        assert!(matches!(st.mark_viewed("missing", "x").await, Err(StoreError::ActivityNotFound(_))));
    }

    #[tokio::test]
    async fn seed_bank_is_loaded_and_validated() {
        let cfg = AppConfig::from_toml_str(
            r#"
[[activities]]
id = "ok"
title = "Sky"
type = "True/False"
content = "The sky is blue"
isTrue = true

[[activities]]
id = "broken"
title = "No truth"
type = "True/False"
content = "?"

[[courses]]
id = "c1"
title = "Basics"
activities = ["ok", "broken", "ok"]
"#,
        )
        .unwrap();
        let st = AppState::with_parts(cfg, None, None);
        assert!(st.get_activity("ok").await.is_ok());
        assert!(st.get_activity("broken").await.is_err());
        assert_eq!(st.get_course("c1").await.unwrap().activities, vec!["ok".to_string()]);
        assert_eq!(st.get_activity("ok").await.unwrap().created_by, SEED_CREATOR);
    }

    #[tokio::test]
    async fn demo_content_is_consistent() {
        let cfg = AppConfig { activities: demo_activities(), courses: demo_courses(), ..AppConfig::default() };
        let st = AppState::with_parts(cfg, None, None);
        assert_eq!(st.list_activities().await.len(), demo_activities().len());
        for course in st.list_courses().await {
            assert_eq!(st.course_activities(&course.id).await.unwrap().len(), course.activities.len());
            assert!(!course.activities.is_empty());
        }
    }

    #[test]
    fn creation_order_breaks_ties_by_id() {
        assert!(by_creation("1", "b", "2", "a").is_lt());
        assert!(by_creation("5", "a", "5", "b").is_lt());
        assert!(by_creation("10", "a", "9", "a").is_gt());
    }
}
