//! `/rest/courses` handlers. Writes answer with a `{status, message}` acknowledgement.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::{info, instrument};

use crate::domain::{Activity, Course, CourseDraft};
use crate::error::ApiError;
use crate::logic::{require_admin, CurrentUser};
use crate::protocol::StatusOut;
use crate::state::AppState;

fn ack(status: StatusCode, message: &str) -> (StatusCode, Json<StatusOut>) {
  (status, Json(StatusOut { status: status.as_u16(), message: message.into() }))
}

#[instrument(level = "info", skip_all, fields(sub = %user.sub))]
pub async fn list_courses(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
) -> Json<Vec<Course>> {
  Json(state.list_courses().await)
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn get_course(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Course>, ApiError> {
  Ok(Json(state.get_course(&id).await?))
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn get_course_activities(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Vec<Activity>>, ApiError> {
  Ok(Json(state.course_activities(&id).await?))
}

#[instrument(level = "info", skip_all, fields(sub = %user.sub))]
pub async fn create_course(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Json(draft): Json<CourseDraft>,
) -> Result<(StatusCode, Json<StatusOut>), ApiError> {
  require_admin(&state, &user).await?;
  let course = state.insert_course(draft, &user.sub).await?;
  info!(target: "learn_backend", id = %course.id, "Course created");
  Ok(ack(StatusCode::CREATED, "Course created"))
}

#[instrument(level = "info", skip(state, user, draft), fields(sub = %user.sub))]
pub async fn update_course(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  Json(draft): Json<CourseDraft>,
) -> Result<(StatusCode, Json<StatusOut>), ApiError> {
  require_admin(&state, &user).await?;
  state.update_course(&id, draft).await?;
  info!(target: "learn_backend", %id, "Course updated");
  Ok(ack(StatusCode::OK, "Course updated"))
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn delete_course(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<(StatusCode, Json<StatusOut>), ApiError> {
  require_admin(&state, &user).await?;
  state.delete_course(&id).await?;
  info!(target: "learn_backend", %id, "Course deleted");
  Ok(ack(StatusCode::OK, "Course deleted"))
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn add_course_activity(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path((course_id, activity_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<StatusOut>), ApiError> {
  require_admin(&state, &user).await?;
  state.add_activity_to_course(&course_id, &activity_id).await?;
  info!(target: "learn_backend", %course_id, %activity_id, "Activity added to course");
  Ok(ack(StatusCode::OK, "Activity added to course"))
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn remove_course_activity(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path((course_id, activity_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<StatusOut>), ApiError> {
  require_admin(&state, &user).await?;
  state.remove_activity_from_course(&course_id, &activity_id).await?;
  info!(target: "learn_backend", %course_id, %activity_id, "Activity removed from course");
  Ok(ack(StatusCode::OK, "Activity removed from course"))
}
