//! `/rest/activities` handlers. Reads need a signed-in user, writes the admin role.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::{info, instrument};

use crate::domain::{Activity, ActivityDraft};
use crate::error::ApiError;
use crate::logic::{check_answer, require_admin, CurrentUser};
use crate::protocol::{CheckIn, CheckOut};
use crate::state::AppState;

#[instrument(level = "info", skip_all, fields(sub = %user.sub))]
pub async fn list_activities(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
) -> Json<Vec<Activity>> {
  Json(state.list_activities().await)
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn get_activity(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Activity>, ApiError> {
  Ok(Json(state.get_activity(&id).await?))
}

#[instrument(level = "info", skip_all, fields(sub = %user.sub))]
pub async fn create_activity(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Json(draft): Json<ActivityDraft>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
  require_admin(&state, &user).await?;
  let activity = state.insert_activity(draft, &user.sub).await?;
  info!(target: "learn_backend", id = %activity.id, kind = %activity.kind, "Activity created");
  Ok((StatusCode::CREATED, Json(activity)))
}

#[instrument(level = "info", skip(state, user, draft), fields(sub = %user.sub))]
pub async fn update_activity(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  Json(draft): Json<ActivityDraft>,
) -> Result<Json<Activity>, ApiError> {
  require_admin(&state, &user).await?;
  let activity = state.update_activity(&id, draft).await?;
  info!(target: "learn_backend", %id, "Activity updated");
  Ok(Json(activity))
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn delete_activity(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Activity>, ApiError> {
  require_admin(&state, &user).await?;
  let activity = state.delete_activity(&id).await?;
  info!(target: "learn_backend", %id, "Activity deleted");
  Ok(Json(activity))
}

#[instrument(level = "info", skip(state, user, body), fields(sub = %user.sub, answer_len = body.answer.len()))]
pub async fn check_activity_answer(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  Json(body): Json<CheckIn>,
) -> Result<Json<CheckOut>, ApiError> {
  let evaluation = check_answer(&state, &id, &body.answer).await?;
  Ok(Json(evaluation.into()))
}

#[instrument(level = "info", skip(state, user), fields(sub = %user.sub))]
pub async fn mark_activity_viewed(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Activity>, ApiError> {
  Ok(Json(state.mark_viewed(&id, &user.sub).await?))
}
