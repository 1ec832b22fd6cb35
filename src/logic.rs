//! Core behaviors shared by the HTTP handlers.
//!
//! This includes:
//!   - resolving the caller from the bearer token (`CurrentUser` extractor)
//!   - the admin role check for content writes
//!   - answer checking (activity lookup + evaluation)

use std::sync::Arc;

use axum::{
  async_trait,
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::evaluator::Evaluation;
use crate::identity::{IdentityError, IdentityProvider, UserInfo};
use crate::state::AppState;

/// The authenticated caller, as reported by the identity provider.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub UserInfo);

/// `Authorization: Bearer <token>` → token. Other schemes are ignored.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.split_once(' ')?;
  let token = token.trim();
  (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

pub fn identity(state: &AppState) -> Result<&dyn IdentityProvider, ApiError> {
  state
    .identity
    .as_deref()
    .ok_or_else(|| ApiError::Unavailable("identity provider is not configured".into()))
}

#[instrument(level = "debug", skip_all)]
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserInfo, ApiError> {
  let token = bearer_token(headers).ok_or_else(|| ApiError::Unauthorized("bearer token required".into()))?;
  match identity(state)?.user_info(token).await {
    Ok(user) => Ok(user),
    // Provider unreachable or unconfigured keeps its own status; any refusal means the token is not usable.
    Err(e @ (IdentityError::Transport(_) | IdentityError::NotConfigured)) => Err(e.into()),
    Err(e) => {
      warn!(target: "learn_backend", error = %e, "Bearer token not accepted");
      Err(ApiError::Unauthorized("token rejected by identity provider".into()))
    }
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    authenticate(state, &parts.headers).await.map(CurrentUser)
  }
}

/// Content writes need the configured admin role.
#[instrument(level = "debug", skip(state, user), fields(sub = %user.sub))]
pub async fn require_admin(state: &AppState, user: &UserInfo) -> Result<(), ApiError> {
  let roles = identity(state)?.user_roles(&user.sub).await?;
  if roles.iter().any(|r| r.name == state.config.admin_role) {
    return Ok(());
  }
  warn!(target: "learn_backend", sub = %user.sub, "Admin role required");
  Err(ApiError::Forbidden("user is not authorized".into()))
}

#[instrument(level = "info", skip(state, answer), fields(%activity_id, answer_len = answer.len()))]
pub async fn check_answer(state: &AppState, activity_id: &str, answer: &str) -> Result<Evaluation, ApiError> {
  let activity = state.get_activity(activity_id).await?;
  let evaluation = state.evaluator.evaluate(answer, &activity).await?;
  info!(target: "grading", id = %activity_id, kind = %activity.kind, correct = evaluation.correct(), graded = evaluation.graded(), "Answer checked");
  Ok(evaluation)
}
