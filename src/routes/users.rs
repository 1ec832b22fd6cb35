//! `/users` handlers: the caller's roles and nickname, both held by the identity provider.

use std::sync::Arc;
use axum::{extract::State, Json};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::{identity, CurrentUser};
use crate::protocol::{NicknameIn, NicknameOut, RolesOut};
use crate::state::AppState;

#[instrument(level = "info", skip_all, fields(sub = %user.sub))]
pub async fn get_roles(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<RolesOut>, ApiError> {
  let roles = identity(&state)?.user_roles(&user.sub).await?;
  Ok(Json(RolesOut { roles }))
}

#[instrument(level = "info", skip_all, fields(sub = %user.sub, nickname_len = body.nickname.len()))]
pub async fn update_nickname(
  State(state): State<Arc<AppState>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<NicknameIn>,
) -> Result<Json<NicknameOut>, ApiError> {
  let nickname = body.nickname.trim();
  if nickname.is_empty() {
    return Err(ApiError::BadRequest("nickname is required".into()));
  }
  let data = identity(&state)?.update_nickname(&user.sub, nickname).await?;
  info!(target: "learn_backend", sub = %user.sub, "Nickname updated");
  Ok(Json(NicknameOut { message: "Nickname updated".into(), data }))
}
