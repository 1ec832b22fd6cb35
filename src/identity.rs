//! External identity provider (Auth0-style): user lookup from a bearer token,
//! role listing and nickname updates through the management API.
//!
//! Token validation itself is the provider's job: a token is accepted when
//! `/userinfo` answers for it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::util::{encode_component, trunc_for_log};

const TIMEOUT_SECS: u64 = 10;
const ERROR_BODY_MAX: usize = 300;
/// Refresh the management token this long before it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
  pub sub: String,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub nickname: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  #[serde(default, skip_serializing_if = "Option::is_none")] pub id: Option<String>,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
  #[error("token rejected by identity provider")]
  Unauthorized,
  #[error("identity provider management API is not configured")]
  NotConfigured,
  #[error("identity request failed: {0}")]
  Transport(String),
  #[error("identity provider returned HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("could not decode identity response: {0}")]
  Decode(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
  async fn user_info(&self, token: &str) -> Result<UserInfo, IdentityError>;
  async fn user_roles(&self, sub: &str) -> Result<Vec<Role>, IdentityError>;
  async fn update_nickname(&self, sub: &str, nickname: &str) -> Result<serde_json::Value, IdentityError>;
}

struct CachedToken {
  token: String,
  refresh_at: Instant,
}

pub struct Auth0 {
  client: reqwest::Client,
  pub domain: String,
  client_id: Option<String>,
  client_secret: Option<String>,
  management_token: RwLock<Option<CachedToken>>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
  grant_type: &'a str,
  client_id: &'a str,
  client_secret: &'a str,
  audience: String,
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  #[serde(default = "default_expiry")] expires_in: u64,
}

fn default_expiry() -> u64 { 86_400 }

impl Auth0 {
  /// Construct the client if we find IDENTITY_DOMAIN; otherwise return None.
  /// Management credentials are optional; without them only `/userinfo` works.
  pub fn from_env() -> Option<Self> {
    let domain = std::env::var("IDENTITY_DOMAIN").ok()?;
    let client_id = std::env::var("IDENTITY_CLIENT_ID").ok();
    let client_secret = std::env::var("IDENTITY_CLIENT_SECRET").ok();
    Self::new(domain, client_id, client_secret).ok()
  }

  pub fn new(domain: String, client_id: Option<String>, client_secret: Option<String>) -> Result<Self, IdentityError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(TIMEOUT_SECS))
      .build()
      .map_err(|e| IdentityError::Transport(e.to_string()))?;
    Ok(Self {
      client,
      domain: domain.trim_end_matches('/').to_string(),
      client_id,
      client_secret,
      management_token: RwLock::new(None),
    })
  }

  pub fn has_management_access(&self) -> bool {
    self.client_id.is_some() && self.client_secret.is_some()
  }

  fn user_url(&self, sub: &str) -> String {
    format!("{}/api/v2/users/{}", self.domain, encode_component(sub))
  }

  /// Client-credentials token for the management API, cached until shortly before expiry.
  #[instrument(level = "debug", skip(self))]
  async fn management_token(&self) -> Result<String, IdentityError> {
    if let Some(cached) = self.management_token.read().await.as_ref() {
      if Instant::now() < cached.refresh_at {
        return Ok(cached.token.clone());
      }
    }

    let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
      return Err(IdentityError::NotConfigured);
    };
    let req = TokenRequest {
      grant_type: "client_credentials",
      client_id,
      client_secret,
      audience: format!("{}/api/v2/", self.domain),
    };
    let res = self.client.post(format!("{}/oauth/token", self.domain))
      .header(USER_AGENT, "learn-backend/0.1")
      .json(&req).send().await
      .map_err(|e| IdentityError::Transport(e.to_string()))?;
    let body: TokenResponse = match decode(res).await {
      // Our client credentials were refused; the caller's token is not at fault.
      Err(IdentityError::Unauthorized) => {
        warn!(target: "identity", "Client credentials rejected by token endpoint");
        return Err(IdentityError::Http { status: 401, message: "management credentials rejected".into() });
      }
      other => other?,
    };

    let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_SLACK);
    *self.management_token.write().await = Some(CachedToken {
      token: body.access_token.clone(),
      refresh_at: Instant::now() + lifetime,
    });
    info!(target: "identity", expires_in = body.expires_in, "Management token refreshed");
    Ok(body.access_token)
  }
}

/// Map a provider response to `T`, turning error statuses into `IdentityError`.
async fn decode<T: for<'a> Deserialize<'a>>(res: reqwest::Response) -> Result<T, IdentityError> {
  let status = res.status();
  if status == reqwest::StatusCode::UNAUTHORIZED {
    return Err(IdentityError::Unauthorized);
  }
  if !status.is_success() {
    let body = res.text().await.unwrap_or_default();
    return Err(IdentityError::Http { status: status.as_u16(), message: trunc_for_log(&body, ERROR_BODY_MAX) });
  }
  res.json::<T>().await.map_err(|e| IdentityError::Decode(e.to_string()))
}

#[async_trait]
impl IdentityProvider for Auth0 {
  #[instrument(level = "debug", skip(self, token))]
  async fn user_info(&self, token: &str) -> Result<UserInfo, IdentityError> {
    let res = self.client.get(format!("{}/userinfo", self.domain))
      .header(USER_AGENT, "learn-backend/0.1")
      .header(AUTHORIZATION, format!("Bearer {}", token))
      .send().await
      .map_err(|e| IdentityError::Transport(e.to_string()))?;
    let info: UserInfo = decode(res).await?;
    debug!(target: "identity", sub = %info.sub, "Resolved user from token");
    Ok(info)
  }

  #[instrument(level = "debug", skip(self), fields(%sub))]
  async fn user_roles(&self, sub: &str) -> Result<Vec<Role>, IdentityError> {
    let token = self.management_token().await?;
    let res = self.client.get(format!("{}/roles", self.user_url(sub)))
      .header(USER_AGENT, "learn-backend/0.1")
      .header(AUTHORIZATION, format!("Bearer {}", token))
      .send().await
      .map_err(|e| IdentityError::Transport(e.to_string()))?;
    match decode(res).await {
      // A 401 here means our management token was rejected, not the user's.
      Err(IdentityError::Unauthorized) => {
        warn!(target: "identity", "Management token rejected; dropping cache");
        *self.management_token.write().await = None;
        Err(IdentityError::Http { status: 401, message: "management token rejected".into() })
      }
      other => other,
    }
  }

  #[instrument(level = "debug", skip(self, nickname), fields(%sub, nickname_len = nickname.len()))]
  async fn update_nickname(&self, sub: &str, nickname: &str) -> Result<serde_json::Value, IdentityError> {
    let token = self.management_token().await?;
    let res = self.client.patch(self.user_url(sub))
      .header(USER_AGENT, "learn-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", token))
      .json(&serde_json::json!({ "nickname": nickname }))
      .send().await
      .map_err(|e| IdentityError::Transport(e.to_string()))?;
    match decode(res).await {
      Err(IdentityError::Unauthorized) => {
        *self.management_token.write().await = None;
        Err(IdentityError::Http { status: 401, message: "management token rejected".into() })
      }
      other => other,
    }
  }
}
