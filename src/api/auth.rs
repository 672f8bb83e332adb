//! Telegram WebApp init-data verification.
//!
//! The web app sends `Authorization: Bearer <initData>`, where `initData` is
//! the raw query string Telegram hands to the WebApp. Its `hash` is
//! `hex(HMAC_SHA256(HMAC_SHA256("WebAppData", bot_token), data_check_string))`
//! with `data_check_string` being every other field as `key=value`, sorted by
//! key and joined by `\n`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::api::{error::ApiError, AppState};
use crate::db::repository::{TelegramIdentity, User};

type HmacSha256 = Hmac<Sha256>;

/// Tolerated clock skew for `auth_date` values from the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl TelegramUser {
    pub fn identity(&self) -> TelegramIdentity<'_> {
        TelegramIdentity {
            telegram_id: self.id,
            username: self.username.as_deref(),
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            photo_url: self.photo_url.as_deref(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No credentials provided")]
    MissingCredentials,
    #[error("Missing hash parameter in init_data")]
    MissingHash,
    #[error("Invalid hash signature")]
    BadSignature,
    #[error("Invalid auth_date")]
    BadAuthDate,
    #[error("Init data expired")]
    Expired,
    #[error("Missing user parameter in init_data")]
    MissingUser,
    #[error("Invalid JSON in user data")]
    BadUser,
}

pub struct InitDataPolicy {
    /// 0 disables the age check.
    pub max_age_secs: i64,
    pub allow_unsigned: bool,
}

fn mac(key: &[u8]) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(key).map_err(|_| AuthError::BadSignature)
}

fn secret_key(bot_token: &str) -> Result<Vec<u8>, AuthError> {
    let mut m = mac(b"WebAppData")?;
    m.update(bot_token.as_bytes());
    Ok(m.finalize().into_bytes().to_vec())
}

pub fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn verify_signature(bot_token: &str, data_check_string: &str, hash: &str) -> Result<(), AuthError> {
    let expected = from_hex(hash).ok_or(AuthError::BadSignature)?;
    let mut m = mac(&secret_key(bot_token)?)?;
    m.update(data_check_string.as_bytes());
    m.verify_slice(&expected).map_err(|_| AuthError::BadSignature)
}

fn check_auth_date(raw: &str, now: i64, max_age_secs: i64) -> Result<(), AuthError> {
    let auth_date: i64 = raw.trim().parse().map_err(|_| AuthError::BadAuthDate)?;
    if auth_date - now > MAX_FUTURE_SKEW_SECS {
        return Err(AuthError::BadAuthDate);
    }
    if max_age_secs > 0 && now - auth_date > max_age_secs {
        return Err(AuthError::Expired);
    }
    Ok(())
}

/// Validate raw init data and return the Telegram user it vouches for.
pub fn validate_init_data(
    init_data: &str,
    bot_token: &str,
    policy: &InitDataPolicy,
    now: i64,
) -> Result<TelegramUser, AuthError> {
    let init_data = init_data.trim();
    if init_data.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    if policy.allow_unsigned && init_data.starts_with('{') {
        return serde_json::from_str(init_data).map_err(|_| AuthError::BadUser);
    }

    let mut fields: BTreeMap<String, String> = url::form_urlencoded::parse(init_data.as_bytes())
        .into_owned()
        .collect();

    match fields.remove("hash") {
        Some(hash) => verify_signature(bot_token, &data_check_string(&fields), &hash)?,
        None if policy.allow_unsigned => {}
        None => return Err(AuthError::MissingHash),
    }

    if let Some(raw) = fields.get("auth_date") {
        check_auth_date(raw, now, policy.max_age_secs)?;
    }

    let user = fields.get("user").ok_or(AuthError::MissingUser)?;
    serde_json::from_str(user).map_err(|_| AuthError::BadUser)
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

fn bearer(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;
    let (scheme, token) = header.split_once(' ').ok_or(AuthError::MissingCredentials)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token.trim())
}

/// Telegram identity proven by the request's init data.
pub struct TelegramAuth(pub TelegramUser);

impl FromRequestParts<Arc<AppState>> for TelegramAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let policy = InitDataPolicy {
            max_age_secs: state.config.auth_max_age_secs,
            allow_unsigned: state.config.allow_unsigned_auth,
        };
        let now = chrono::Utc::now().timestamp();
        let user = bearer(parts)
            .and_then(|token| validate_init_data(token, &state.config.bot_token, &policy, now))
            .inspect_err(|e| tracing::warn!(error = %e, "Telegram auth rejected"))?;
        Ok(TelegramAuth(user))
    }
}

/// Stored profile of the authenticated Telegram user.
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let TelegramAuth(tg) = TelegramAuth::from_request_parts(parts, state).await?;
        state
            .db
            .get_user_by_telegram_id(tg.id)?
            .map(CurrentUser)
            .ok_or_else(|| {
                ApiError::NotFound("User profile not found. Please create your profile first.".into())
            })
    }
}
