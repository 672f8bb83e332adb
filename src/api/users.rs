use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::auth::{CurrentUser, TelegramAuth};
use crate::api::error::ApiError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::listings::ListingView;
use crate::api::AppState;
use crate::bot::notifier;
use crate::data::metro;
use crate::db::repository::{LikeOutcome, User};
use crate::engine::geo::{valid_lat, valid_lon, SearchArea, DEFAULT_RADIUS_M};
use crate::engine::matcher::{self, IntersectionSummary};

const DEFAULT_MATCH_LIMIT: usize = 10;
const MAX_MATCH_LIMIT: usize = 100;

/// Editable profile fields. Absent fields leave the stored value untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileInput {
    pub age: Option<i64>,
    pub bio: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub metro_station: Option<String>,
    pub search_radius: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl ProfileInput {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(age) = self.age {
            if !(18..=100).contains(&age) {
                return Err(ApiError::Validation("age must be between 18 and 100".into()));
            }
        }
        if self.price_min.is_some_and(|p| p < 0) || self.price_max.is_some_and(|p| p < 0) {
            return Err(ApiError::Validation("prices must not be negative".into()));
        }
        if self.search_radius.is_some_and(|r| r <= 0) {
            return Err(ApiError::Validation("search_radius must be positive".into()));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                if !valid_lat(lat) || !valid_lon(lon) {
                    return Err(ApiError::Validation("coordinates out of range".into()));
                }
            }
            (None, None) => {}
            _ => return Err(ApiError::Validation("lat and lon must be provided together".into())),
        }
        Ok(())
    }

    /// Merge into `user` and resolve the search center.
    ///
    /// A known metro station wins over explicit coordinates; an unknown one
    /// is stored as typed and the coordinates (if any) are used instead.
    pub fn apply(&self, user: &mut User) -> Result<(), ApiError> {
        self.validate()?;

        if let Some(age) = self.age {
            user.age = Some(age);
        }
        if let Some(bio) = &self.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(p) = self.price_min {
            user.price_min = Some(p);
        }
        if let Some(p) = self.price_max {
            user.price_max = Some(p);
        }
        if let Some(r) = self.search_radius {
            user.search_radius = Some(r);
        }
        if let (Some(min), Some(max)) = (user.price_min, user.price_max) {
            if max < min {
                return Err(ApiError::Validation(
                    "price_max must be greater than or equal to price_min".into(),
                ));
            }
        }

        let station = self.metro_station.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let known = station.and_then(metro::find);
        if let Some(name) = station {
            user.metro_station = Some(known.map_or(name, |s| s.name).to_string());
        }

        if let Some(s) = known {
            user.search_lat = Some(s.lat);
            user.search_lon = Some(s.lon);
        } else if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            if let Some(name) = station {
                tracing::warn!(station = name, "Unknown metro station, using coordinates");
            }
            user.search_lat = Some(lat);
            user.search_lon = Some(lon);
        } else if let Some(name) = station {
            tracing::warn!(station = name, "Unknown metro station, search center unchanged");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub age: Option<i64>,
    pub bio: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub metro_station: Option<String>,
    pub search_radius: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            telegram_id: u.telegram_id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            photo_url: u.photo_url,
            age: u.age,
            bio: u.bio,
            price_min: u.price_min,
            price_max: u.price_max,
            metro_station: u.metro_station,
            search_radius: u.search_radius,
            lat: u.search_lat,
            lon: u.search_lon,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// What other users get to see. `distance` is in kilometers.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub age: Option<i64>,
    pub bio: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub metro_station: Option<String>,
    pub search_radius: Option<i64>,
    pub distance: Option<f64>,
}

impl ProfileView {
    fn new(u: User, distance_m: Option<f64>) -> Self {
        Self {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            photo_url: u.photo_url,
            age: u.age,
            bio: u.bio,
            price_min: u.price_min,
            price_max: u.price_max,
            metro_station: u.metro_station,
            search_radius: u.search_radius,
            distance: distance_m.map(meters_to_km),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchView {
    pub id: String,
    pub user: ProfileView,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub fn meters_to_km(m: f64) -> f64 {
    (m / 10.0).round() / 100.0
}

pub fn parse_id(raw: &str, what: &str) -> Result<String, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID format")))
}

/// Create or refresh the caller from init data, then apply the profile body.
pub async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    TelegramAuth(tg): TelegramAuth,
    ApiJson(input): ApiJson<ProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let saved = state.db.upsert_profile(&tg.identity(), |user| input.apply(user))?;
    tracing::info!(user_id = %saved.id, telegram_id = tg.id, "Profile saved");
    Ok(Json(saved.into()))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(mut user): CurrentUser,
    ApiJson(input): ApiJson<ProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    input.apply(&mut user)?;
    let saved = state.db.save_profile(&user)?;
    Ok(Json(saved.into()))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

pub async fn me_secure(
    State(state): State<Arc<AppState>>,
    TelegramAuth(tg): TelegramAuth,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.db.upsert_identity(&tg.identity())?;
    Ok(Json(user.into()))
}

pub async fn potential_matches(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> Result<Json<Vec<ProfileView>>, ApiError> {
    let Some(center) = me.center() else {
        return Ok(Json(Vec::new()));
    };
    let radius = me.search_radius.map_or(DEFAULT_RADIUS_M, |r| r as f64);
    let area = SearchArea::new(center, radius);
    let limit = q.limit.unwrap_or(DEFAULT_MATCH_LIMIT).clamp(1, MAX_MATCH_LIMIT);

    let candidates = state.db.match_candidates(&me.id)?;
    let ranked = matcher::rank_candidates(&area, candidates, limit);
    Ok(Json(
        ranked
            .into_iter()
            .map(|c| ProfileView::new(c.user, Some(c.distance_m)))
            .collect(),
    ))
}

pub async fn like_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let target_id = parse_id(&raw_id, "user")?;
    if target_id == me.id {
        return Err(ApiError::BadRequest("You cannot like yourself".into()));
    }
    let target = state
        .db
        .get_user(&target_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let body = match state.db.like_user(&me.id, &target.id)? {
        LikeOutcome::AlreadyLiked => json!({ "already_liked": true, "match": false }),
        LikeOutcome::Liked { mutual, new_match } => {
            if new_match {
                tracing::info!(user1 = %me.id, user2 = %target.id, "New match");
                if let Some(bot) = state.notifier.clone() {
                    let notices = notifier::match_notices(&me, &target);
                    tokio::spawn(async move {
                        notifier::send_match_notices(&bot, notices).await;
                    });
                }
            }
            let message = if mutual { "It's a match! 🎉" } else { "Like sent!" };
            json!({ "liked": true, "match": mutual, "message": message })
        }
    };
    Ok(Json(body))
}

pub async fn matches(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
) -> Result<Json<Vec<MatchView>>, ApiError> {
    let records = state.db.matches_for(&me.id)?;
    Ok(Json(
        records
            .into_iter()
            .map(|m| MatchView {
                id: m.id,
                user: ProfileView::new(m.other, None),
                created_at: m.created_at,
            })
            .collect(),
    ))
}

/// Listings liked by a user the caller is matched with.
pub async fn matched_user_liked_listings(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    let other_id = parse_id(&raw_id, "user")?;
    if !state.db.are_matched(&me.id, &other_id)? {
        return Err(ApiError::Forbidden("You can only view liked listings of your matches".into()));
    }
    let listings = state.db.liked_listings(&other_id)?;
    let mine = state.db.liked_listing_ids(&me.id)?;
    Ok(Json(
        listings
            .into_iter()
            .map(|l| {
                let is_liked = mine.contains(&l.id);
                ListingView::new(l, None, is_liked)
            })
            .collect(),
    ))
}

pub async fn intersections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IntersectionSummary>, ApiError> {
    let users = state.db.active_users()?;
    Ok(Json(matcher::analyze_pairs(&users)))
}
