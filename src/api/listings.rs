use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::api::extract::ApiQuery;
use crate::api::users::{meters_to_km, parse_id};
use crate::api::AppState;
use crate::db::repository::Listing;
use crate::engine::geo::{GeoPoint, SearchArea, DEFAULT_RADIUS_M};
use crate::engine::nearby;

const DEFAULT_LISTING_LIMIT: usize = 50;
const MAX_LISTING_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
pub struct ListingView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub address: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub rooms: Option<i64>,
    pub area: Option<f64>,
    pub floor: Option<i64>,
    pub total_floors: Option<i64>,
    pub metro_station: Option<String>,
    pub metro_distance: Option<i64>,
    pub photos: Vec<String>,
    pub created_at: String,
    /// Kilometers from the search center.
    pub distance: Option<f64>,
    /// Liked by the caller, not by whoever's list this is.
    pub is_liked: bool,
}

impl ListingView {
    pub fn new(l: Listing, distance_m: Option<f64>, is_liked: bool) -> Self {
        Self {
            id: l.id,
            title: l.title,
            description: l.description,
            price: l.price,
            address: l.address,
            lat: l.lat,
            lon: l.lon,
            rooms: l.rooms,
            area: l.area,
            floor: l.floor,
            total_floors: l.total_floors,
            metro_station: l.metro_station,
            metro_distance: l.metro_distance,
            photos: l.photos,
            created_at: l.created_at,
            distance: distance_m.map(meters_to_km),
            is_liked,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<i64>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub limit: Option<usize>,
}

impl ListingQuery {
    fn area(&self) -> Result<Option<SearchArea>, ApiError> {
        let radius = self.radius.unwrap_or(DEFAULT_RADIUS_M as i64);
        if radius <= 0 {
            return Err(ApiError::Validation("radius must be positive".into()));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon)
                .map(|center| Some(SearchArea::new(center, radius as f64)))
                .ok_or_else(|| ApiError::Validation("coordinates out of range".into())),
            (None, None) => Ok(None),
            _ => Err(ApiError::Validation("lat and lon must be provided together".into())),
        }
    }
}

fn limit_or_default(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LISTING_LIMIT).clamp(1, MAX_LISTING_LIMIT)
}

/// Public listing search; location and price filters are optional.
pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<ListingQuery>,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    let area = q.area()?;
    if q.price_min.is_some_and(|p| p < 0) || q.price_max.is_some_and(|p| p < 0) {
        return Err(ApiError::Validation("prices must not be negative".into()));
    }
    let listings = state.db.active_listings(q.price_min, q.price_max)?;
    let hits = nearby::within_area(listings, area.as_ref(), limit_or_default(q.limit));
    Ok(Json(
        hits.into_iter()
            .map(|h| ListingView::new(h.listing, h.distance_m, false))
            .collect(),
    ))
}

/// Listings inside the caller's own search area and budget.
pub async fn search_for_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    let Some(center) = me.center() else {
        return Ok(Json(Vec::new()));
    };
    let radius = me.search_radius.map_or(DEFAULT_RADIUS_M, |r| r as f64);
    let area = SearchArea::new(center, radius);

    let listings = state.db.active_listings(me.price_min, me.price_max)?;
    let liked = state.db.liked_listing_ids(&me.id)?;
    let hits = nearby::within_area(listings, Some(&area), DEFAULT_LISTING_LIMIT);
    Ok(Json(
        hits.into_iter()
            .map(|h| {
                let is_liked = liked.contains(&h.listing.id);
                ListingView::new(h.listing, h.distance_m, is_liked)
            })
            .collect(),
    ))
}

pub async fn like_listing(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let listing_id = parse_id(&raw_id, "listing")?;
    let listing = state
        .db
        .get_listing(&listing_id)?
        .filter(|l| l.is_active)
        .ok_or_else(|| ApiError::NotFound("Listing not found".into()))?;

    if state.db.like_listing(&me.id, &listing.id)? {
        Ok(Json(json!({ "liked": true })))
    } else {
        Ok(Json(json!({ "already_liked": true })))
    }
}

pub async fn liked(
    State(state): State<Arc<AppState>>,
    CurrentUser(me): CurrentUser,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    let listings = state.db.liked_listings(&me.id)?;
    Ok(Json(
        listings
            .into_iter()
            .map(|l| ListingView::new(l, None, true))
            .collect(),
    ))
}
