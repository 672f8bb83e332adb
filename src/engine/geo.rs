use serde::Serialize;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Radius used when a profile has a center but no radius yet.
pub const DEFAULT_RADIUS_M: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Returns `None` for out-of-range or non-finite coordinates.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        (valid_lat(lat) && valid_lon(lon)).then_some(Self { lat, lon })
    }
}

pub fn valid_lat(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn valid_lon(lon: f64) -> bool {
    lon.is_finite() && (-180.0..=180.0).contains(&lon)
}

/// Great-circle distance in meters (Haversine).
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    pub center: GeoPoint,
    pub radius_m: f64,
}

impl SearchArea {
    pub fn new(center: GeoPoint, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    pub fn distance_to(&self, other: &SearchArea) -> f64 {
        haversine_m(self.center, other.center)
    }

    /// Two search circles overlap (touching counts).
    pub fn intersects(&self, other: &SearchArea) -> bool {
        self.distance_to(other) <= self.radius_m + other.radius_m
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        haversine_m(self.center, point) <= self.radius_m
    }
}
