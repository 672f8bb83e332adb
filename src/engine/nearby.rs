use crate::db::repository::Listing;
use crate::engine::geo::{haversine_m, SearchArea};

pub struct NearbyListing {
    pub listing: Listing,
    /// Meters from the search center; `None` when no area was given.
    pub distance_m: Option<f64>,
}

/// Restrict `listings` to `area` and order them nearest first.
/// Without an area the incoming order is kept.
pub fn within_area(listings: Vec<Listing>, area: Option<&SearchArea>, limit: usize) -> Vec<NearbyListing> {
    let mut out: Vec<NearbyListing> = match area {
        Some(area) => {
            let mut hits: Vec<NearbyListing> = listings
                .into_iter()
                .filter_map(|listing| {
                    let at = listing.location();
                    area.contains(at).then(|| NearbyListing {
                        distance_m: Some(haversine_m(area.center, at)),
                        listing,
                    })
                })
                .collect();
            hits.sort_by(|a, b| a.distance_m.unwrap_or(0.0).total_cmp(&b.distance_m.unwrap_or(0.0)));
            hits
        }
        None => listings
            .into_iter()
            .map(|listing| NearbyListing { listing, distance_m: None })
            .collect(),
    };
    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::tests::{listing, mem_db};
    use crate::engine::geo::GeoPoint;

    fn stored(db: &crate::db::Db) -> Vec<Listing> {
        db.active_listings(None, None).unwrap()
    }

    #[test]
    fn keeps_only_listings_inside_radius_nearest_first() {
        let db = mem_db();
        db.insert_listing(&listing("far", 50_000, 55.7600, 37.6300)).unwrap();
        db.insert_listing(&listing("near", 50_000, 55.7510, 37.6180)).unwrap();
        db.insert_listing(&listing("outside", 50_000, 55.9000, 37.4000)).unwrap();

        let area = SearchArea::new(GeoPoint { lat: 55.7500, lon: 37.6170 }, 2_000.0);
        let hits = within_area(stored(&db), Some(&area), 10);

        let titles: Vec<&str> = hits.iter().map(|h| h.listing.title.as_str()).collect();
        assert_eq!(titles, ["near", "far"]);
        assert!(hits[0].distance_m.unwrap() < hits[1].distance_m.unwrap());
    }

    #[test]
    fn without_area_keeps_order_and_limit() {
        let db = mem_db();
        for i in 0..5 {
            db.insert_listing(&listing(&format!("l{i}"), 10_000, 55.75, 37.61)).unwrap();
        }
        let hits = within_area(stored(&db), None, 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].listing.title, "l4");
        assert!(hits.iter().all(|h| h.distance_m.is_none()));
    }
}
