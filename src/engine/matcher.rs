use serde::Serialize;

use crate::db::repository::User;
use crate::engine::geo::SearchArea;

pub struct Candidate {
    pub user: User,
    pub distance_m: f64,
}

/// Keep candidates whose search area overlaps `me`, nearest first.
pub fn rank_candidates(me: &SearchArea, candidates: Vec<User>, limit: usize) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter_map(|user| {
            let area = user.search_area()?;
            me.intersects(&area).then(|| Candidate {
                distance_m: me.distance_to(&area),
                user,
            })
        })
        .collect();
    ranked.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    ranked.truncate(limit);
    ranked
}

#[derive(Serialize)]
pub struct PairSide {
    pub id: String,
    pub name: String,
    pub metro_station: Option<String>,
    pub search_radius: f64,
}

#[derive(Serialize)]
pub struct PairReport {
    pub user1: PairSide,
    pub user2: PairSide,
    pub distance_between_centers: f64,
    pub combined_radius: f64,
    pub search_areas_intersect: bool,
}

#[derive(Serialize)]
pub struct IntersectionSummary {
    pub total_pairs_analyzed: usize,
    pub intersecting_pairs: usize,
    pub intersection_details: Vec<PairReport>,
}

/// Pairwise overlap scan over every user with a search area.
pub fn analyze_pairs(users: &[User]) -> IntersectionSummary {
    let located: Vec<(&User, SearchArea)> = users
        .iter()
        .filter_map(|u| u.search_area().map(|a| (u, a)))
        .collect();

    let mut total = 0;
    let mut details = Vec::new();
    for (i, (u1, a1)) in located.iter().enumerate() {
        for (u2, a2) in &located[i + 1..] {
            total += 1;
            if !a1.intersects(a2) {
                continue;
            }
            details.push(PairReport {
                user1: side(u1, a1),
                user2: side(u2, a2),
                distance_between_centers: (a1.distance_to(a2) * 100.0).round() / 100.0,
                combined_radius: a1.radius_m + a2.radius_m,
                search_areas_intersect: true,
            });
        }
    }

    IntersectionSummary {
        total_pairs_analyzed: total,
        intersecting_pairs: details.len(),
        intersection_details: details,
    }
}

fn side(user: &User, area: &SearchArea) -> PairSide {
    PairSide {
        id: user.id.clone(),
        name: user.display_name(),
        metro_station: user.metro_station.clone(),
        search_radius: area.radius_m,
    }
}
