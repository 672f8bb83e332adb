use axum::{extract::Path, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::extract::ApiQuery;
use crate::data::metro::{self, Station};

#[derive(Debug, Deserialize)]
pub struct MetroQuery {
    #[serde(default)]
    pub query: String,
}

pub async fn stations() -> Json<Vec<&'static str>> {
    Json(metro::names())
}

pub async fn search(ApiQuery(q): ApiQuery<MetroQuery>) -> Json<Vec<&'static Station>> {
    Json(metro::search(&q.query))
}

pub async fn station(Path(name): Path<String>) -> Result<Json<&'static Station>, ApiError> {
    metro::find(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Metro station not found".into()))
}
