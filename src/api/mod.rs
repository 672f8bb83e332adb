pub mod auth;
pub mod error;
pub mod extract;
pub mod listings;
pub mod metro;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use teloxide::Bot;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Db;

pub struct AppState {
    pub db: Arc<Db>,
    pub config: Arc<Config>,
    /// Sends match notices; `None` when the bot is not running.
    pub notifier: Option<Bot>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut api = Router::new()
        .route("/metro/stations", get(metro::stations))
        .route("/metro/search", get(metro::search))
        .route("/metro/station/{name}", get(metro::station))
        .route("/users/", post(users::upsert_profile))
        .route("/users/secure", post(users::upsert_profile))
        .route("/users/me", get(users::me))
        .route("/users/me/secure", get(users::me_secure))
        .route("/users/profile", put(users::update_profile))
        .route("/users/profile/secure", put(users::upsert_profile))
        .route("/users/potential-matches", get(users::potential_matches))
        .route("/users/matches", get(users::matches))
        .route("/users/{id}/like", post(users::like_user))
        .route("/users/{id}/liked-listings", get(users::matched_user_liked_listings))
        .route("/listings/", get(listings::search))
        .route("/listings/search", get(listings::search_for_user))
        .route("/listings/liked", get(listings::liked))
        .route("/listings/{id}/like", post(listings::like_listing));

    if state.config.debug_routes {
        api = api.route("/debug/intersections", get(users::intersections));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Social Rent API is running" }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.ping() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy", "database": "ok" }))),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "database": "error" })),
            )
        }
    }
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::tests::{signed_init_data, user_json, BOT_TOKEN};
    use crate::db::repository::tests::listing;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state_with(config: Config) -> Arc<AppState> {
        Arc::new(AppState {
            db: Arc::new(Db::new(":memory:").unwrap()),
            config: Arc::new(config),
            notifier: None,
        })
    }

    fn test_app() -> (Router, Arc<AppState>) {
        let state = state_with(Config::for_tests(BOT_TOKEN));
        (router(state.clone()), state)
    }

    fn bearer(telegram_id: i64, name: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        format!("Bearer {}", signed_init_data(BOT_TOKEN, &user_json(telegram_id, name), now))
    }

    fn request(method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Create a profile through the API and return its id.
    async fn create_profile(app: &Router, auth: &str, body: Value) -> String {
        let (status, json) = send(app, request(Method::POST, "/api/users/secure", Some(auth), Some(body))).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn root_and_health() {
        let (app, _) = test_app();
        let (status, json) = send(&app, request(Method::GET, "/", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Social Rent API is running");

        let (status, json) = send(&app, request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "status": "healthy", "database": "ok" }));
    }

    #[tokio::test]
    async fn metro_catalog_routes() {
        let (app, _) = test_app();
        let (status, json) = send(&app, request(Method::GET, "/api/metro/stations", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().iter().any(|n| n == "Лубянка"));

        let q: String = url::form_urlencoded::byte_serialize("вднх".as_bytes()).collect();
        let (status, json) = send(&app, request(Method::GET, &format!("/api/metro/search?query={q}"), None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["name"], "ВДНХ");

        let (status, json) = send(&app, request(Method::GET, "/api/metro/station/Atlantis", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Metro station not found");
    }

    #[tokio::test]
    async fn auth_is_required() {
        let (app, _) = test_app();
        let resp = app
            .clone()
            .oneshot(request(Method::GET, "/api/users/me", None, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let (status, _) = send(
            &app,
            request(Method::GET, "/api/users/me", Some("Bearer user=%7B%22id%22%3A1%7D&hash=00"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_lifecycle() {
        let (app, _) = test_app();
        let auth = bearer(501, "Анна");

        let (status, json) = send(&app, request(Method::GET, "/api/users/me", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "User profile not found. Please create your profile first.");

        create_profile(
            &app,
            &auth,
            json!({ "age": 25, "price_min": 30000, "price_max": 60000, "metro_station": "Лубянка" }),
        )
        .await;

        let (status, json) = send(&app, request(Method::GET, "/api/users/me", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["telegram_id"], 501);
        assert_eq!(json["first_name"], "Анна");
        assert_eq!(json["metro_station"], "Лубянка");
        assert_eq!(json["lat"], 55.7609);

        let (status, json) = send(
            &app,
            request(Method::PUT, "/api/users/profile", Some(&auth), Some(json!({ "bio": "Тихая", "search_radius": 2500 }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["bio"], "Тихая");
        assert_eq!(json["search_radius"], 2500);
        assert_eq!(json["age"], 25);

        let (status, _) = send(
            &app,
            request(Method::PUT, "/api/users/profile", Some(&auth), Some(json!({ "age": 17 }))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn me_secure_creates_identity() {
        let (app, state) = test_app();
        let auth = bearer(777, "Олег");
        let (status, json) = send(&app, request(Method::GET, "/api/users/me/secure", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["username"], "u777");
        assert!(state.db.get_user_by_telegram_id(777).unwrap().is_some());
    }

    #[tokio::test]
    async fn likes_become_matches() {
        let (app, state) = test_app();
        let (a_auth, b_auth, c_auth) = (bearer(1, "A"), bearer(2, "B"), bearer(3, "C"));
        let near = json!({ "lat": 55.7558, "lon": 37.6173, "search_radius": 2000 });
        let a = create_profile(&app, &a_auth, near.clone()).await;
        let b = create_profile(&app, &b_auth, near.clone()).await;
        create_profile(&app, &c_auth, near).await;

        let (status, json) = send(&app, request(Method::GET, "/api/users/potential-matches", Some(&a_auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["distance"], 0.0);

        let (_, json) = send(&app, request(Method::POST, &format!("/api/users/{b}/like"), Some(&a_auth), None)).await;
        assert_eq!(json, json!({ "liked": true, "match": false, "message": "Like sent!" }));

        let (_, json) = send(&app, request(Method::GET, "/api/users/potential-matches", Some(&a_auth), None)).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let listing_id = state.db.insert_listing(&listing("Студия", 40_000, 55.756, 37.617)).unwrap();
        let (status, json) = send(&app, request(Method::POST, &format!("/api/listings/{listing_id}/like"), Some(&b_auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "liked": true }));

        let liked_uri = format!("/api/users/{b}/liked-listings");
        let (status, _) = send(&app, request(Method::GET, &liked_uri, Some(&a_auth), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, json) = send(&app, request(Method::POST, &format!("/api/users/{a}/like"), Some(&b_auth), None)).await;
        assert_eq!(json["match"], true);
        assert_eq!(json["message"], "It's a match! 🎉");

        let (_, json) = send(&app, request(Method::POST, &format!("/api/users/{a}/like"), Some(&b_auth), None)).await;
        assert_eq!(json, json!({ "already_liked": true, "match": false }));

        let (_, json) = send(&app, request(Method::GET, "/api/users/matches", Some(&a_auth), None)).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["user"]["id"], b.as_str());

        let (status, json) = send(&app, request(Method::GET, &liked_uri, Some(&a_auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["id"], listing_id.as_str());
        assert_eq!(json[0]["is_liked"], false);

        send(&app, request(Method::POST, &format!("/api/listings/{listing_id}/like"), Some(&a_auth), None)).await;
        let (_, json) = send(&app, request(Method::GET, &liked_uri, Some(&a_auth), None)).await;
        assert_eq!(json[0]["is_liked"], true);
    }

    #[tokio::test]
    async fn rejected_profile_creates_no_user() {
        let (app, state) = test_app();
        let auth = bearer(601, "Ира");
        let (status, json) = send(&app, request(Method::POST, "/api/users/", Some(&auth), Some(json!({ "age": 17 })))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["detail"].is_string());
        assert!(state.db.get_user_by_telegram_id(601).unwrap().is_none());

        let (status, _) = send(
            &app,
            request(Method::POST, "/api/users/", Some(&auth), Some(json!({ "price_min": 50000, "price_max": 10000 }))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.db.get_user_by_telegram_id(601).unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_input_is_a_json_422() {
        let (app, _) = test_app();
        let auth = bearer(602, "Петя");
        create_profile(&app, &auth, json!({ "lat": 55.75, "lon": 37.61, "search_radius": 1000 })).await;

        let cases = [
            request(Method::PUT, "/api/users/profile", Some(&auth), Some(json!({ "age": "abc" }))),
            request(Method::GET, "/api/users/potential-matches?limit=-1", Some(&auth), None),
            request(Method::GET, "/api/listings/?lat=abc&lon=1", None, None),
        ];
        for req in cases {
            let uri = req.uri().to_string();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json", "{uri}");
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let json: Value = serde_json::from_slice(&bytes).unwrap();
            assert!(json["detail"].as_str().is_some_and(|d| !d.is_empty()), "{uri}");
        }

        let bad_syntax = Request::builder()
            .method(Method::POST)
            .uri("/api/users/")
            .header(header::AUTHORIZATION, &auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(&app, bad_syntax).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn like_rejects_bad_targets() {
        let (app, _) = test_app();
        let auth = bearer(10, "A");
        let me = create_profile(&app, &auth, json!({})).await;

        let (status, json) = send(&app, request(Method::POST, "/api/users/not-a-uuid/like", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["detail"], "Invalid user ID format");

        let (status, _) = send(&app, request(Method::POST, &format!("/api/users/{me}/like"), Some(&auth), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, request(Method::POST, &format!("/api/users/{missing}/like"), Some(&auth), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = send(&app, request(Method::POST, "/api/listings/xyz/like", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["detail"], "Invalid listing ID format");

        let (status, _) = send(&app, request(Method::POST, &format!("/api/listings/{missing}/like"), Some(&auth), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn public_listing_search() {
        let (app, state) = test_app();
        state.db.insert_listing(&listing("far", 50_000, 55.7600, 37.6300)).unwrap();
        state.db.insert_listing(&listing("near", 50_000, 55.7510, 37.6180)).unwrap();
        state.db.insert_listing(&listing("pricey", 500_000, 55.7505, 37.6175)).unwrap();

        let (status, json) = send(
            &app,
            request(Method::GET, "/api/listings/?lat=55.75&lon=37.617&radius=2000&price_max=100000", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = json.as_array().unwrap().iter().map(|l| l["title"].as_str().unwrap()).collect();
        assert_eq!(titles, ["near", "far"]);
        assert!(json[0]["distance"].as_f64().unwrap() < 0.5);

        let (status, json) = send(&app, request(Method::GET, "/api/listings/", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["title"], "pricey");
        assert!(json[0]["distance"].is_null());

        let (status, _) = send(&app, request(Method::GET, "/api/listings/?lat=55.75", None, None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn personal_listing_search_marks_likes() {
        let (app, state) = test_app();
        let auth = bearer(20, "A");

        let (status, _) = send(&app, request(Method::GET, "/api/listings/search", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        create_profile(&app, &auth, json!({ "metro_station": "Охотный Ряд", "price_max": 80000 })).await;
        let inside = state.db.insert_listing(&listing("inside", 60_000, 55.7570, 37.6150)).unwrap();
        state.db.insert_listing(&listing("too far", 60_000, 55.8500, 37.4000)).unwrap();
        state.db.insert_listing(&listing("too pricey", 90_000, 55.7570, 37.6150)).unwrap();
        send(&app, request(Method::POST, &format!("/api/listings/{inside}/like"), Some(&auth), None)).await;

        let (status, json) = send(&app, request(Method::GET, "/api/listings/search", Some(&auth), None)).await;
        assert_eq!(status, StatusCode::OK);
        let hits = json.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], inside.as_str());
        assert_eq!(hits[0]["is_liked"], true);

        let (_, json) = send(&app, request(Method::POST, &format!("/api/listings/{inside}/like"), Some(&auth), None)).await;
        assert_eq!(json, json!({ "already_liked": true }));

        let (_, json) = send(&app, request(Method::GET, "/api/listings/liked", Some(&auth), None)).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn debug_route_follows_config() {
        let (app, _) = test_app();
        let (status, json) = send(&app, request(Method::GET, "/api/debug/intersections", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_pairs_analyzed"], 0);

        let mut config = Config::for_tests(BOT_TOKEN);
        config.debug_routes = false;
        let hidden = router(state_with(config));
        let (status, _) = send(&hidden, request(Method::GET, "/api/debug/intersections", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
