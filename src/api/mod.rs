//! API layer - HTTP handlers and routing
//!
//! All JSON endpoints are mounted under `/api/v1`:
//! - Auth and profile endpoints
//! - Listings, images and favorites
//! - Plans and subscriptions
//! - Contact and quote lead forms
//! - Site settings
//! - Admin endpoints
//! - Listing assistant
//!
//! `/` and `/health` sit at the root and uploads are served from `/media`.

pub mod admin;
pub mod assistant;
pub mod auth;
pub mod common;
pub mod contact;
pub mod favorites;
pub mod health;
pub mod listings;
pub mod middleware;
pub mod plans;
pub mod profile;
pub mod quotes;
pub mod settings;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState};

/// Files accepted in one image upload request
const MAX_FILES_PER_UPLOAD: u64 = 10;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let upload_limit = state
        .upload_config
        .max_file_size
        .saturating_mul(MAX_FILES_PER_UPLOAD);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .nest("/contact", contact::admin_router())
        .nest("/quotes", quotes::admin_router())
        .nest("/settings", settings::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/profile", profile::router())
        .nest(
            "/listings",
            listings::protected_router().layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest("/favorites", favorites::router())
        .nest("/plans", plans::protected_router())
        .nest("/ai", assistant::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes that show more to a signed-in viewer
    let viewer_routes = Router::new()
        .nest("/listings", listings::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/plans", plans::public_router())
        .nest("/contact", contact::public_router())
        .nest("/quotes", quotes::public_router())
        .nest("/settings", settings::public_router())
        .nest("/ai", assistant::public_router())
        .merge(viewer_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins).allow_credentials(true)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let media = ServeDir::new(&state.upload_config.path);

    Router::new()
        .merge(health::router())
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/media", media)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::repositories::fixtures::migrated_pool;
    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    async fn test_app() -> (Router, tempfile::TempDir) {
        test_app_with(|_| {}).await
    }

    async fn test_app_with(adjust: impl FnOnce(&mut Config)) -> (Router, tempfile::TempDir) {
        let media = tempfile::tempdir().expect("Failed to create media dir");
        let mut config = Config::default();
        config.security.secret_key = "router-test-secret-key-of-sufficient-length".to_string();
        config.upload.path = media.path().to_path_buf();
        adjust(&mut config);

        let state = AppState::new(migrated_pool().await, config).expect("Failed to build state");
        (build_router(state), media)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("Request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("Failed to build request")
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).expect("Failed to build request")
    }

    /// Attach the socket peer the way `into_make_service_with_connect_info` does
    fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
        let peer: SocketAddr = peer.parse().expect("invalid peer address");
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    fn quote_request(phone_suffix: usize) -> Request<Body> {
        json_request(
            Method::POST,
            "/api/v1/quotes",
            None,
            json!({"style": "modern", "city": "Dammam", "phone": format!("05000000{:02}", phone_suffix)}),
        )
    }

    fn contact_request() -> Request<Body> {
        json_request(
            Method::POST,
            "/api/v1/contact",
            None,
            json!({
                "name": "Noura",
                "email": "noura@kitchentech.sa",
                "message_type": "suggestion",
                "message": "Please add more cities",
            }),
        )
    }

    async fn register_and_login(app: &Router, name: &str, role: &str) -> String {
        let (status, _) = send(
            app,
            json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({
                    "email": format!("{}@kitchentech.sa", name),
                    "username": name,
                    "password": "correct-horse-battery",
                    "role": role,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let form = format!(
            "username={}%40kitchentech.sa&password=correct-horse-battery",
            name
        );
        let (status, body) = send(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .expect("Failed to build request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"]
            .as_str()
            .expect("missing access_token")
            .to_string()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (app, _media) = test_app().await;

        let (status, body) = send(&app, get("/", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "operational");

        let (status, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["debug_mode"], true);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (app, _media) = test_app().await;

        let (status, body) = send(&app, get("/api/v1/profile/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = send(&app, get("/api/v1/profile/me", Some("not-a-token"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_then_profile() {
        let (app, _media) = test_app().await;
        let token = register_and_login(&app, "layla", "advertiser").await;

        let (status, body) = send(&app, get("/api/v1/profile/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "layla@kitchentech.sa");
        assert_eq!(body["role"], "advertiser");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_admin_routes_reject_non_admin() {
        let (app, _media) = test_app().await;
        let token = register_and_login(&app, "omar", "client").await;

        let (status, body) = send(&app, get("/api/v1/admin/dashboard/stats", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], middleware::ADMIN_REQUIRED_MESSAGE);

        let (status, _) = send(&app, get("/api/v1/quotes/stats", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_new_listing_is_hidden_until_approved() {
        let (app, _media) = test_app().await;
        let token = register_and_login(&app, "sara", "advertiser").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/listings",
                Some(&token),
                json!({"title": "Commercial kitchen", "price": 150.0, "city": "Riyadh"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        let id = body["id"].as_i64().expect("missing id");

        let (status, body) = send(&app, get("/api/v1/listings", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(0));

        let (status, _) = send(&app, get(&format!("/api/v1/listings/{}", id), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let images = format!("/api/v1/listings/{}/images", id);
        let (status, _) = send(&app, get(&images, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send(&app, get(&images, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(0));

        let (status, body) = send(&app, get("/api/v1/listings?owner_id=me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_quote_submission_and_validation() {
        let (app, _media) = test_app().await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/quotes",
                None,
                json!({"style": "modern", "city": "Riyadh", "phone": "0512345678"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["city"], "riyadh");
        assert_eq!(body["status"], "new");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/quotes",
                None,
                json!({"style": "modern", "city": "Riyadh", "phone": "0612345678"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_public_settings_and_assistant() {
        let (app, _media) = test_app().await;

        let (status, body) = send(&app, get("/api/v1/settings/public", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_array());

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/ai/generate-description",
                None,
                json!({"title": "Kitchen", "city": "Jeddah", "type": "new", "material": "wood"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["description"].as_str().is_some_and(|d| d.contains("Jeddah")));

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/ai/suggest-price",
                None,
                json!({"kitchen_type": "home", "city": "Abha"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_rejects_taken_phone_in_any_format() {
        let (app, _media) = test_app().await;
        let register = |name: &str, phone: &str| {
            json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({
                    "email": format!("{}@kitchentech.sa", name),
                    "username": name,
                    "password": "correct-horse-battery",
                    "phone": phone,
                }),
            )
        };

        let (status, body) = send(&app, register("huda", "0512345678")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["phone"], "0512345678");

        let (status, body) = send(&app, register("reem", "051 234 5678")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Email or username already registered");
    }

    #[tokio::test]
    async fn test_lead_limit_shared_by_quotes_and_contact() {
        let (app, _media) = test_app().await;
        let peer = "198.51.100.1:40000";

        for i in 0..10 {
            let (status, _) = send(&app, from_peer(quote_request(i), peer)).await;
            assert_eq!(status, StatusCode::CREATED, "quote {} should pass", i);
        }

        let (status, body) = send(&app, from_peer(quote_request(10), peer)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMIT");
        assert!(body["error"]["details"]["retry_after"]
            .as_i64()
            .is_some_and(|secs| secs > 0));

        let (status, body) = send(&app, from_peer(contact_request(), peer)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMIT");

        let (status, _) = send(&app, from_peer(contact_request(), "198.51.100.2:40000")).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_forwarded_headers_do_not_reset_lead_limit() {
        let (app, _media) = test_app().await;
        let mut statuses = Vec::new();
        for i in 0..12 {
            let mut request = from_peer(quote_request(i), "198.51.100.1:40000");
            request.headers_mut().insert(
                "x-forwarded-for",
                HeaderValue::from_str(&format!("203.0.113.{}", i)).expect("valid header"),
            );
            statuses.push(send(&app, request).await.0);
        }
        assert!(statuses[..10].iter().all(|s| *s == StatusCode::CREATED));
        assert!(statuses[10..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_trusted_proxy_limits_per_forwarded_address() {
        let (app, _media) = test_app_with(|c| c.server.trust_proxy = true).await;
        for i in 0..12 {
            let mut request = from_peer(quote_request(i), "10.0.0.1:40000");
            request.headers_mut().insert(
                "x-forwarded-for",
                HeaderValue::from_str(&format!("203.0.113.{}", i)).expect("valid header"),
            );
            let (status, _) = send(&app, request).await;
            assert_eq!(status, StatusCode::CREATED, "quote {} should pass", i);
        }
    }
}
