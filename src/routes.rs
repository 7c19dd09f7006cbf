// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{access, auth, session},
    state::AppState,
    utils::jwt::{auth_middleware, session_manager_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, access, sessions, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (config, stores, live sessions).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let access_routes = Router::new()
        .route("/menu", get(access::get_menu))
        .route("/menu/{menu_id}", get(access::check_menu))
        .route("/permissions", get(access::get_permission_catalog))
        .route("/check", get(access::check_permission))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let session_routes = Router::new()
        .route("/", post(session::start_session))
        .route("/{id}", get(session::get_session))
        .route("/{id}/answers/{index}", put(session::select_answer))
        .route("/{id}/review/{index}", post(session::toggle_review))
        .route("/{id}/navigate", post(session::navigate))
        .route("/{id}/connectivity", post(session::set_connectivity))
        .route("/{id}/save", post(session::save_progress))
        .route("/{id}/exit", post(session::exit_session))
        .route("/{id}/submit", post(session::submit_session))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/sessions/{id}/pause", post(session::pause_session))
        .route("/sessions/{id}/resume", post(session::resume_session))
        // Double middleware protection: Auth first, then session-manager check
        .layer(middleware::from_fn(session_manager_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/access", access_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        engine::SessionSettings,
        repository::{
            MemoryCatalogStore, MemoryProgressStore, MemorySubmissionService, MemoryUserStore,
        },
        state::Stores,
        utils::jwt::sign_jwt,
    };

    const SECRET: &str = "router-test-secret";

    fn app() -> Router {
        let config = Config {
            database_url: None,
            jwt_secret: SECRET.to_string(),
            jwt_expiration: 60,
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            admin_username: None,
            admin_password: None,
            session: SessionSettings::default(),
        };
        let stores = Stores {
            users: Arc::new(MemoryUserStore::new()),
            catalog: Arc::new(MemoryCatalogStore::new()),
            progress: Arc::new(MemoryProgressStore::new()),
            submissions: Arc::new(MemorySubmissionService::new()),
        };
        create_router(AppState::new(config, stores))
    }

    fn authed_get(uri: &str, role: &str, permissions: Option<Vec<String>>) -> Request<Body> {
        let token = sign_jwt(1, role, permissions, SECRET, 60).unwrap();
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let response = app()
            .oneshot(Request::builder().uri("/api/access/menu").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_role_gets_empty_menu() {
        let response = app()
            .oneshot(authed_get("/api/access/menu", "auditor", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_admin_routes_need_manage_sessions() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/sessions/s-1/pause")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", sign_jwt(1, "enumerator", None, SECRET, 60).unwrap()),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // An override granting the permission passes the guard; the session just isn't live.
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/sessions/s-1/pause")
                    .header(
                        header::AUTHORIZATION,
                        format!(
                            "Bearer {}",
                            sign_jwt(
                                1,
                                "enumerator",
                                Some(vec!["tests.manage_sessions".to_string()]),
                                SECRET,
                                60
                            )
                            .unwrap()
                        ),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_override_decides_for_unknown_role() {
        let overrides = Some(vec!["tests.take".to_string()]);
        let response = app()
            .oneshot(authed_get("/api/access/check?permission=tests.take", "auditor", overrides))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["allowed"], true);
    }

    #[tokio::test]
    async fn test_permission_check_requires_a_name() {
        let response = app()
            .oneshot(authed_get("/api/access/check?permission=", "admin", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
