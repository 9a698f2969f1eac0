mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sanjeri_api::{
    app::build_app,
    middleware::auth::{BLOCKED_MESSAGE, ROLE_ADMIN, ROLE_USER, issue_token},
    notify::MemoryMailer,
    routes::create_api_router,
    services::admin_service,
};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    create_api_router().with_state(common::lazy_state())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn cart_requires_a_bearer_token() {
    let response = app()
        .oneshot(Request::get("/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["data"]["error"], "Missing Authorization header");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let response = app()
        .oneshot(
            Request::get("/orders")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = app()
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_app_falls_back_to_json_and_tags_requests() {
    let response = build_app(common::lazy_state())
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["message"], "Not Found");
    assert_eq!(body["data"]["path"], "/api/nope");
}

#[tokio::test]
async fn malformed_json_is_rejected_before_the_service() {
    let response = app()
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"login\":"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

async fn send(app: &Router, method: &str, path: &str, token: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(if method == "POST" { "{}" } else { "" }))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

// Roles and account status are read from the database on every request, so a token
// outlives neither a block nor a deletion.
#[tokio::test]
async fn session_follows_account_state() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        common::skip_notice();
        return Ok(());
    };
    let state = common::db_state(&database_url, Arc::new(MemoryMailer::new()), None).await?;
    let admin = common::create_admin(&state).await?;
    let customer =
        common::create_user(&state, "meera", "meera@example.com", "pass-1234", ROLE_USER).await?;
    let secret = state.config.jwt_secret.clone();
    let token = issue_token(&secret, customer.user_id, ROLE_USER)?;
    let app = create_api_router().with_state(state.clone());

    assert_eq!(send(&app, "GET", "/cart", &token).await.status(), StatusCode::OK);
    for path in ["/admin/dashboard", "/admin/inventory", "/admin/products"] {
        let response = send(&app, "GET", path, &token).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }

    // A token claiming admin does not outrank the stored role.
    let forged = issue_token(&secret, customer.user_id, ROLE_ADMIN)?;
    let response = send(&app, "GET", "/admin/dashboard", &forged).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    admin_service::toggle_user_status(&state, &admin, customer.user_id).await?;
    for (method, path) in [("GET", "/cart"), ("GET", "/orders"), ("POST", "/cart")] {
        let response = send(&app, method, path, &token).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
        let body = body_json(response).await;
        assert_eq!(body["data"]["error"], BLOCKED_MESSAGE);
    }

    admin_service::toggle_user_status(&state, &admin, customer.user_id).await?;
    assert_eq!(send(&app, "GET", "/cart", &token).await.status(), StatusCode::OK);

    admin_service::soft_delete_user(&state, &admin, customer.user_id).await?;
    let response = send(&app, "GET", "/cart", &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["data"]["error"], BLOCKED_MESSAGE);

    let stranger = issue_token(&secret, Uuid::new_v4(), ROLE_USER)?;
    let response = send(&app, "GET", "/cart", &stranger).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["data"]["error"], "Account no longer exists");

    Ok(())
}
