mod common;

use axum::extract::State;
use sanjeri_api::routes::health::health_check;

#[tokio::test]
async fn health_check_reports_unreachable_database() {
    let response = health_check(State(common::lazy_state())).await;
    assert_eq!(response.0.message, "Health check");

    let data = serde_json::to_value(response.0.data.expect("health data")).unwrap();
    assert_eq!(data["status"], "ok");
    assert_eq!(data["database"], "unavailable");
}
