use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tower::ServiceExt;

use crate::scoring::domain::ResultCode;
use crate::scoring::memory::InMemorySnapshotStore;
use crate::scoring::{scoring_router, RecalculationCoordinator};

const WAIT: Duration = Duration::from_secs(5);

fn router() -> (Router, Arc<MemoryCoordinator>) {
    let coordinator = memory_coordinator();
    (scoring_router(coordinator.clone(), WAIT), coordinator)
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::put(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn recompute_returns_published_standings() {
    let (router, coordinator) = router();
    for result in corrected_series() {
        coordinator.record_result(result).expect("result recorded");
    }

    let response = router
        .clone()
        .oneshot(post("/api/v1/regattas/spring-series/recompute"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["generation"], 1);
    assert_eq!(body["standings"][0]["entry_id"], "A");
    assert_eq!(body["standings"][0]["net_points"], "4");
    assert_eq!(body["standings"][2]["net_points"], "10");

    let response = router
        .oneshot(get("/api/v1/regattas/spring-series/standings"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let cached = read_json_body(response).await;
    assert_eq!(cached["generation"], 1);
}

#[tokio::test]
async fn standings_before_first_publish_is_not_found() {
    let (router, _) = router();
    let response = router
        .oneshot(get("/api/v1/regattas/spring-series/standings"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["regatta_id"], "spring-series");
}

#[tokio::test]
async fn unknown_regatta_recompute_is_not_found() {
    let (router, _) = router();
    let response = router
        .oneshot(post("/api/v1/regattas/nowhere/recompute"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn result_submission_is_accepted_and_scored() {
    let (router, _) = router();
    let response = router
        .clone()
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/races/1/results/A",
            json!({ "position": 1 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["race"], 1);

    let response = router
        .oneshot(post("/api/v1/regattas/spring-series/recompute"))
        .await
        .expect("router responds");
    let body = read_json_body(response).await;
    assert_eq!(body["races_scored"], 1);
    assert_eq!(body["standings"][0]["entry_id"], "A");
}

#[tokio::test]
async fn inconsistent_result_is_unprocessable() {
    let (router, _) = router();
    let response = router
        .clone()
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/races/1/results/A",
            json!({ "status": "DNF", "position": 4 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/races/0/results/A",
            json!({ "position": 1 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_positions_report_collisions() {
    let (router, coordinator) = router();
    coordinator.record_result(finish(1, "A", 2)).expect("recorded");
    coordinator.record_result(finish(1, "B", 2)).expect("recorded");

    let response = router
        .oneshot(post("/api/v1/regattas/spring-series/recompute"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["race"], 1);
    assert_eq!(
        body["collisions"],
        json!([{ "position": 2, "entries": ["A", "B"] }])
    );
}

#[tokio::test]
async fn scoring_config_requires_rescore_once_results_exist() {
    let (router, coordinator) = router();
    let config = json!({ "discard_schedule": [{ "from_races": 1, "discards": 0 }] });

    let response = router
        .clone()
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/scoring-config",
            config.clone(),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for result in corrected_series() {
        coordinator.record_result(result).expect("result recorded");
    }
    let response = router
        .clone()
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/scoring-config",
            config.clone(),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/scoring-config?rescore=true",
            json!({ "discard_schedule": [{ "from_races": 4, "discards": 1 }] }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["discards"], 1);

    let response = router
        .oneshot(put_json(
            "/api/v1/regattas/spring-series/scoring-config?rescore=true",
            json!({ "discard_schedule": [] }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn exports_render_csv_and_json() {
    let (router, coordinator) = router();
    for result in corrected_series() {
        coordinator.record_result(result).expect("result recorded");
    }
    coordinator.recompute(&regatta()).expect("scores");

    let response = router
        .clone()
        .oneshot(get(
            "/api/v1/regattas/spring-series/export/standings?format=csv",
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let csv = read_text_body(response).await;
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("position,sail_number,boat_name,net_points,total_points,races_sailed")
    );
    assert_eq!(lines.next(), Some("1,GBR 1,Boat A,4,7,4"));

    let response = router
        .oneshot(get("/api/v1/regattas/spring-series/export/results"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let rows = read_json_body(response).await;
    assert_eq!(rows.as_array().map(Vec::len), Some(12));
    assert_eq!(rows[2]["status"], "finished");
    assert_eq!(rows[2]["position"], 3);
}

#[tokio::test]
async fn export_before_publish_is_not_found() {
    let (router, _) = router();
    let response = router
        .oneshot(get("/api/v1/regattas/spring-series/export/results?format=csv"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn busy_regatta_answers_conflict() {
    let store = GatedResultStore::new(seeded_store(), regatta());
    record_all(&store.inner, corrected_series());
    let coordinator = Arc::new(RecalculationCoordinator::new(
        Arc::new(store.clone()),
        Arc::new(InMemorySnapshotStore::default()),
    ));
    let router = scoring_router(coordinator.clone(), Duration::from_millis(50));

    let running = {
        let coordinator = coordinator.clone();
        thread::spawn(move || coordinator.recompute(&regatta()))
    };
    store.wait_for_loads(1);

    let response = router
        .clone()
        .oneshot(post("/api/v1/regattas/spring-series/recompute?wait=false"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(post("/api/v1/regattas/spring-series/recompute"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["regatta_id"], "spring-series");

    store.open();
    running
        .join()
        .expect("thread joins")
        .expect("recompute completes");

    let response = router
        .oneshot(get("/api/v1/regattas/spring-series/standings"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unrepresentable_point_totals_are_unprocessable() {
    let (router, coordinator) = router();
    for race in 1..=2 {
        coordinator
            .record_result(code(race, "A", ResultCode::Dsq).with_override(Decimal::MAX))
            .expect("result recorded");
    }

    let response = router
        .oneshot(post("/api/v1/regattas/spring-series/recompute"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["entry_id"], "A");
}
