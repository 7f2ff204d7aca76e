use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use cardpool::http::router;
use cardpool::service::AllocationService;
use cardpool::store::{PoolStore, SeatStore};

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("cardpool_test_http");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

async fn app(name: &str, seed: &[(&str, Vec<i64>)]) -> Router {
    let store = Arc::new(PoolStore::open(&test_wal_path(name)).unwrap());
    for (city, ids) in seed {
        store.create_pool(city, ids).await.unwrap();
    }
    router(Arc::new(AllocationService::new(store)))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint() {
    let app = app("health.wal", &[]).await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn find_cards_returns_ranges() {
    let app = app(
        "find.wal",
        &[("hyderabad", vec![101, 102, 103, 105, 106, 107, 108])],
    )
    .await;

    let response = app
        .oneshot(post(
            "/api/cards/find",
            json!({ "cities": ["Hyderabad"], "total_cards": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let ranges = &body["data"][0]["available_ranges"];
    assert_eq!(
        ranges,
        &json!([
            { "start_id": 101, "end_id": 103 },
            { "start_id": 105, "end_id": 107 }
        ])
    );
}

#[tokio::test]
async fn find_cards_rejects_zero_block() {
    let app = app("find_zero.wal", &[("pune", vec![1, 2, 3])]).await;
    let response = app
        .oneshot(post(
            "/api/cards/find",
            json!({ "cities": ["pune"], "total_cards": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn find_cards_unknown_city_is_404() {
    let app = app("find_missing.wal", &[("pune", vec![1, 2, 3])]).await;
    let response = app
        .oneshot(post(
            "/api/cards/find",
            json!({ "cities": ["atlantis"], "total_cards": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn find_cards_no_candidates_is_404() {
    let app = app("find_empty.wal", &[("pune", vec![1, 3, 5])]).await;
    let response = app
        .oneshot(post(
            "/api/cards/find",
            json!({ "cities": ["pune"], "total_cards": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "no continuous sequences of available ids found"
    );
}

#[tokio::test]
async fn book_cards_then_rebook_conflicts() {
    let app = app("book.wal", &[("hyderabad", (101..=110).collect())]).await;
    let book = json!({
        "ranges": [{ "city": "hyderabad", "start_id": 101, "end_id": 103 }]
    });

    let response = app
        .clone()
        .oneshot(post("/api/cards/book", book.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Booking status updated successfully");
    assert_eq!(body["data"]["total_modified"], 3);
    assert_eq!(body["data"]["all_committed"], true);

    // Same selection again: nothing left to flip.
    let response = app.oneshot(post("/api/cards/book", book)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["message"],
        "no ids found or already booked"
    );
}

#[tokio::test]
async fn book_cards_partial_batch_reports_detail() {
    let app = app("book_partial.wal", &[("pune", (1..=10).collect())]).await;

    let response = app
        .clone()
        .oneshot(post(
            "/api/cards/book",
            json!({ "ranges": [{ "city": "pune", "start_id": 1, "end_id": 3 }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/api/cards/book",
            json!({ "ranges": [
                { "city": "pune", "start_id": 1, "end_id": 3 },
                { "city": "pune", "start_id": 5, "end_id": 7 }
            ] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["total_modified"], 3);
    assert_eq!(body["data"]["all_committed"], false);
    assert_eq!(body["data"]["outcomes"][0]["committed"], false);
    assert_eq!(body["data"]["outcomes"][1]["committed"], true);
}

#[tokio::test]
async fn create_pool_and_duplicate() {
    let app = app("pools.wal", &[]).await;
    let create = json!({ "city": "Hyderabad", "id_nos": [101, 102, 103] });

    let response = app
        .clone()
        .oneshot(post("/api/pools", create.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["city"], "hyderabad");
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["available"], 3);

    let response = app.oneshot(post("/api/pools", create)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_seats_and_list_pools() {
    let app = app("seats.wal", &[("pune", vec![1, 2, 3])]).await;

    let response = app
        .clone()
        .oneshot(post("/api/pools/pune/seats", json!({ "id_nos": [3, 4, 5] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["modified_count"], 2);

    let response = app.oneshot(get("/api/pools")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"][0]["city"], "pune");
    assert_eq!(body["data"][0]["total"], 5);
}

#[tokio::test]
async fn mark_booked_range() {
    let app = app("mark.wal", &[("delhi", (9901..=9910).collect())]).await;

    let response = app
        .clone()
        .oneshot(post(
            "/api/pools/delhi/mark-booked",
            json!({ "start_id": 9901, "end_id": 9905 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["modified_count"], 5);
    assert_eq!(body["message"], "IDs from 9901 to 9905 marked as booked");

    // Booked ids no longer surface as candidates.
    let response = app
        .oneshot(post(
            "/api/cards/find",
            json!({ "cities": ["delhi"], "total_cards": 5 }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(
        body["data"][0]["available_ranges"],
        json!([{ "start_id": 9906, "end_id": 9910 }])
    );
}
