use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Datelike, NaiveDate, Weekday};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use calendar::{calendar::CalendarService, http::router, storage::MemoryStorage};

fn app() -> Router {
    router(Arc::new(CalendarService::new(Arc::new(MemoryStorage::new()))))
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn meeting(user_id: u64, on: &str, off: &str) -> Value {
    json!({
        "user_id": user_id,
        "title": "planning",
        "description": "sprint 12",
        "on_time": on,
        "off_time": off,
    })
}

#[tokio::test]
async fn health_answers_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn insert_lookup_and_conflict() {
    let app = app();
    let (status, body) = post(
        &app,
        "/v1/events/insert",
        meeting(3, "2024-05-15T10:00:00Z", "2024-05-15T11:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);

    let (status, body) = post(&app, "/v1/events/lookup", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "planning");
    assert_eq!(body["user_id"], 3);
    assert_eq!(body["notified"], false);

    let (status, body) = post(
        &app,
        "/v1/events/insert",
        meeting(3, "2024-05-15T10:30:00Z", "2024-05-15T12:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("busy"));
}

#[tokio::test]
async fn validation_errors_are_bad_requests() {
    let app = app();
    let (status, body) = post(
        &app,
        "/v1/events/insert",
        json!({ "user_id": 3, "title": "no times" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("on_time"));

    let (status, _) = post(
        &app,
        "/v1/events/update",
        meeting(3, "2024-05-15T10:00:00Z", "2024-05-15T11:00:00Z"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/v1/events/list", json!({ "user_id": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_delete_and_not_found() {
    let app = app();
    post(
        &app,
        "/v1/events/insert",
        meeting(3, "2024-05-15T10:00:00Z", "2024-05-15T11:00:00Z"),
    )
    .await;

    let mut changed = meeting(3, "2024-05-15T14:00:00Z", "2024-05-15T15:00:00Z");
    changed["id"] = json!(1);
    changed["title"] = json!("planning, moved");
    let (status, body) = post(&app, "/v1/events/update", changed).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["msg"].is_string());

    let mut ghost = meeting(3, "2024-05-16T14:00:00Z", "2024-05-16T15:00:00Z");
    ghost["id"] = json!(99);
    let (status, _) = post(&app, "/v1/events/update", ghost).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/v1/events/delete", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(&app, "/v1/events/delete", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/v1/events/lookup", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn period_listings() {
    let app = app();
    for (on, off) in [
        ("2024-05-13T09:00:00Z", "2024-05-13T10:00:00Z"),
        ("2024-05-15T09:00:00Z", "2024-05-15T10:00:00Z"),
        ("2024-05-28T09:00:00Z", "2024-05-28T10:00:00Z"),
    ] {
        let (status, _) = post(&app, "/v1/events/insert", meeting(8, on, off)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let query = json!({ "user_id": 8, "date": "2024-05-15T18:00:00Z" });
    let count = |body: &Value| body["events"].as_array().map(Vec::len).unwrap_or(0);

    let (status, body) = post(&app, "/v1/events/list/day", query.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&body), 1);

    let (_, body) = post(&app, "/v1/events/list/week", query.clone()).await;
    assert_eq!(count(&body), 2);

    let (_, body) = post(&app, "/v1/events/list/month", query).await;
    assert_eq!(count(&body), 3);

    let (_, body) = post(&app, "/v1/events/list", json!({ "user_id": 8 })).await;
    assert_eq!(count(&body), 3);
    assert_eq!(body["events"][0]["on_time"], "2024-05-13T09:00:00Z");
}

#[tokio::test]
async fn listings_at_the_last_supported_date() {
    let app = app();
    let last = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap().and_utc();
    let query = json!({ "user_id": 8, "date": last });

    let (status, body) = post(&app, "/v1/events/list/month", query.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"], json!([]));

    let (status, body) = post(&app, "/v1/events/list/week", query).await;
    if NaiveDate::MAX.weekday() == Weekday::Sun {
        assert_eq!(status, StatusCode::OK);
    } else {
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("date"));
    }
}
