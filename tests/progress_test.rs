//! Integration tests for watch progress, continue watching and view counts.

mod common;

use common::TestHarness;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn progress_round_trip_and_clamping() {
    let h = TestHarness::with_server().await;
    let token = h.signup("admin").await;
    let heat = h.create_movie(&token, "Heat").await;
    let path = format!("/api/progress/{heat}");

    assert_eq!(h.get(&path, &token).await.status(), StatusCode::NOT_FOUND);

    let resp = h
        .put(&path, &token, json!({ "position_secs": 9000.0, "duration_secs": 600.0 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let saved: Value = resp.json().await.unwrap();
    assert_eq!(saved["position_secs"], 600.0);
    assert_eq!(saved["finished"], true);

    // Omitting the duration keeps the stored one.
    let saved: Value = h
        .put(&path, &token, json!({ "position_secs": 60.0 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(saved["position_secs"], 60.0);
    assert_eq!(saved["duration_secs"], 600.0);
    assert_eq!(saved["finished"], false);

    let resp = h.put(&path, &token, json!({ "position_secs": -1.0 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(h.delete(&path, &token).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.delete(&path, &token).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn continue_watching_skips_finished_titles() {
    let h = TestHarness::with_server().await;
    let token = h.signup("admin").await;
    let started = h.create_movie(&token, "Started").await;
    let finished = h.create_movie(&token, "Finished").await;
    let unknown = h.create_movie(&token, "Unknown length").await;
    let untouched = h.create_movie(&token, "Untouched").await;

    for (id, position, duration) in [
        (&started, 100.0, Some(1000.0)),
        (&finished, 990.0, Some(1000.0)),
        (&unknown, 42.0, None),
        (&untouched, 0.0, Some(1000.0)),
    ] {
        let mut body = json!({ "position_secs": position });
        if let Some(d) = duration {
            body["duration_secs"] = json!(d);
        }
        let resp = h.put(&format!("/api/progress/{id}"), &token, body).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let items: Value = h
        .get("/api/progress/continue", &token)
        .await
        .json()
        .await
        .unwrap();
    let mut names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["title"]["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Started", "Unknown length"]);
}

#[tokio::test]
async fn progress_is_scoped_to_the_profile() {
    let h = TestHarness::with_server().await;
    let token = h.signup("admin").await;
    let heat = h.create_movie(&token, "Heat").await;
    h.put(
        &format!("/api/progress/{heat}"),
        &token,
        json!({ "position_secs": 30.0 }),
    )
    .await;

    let other: Value = h
        .post("/api/profiles", &token, json!({ "name": "Other" }))
        .await
        .json()
        .await
        .unwrap();
    let other = other["id"].as_str().unwrap();
    h.post(&format!("/api/profiles/{other}/select"), &token, json!({}))
        .await;

    let resp = h.get(&format!("/api/progress/{heat}"), &token).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn views_are_counted_per_day() {
    let h = TestHarness::with_server().await;
    let token = h.signup("admin").await;
    let heat = h.create_movie(&token, "Heat").await;

    let mut last = Value::Null;
    for _ in 0..3 {
        let resp = h
            .post(&format!("/api/titles/{heat}/view"), &token, json!({}))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        last = resp.json().await.unwrap();
    }
    assert_eq!(last["count"], 3);

    let detail: Value = h
        .get(&format!("/api/titles/{heat}"), &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["total_views"], 3);

    let missing = mq_core::TitleId::new();
    let resp = h
        .post(&format!("/api/titles/{missing}/view"), &token, json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
