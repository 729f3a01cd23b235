use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gigreach_core::status::Phase;

use crate::integration::common::{TEST_API_KEY, setup_test_app, setup_test_app_no_auth};

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "gigreach");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::get("/v1/runs/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::get("/v1/runs/status")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_admin_token_returns_403() {
    let app = setup_test_app_no_auth();

    let response = app
        .router
        .oneshot(
            Request::get("/v1/runs/status")
                .header("authorization", "Bearer any-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn status_starts_not_running() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::get("/v1/runs/status")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["is_running"], false);
    assert_eq!(json["current_phase"], "Not Started");
    assert_eq!(json["progress"], 0);
}

#[tokio::test]
async fn start_while_running_returns_409() {
    let app = setup_test_app();
    app.state
        .status
        .begin_phase(Phase::Discovery, 0, "Starting Phase 1");

    let response = app
        .router
        .oneshot(
            Request::post("/v1/runs")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn results_404_before_any_run() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::get("/v1/runs/results")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn results_download_returns_csv() {
    let app = setup_test_app();
    {
        let config = app.state.config.read().unwrap();
        std::fs::write(
            &config.results_file,
            "City,Title,Link,Post Date,Description,Remote,Email,Default Mail,Gmail,Yahoo,Outlook,AOL,Processed\n",
        )
        .unwrap();
    }

    let response = app
        .router
        .oneshot(
            Request::get("/v1/runs/results")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"City,Title,Link"));
}

#[tokio::test]
async fn config_roundtrip_updates_and_persists() {
    let app = setup_test_app();

    let update = serde_json::json!({
        "keywords": ["rust developer"],
        "batch_size": 5,
        "headless": true
    });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::put("/v1/config")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&update).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(
            Request::get("/v1/config")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["keywords"], serde_json::json!(["rust developer"]));
    assert_eq!(json["batch_size"], 5);
    assert_eq!(json["headless"], true);

    // Persisted for the next process.
    assert!(app.state.config_path.exists());
}

#[tokio::test]
async fn invalid_config_update_returns_400_and_changes_nothing() {
    let app = setup_test_app();

    let update = serde_json::json!({ "search_urls": [] });
    let response = app
        .router
        .clone()
        .oneshot(
            Request::put("/v1/config")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&update).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!app.state.config.read().unwrap().search_urls.is_empty());
}

#[tokio::test]
async fn cleanup_clears_files_and_resets_status() {
    let app = setup_test_app();
    app.state
        .status
        .begin_phase(Phase::Enriching, 50, "Processing 3 listings");
    {
        let config = app.state.config.read().unwrap();
        std::fs::write(&config.links_file, "City,Title,Link,Post Date,Processed\n").unwrap();
        std::fs::write(&config.results_file, "City,Title\n").unwrap();
    }

    let response = app
        .router
        .oneshot(
            Request::post("/v1/runs/cleanup")
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let config = app.state.config.read().unwrap();
    assert!(!config.links_file.exists());
    assert!(!config.results_file.exists());
    drop(config);

    let snapshot = app.state.status.snapshot();
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.phase, Phase::NotStarted);
}
