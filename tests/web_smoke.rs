mod common;

use std::{sync::Arc, time::Duration};

use askbert::{
    CorpusDb,
    LiveService,
    Messages,
    QueryService,
    ServiceConfig,
    observer::TracingObserver,
    server::{AppState, router},
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::KeywordEmbedder;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(dir: &std::path::Path) -> Router {
    let corpus_path = common::write_corpus(dir).unwrap();
    let config = ServiceConfig {
        model_id: common::MODEL_ID.to_string(),
        threshold: 0.5,
        corpus_path,
        messages: Messages::default(),
    };
    let service = QueryService::from_config(
        &config,
        Arc::new(KeywordEmbedder::new()),
        Arc::new(TracingObserver),
    )
    .unwrap();
    let live = Arc::new(LiveService::new(service, config));
    router(AppState::new(live, Duration::from_secs(5)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn chat(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn chat_answers_paraphrase() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let (status, body) =
        chat(&app, json!({ "question": "What's your name?" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": "I am Bot." }));
}

#[tokio::test]
async fn chat_falls_back_for_unknown_question() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let (status, body) =
        chat(&app, json!({ "question": "What is the weather today?" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], Messages::default().fallback);
}

#[tokio::test]
async fn chat_prompts_for_empty_question() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    for body in [json!({ "question": "" }), json!({ "question": "   " })] {
        let (status, reply) = chat(&app, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["answer"], "Please ask a question.");
    }
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question":"How old are you?"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn health_reports_entry_count() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["entries"], 2);
}

#[tokio::test]
async fn reload_serves_updated_answers() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    {
        let path = tmp.path().join("corpus.redb");
        let db = CorpusDb::create(&path).unwrap();
        db.store_answers(&["I am Askbert.", "I am ageless."]).unwrap();
    }

    let request = Request::builder()
        .method("POST")
        .uri("/reload")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "entries": 2 }));

    let (_, reply) =
        chat(&app, json!({ "question": "What is your name?" })).await;
    assert_eq!(reply["answer"], "I am Askbert.");
}
