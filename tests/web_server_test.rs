//! Webhook endpoint tests: response contract for liveness, missing token,
//! unknown bot, malformed updates and successful handling.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use botfactory::core::web_server;
use botfactory::storage::db::{self, RegisteredBot};
use botfactory::storage::get_connection;
use common::TestEnvironment;

const TOKEN: &str = "888:web-bot";

fn seed_bot(env: &TestEnvironment) {
    let conn = get_connection(&env.db_pool).unwrap();
    db::insert_bot(
        &conn,
        &RegisteredBot {
            token: TOKEN.to_string(),
            username: "webbot".to_string(),
            creator_id: 1,
            creator_username: None,
            created_at: 1700000000,
        },
    )
    .unwrap();
}

fn update_json(user_id: i64, text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "date": 1700000000,
            "chat": {"id": user_id, "type": "private", "first_name": "W"},
            "from": {"id": user_id, "is_bot": false, "first_name": "W"},
            "text": text
        }
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn liveness_strings_answer_get() {
    let env = TestEnvironment::new();
    let app = web_server::router(env.deps.clone());

    for (uri, expected) in [
        ("/created", "Created Bot is running."),
        ("/maker", "Bot Maker is running."),
        ("/health", "ok"),
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], expected.as_bytes());
    }
}

#[tokio::test]
async fn created_post_without_token_is_rejected() {
    let env = TestEnvironment::new();
    let app = web_server::router(env.deps.clone());

    let response = app
        .oneshot(post("/created", update_json(5, "hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"error": "No token provided"}));
}

#[tokio::test]
async fn created_post_with_unknown_token_is_404() {
    let env = TestEnvironment::new();
    let app = web_server::router(env.deps.clone());

    let response = app
        .oneshot(post("/created?token=000%3Aghost", update_json(5, "hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"error": "Bot not found"}));
}

#[tokio::test]
async fn undecodable_update_body_is_400() {
    let env = TestEnvironment::new();
    seed_bot(&env);
    let app = web_server::router(env.deps.clone());

    let response = app
        .oneshot(post(
            &format!("/created?token={}", urlencoding::encode(TOKEN)),
            json!({"not": "an update"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"error": "Invalid update"}));
}

#[tokio::test]
async fn update_without_chat_or_sender_is_400() {
    let env = TestEnvironment::new();
    seed_bot(&env);
    let app = web_server::router(env.deps.clone());

    // A channel post decodes as an update but carries no usable sender
    let response = app
        .oneshot(post(
            &format!("/created?token={}", urlencoding::encode(TOKEN)),
            json!({
                "update_id": 9,
                "channel_post": {
                    "message_id": 11,
                    "date": 1700000000,
                    "chat": {"id": -100123, "type": "channel", "title": "c"},
                    "text": "hello"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"error": "Invalid update"}));
}

#[tokio::test]
async fn created_post_with_registered_token_is_handled() {
    let env = TestEnvironment::new();
    seed_bot(&env);
    let app = web_server::router(env.deps.clone());

    let response = app
        .oneshot(post(
            &format!("/created?token={}", urlencoding::encode(TOKEN)),
            update_json(5, "/start"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"ok": true}));

    // The join-gate prompt went out through the gateway
    assert_eq!(
        env.gateway.sent_texts(),
        vec!["Please join our channel and click on Joined button to proceed.".to_string()]
    );
}

#[tokio::test]
async fn maker_post_is_handled_without_a_token_param() {
    let env = TestEnvironment::new();
    let app = web_server::router(env.deps.clone());

    let response = app
        .oneshot(post("/maker", update_json(5, "/start")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"ok": true}));
    assert!(env
        .gateway
        .sent_texts()
        .iter()
        .any(|t| t.starts_with("Welcome to Bot Maker!")));
}
