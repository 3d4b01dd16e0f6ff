//! Registration lifecycle tests: token validation, webhook setup, uniqueness
//! and cascading deletion.

mod common;

use common::{message_update, GatewayCall, TestEnvironment};
use pretty_assertions::assert_eq;

use botfactory::core::AppError;
use botfactory::storage::db;
use botfactory::storage::get_connection;
use botfactory::telegram::{created, registration};

const TOKEN_A: &str = "333:token-a";
const TOKEN_B: &str = "444:token-b";
const REQUESTER: i64 = 77;

#[tokio::test]
async fn distinct_tokens_register_then_duplicate_fails() {
    let env = TestEnvironment::new();

    let bot_a = registration::create_bot(&env.deps, TOKEN_A, REQUESTER, Some("maker_user"))
        .await
        .unwrap();
    assert_eq!(bot_a.username, "testbot");
    assert_eq!(bot_a.creator_id, REQUESTER);

    registration::create_bot(&env.deps, TOKEN_B, REQUESTER, Some("maker_user"))
        .await
        .unwrap();

    let err = registration::create_bot(&env.deps, TOKEN_A, REQUESTER, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateToken));

    let conn = get_connection(&env.db_pool).unwrap();
    assert_eq!(db::count_bots(&conn).unwrap(), 2);
}

#[tokio::test]
async fn webhook_is_registered_before_the_record_is_written() {
    let env = TestEnvironment::new();

    registration::create_bot(&env.deps, TOKEN_A, REQUESTER, None)
        .await
        .unwrap();

    let calls = env.gateway.calls();
    assert!(matches!(calls[0], GatewayCall::BotIdentity { .. }));
    match &calls[1] {
        GatewayCall::SetWebhook { token, url } => {
            assert_eq!(token, TOKEN_A);
            assert!(url.contains("/created?token=333%3Atoken-a"));
        }
        other => panic!("expected webhook registration, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_token_fails_and_persists_nothing() {
    let env = TestEnvironment::new();
    env.gateway.deny_identity();

    let err = registration::create_bot(&env.deps, TOKEN_A, REQUESTER, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));

    let conn = get_connection(&env.db_pool).unwrap();
    assert!(!db::bot_exists(&conn, TOKEN_A).unwrap());
}

#[tokio::test]
async fn webhook_failure_fails_and_persists_nothing() {
    let env = TestEnvironment::new();
    env.gateway.fail_webhook();

    let err = registration::create_bot(&env.deps, TOKEN_A, REQUESTER, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WebhookSetupFailed));

    let conn = get_connection(&env.db_pool).unwrap();
    assert!(!db::bot_exists(&conn, TOKEN_A).unwrap());
}

#[tokio::test]
async fn delete_cascades_subscribers_and_channel_config() {
    let env = TestEnvironment::new();

    registration::create_bot(&env.deps, TOKEN_A, REQUESTER, None)
        .await
        .unwrap();
    {
        let conn = get_connection(&env.db_pool).unwrap();
        db::ensure_subscriber(&conn, TOKEN_A, 5, 0).unwrap();
        db::set_subscriber_joined(&conn, TOKEN_A, 5).unwrap();
        db::set_channel_url(&conn, TOKEN_A, "https://t.me/somewhere").unwrap();
    }

    registration::delete_bot(&env.deps, TOKEN_A).await.unwrap();

    let conn = get_connection(&env.db_pool).unwrap();
    assert!(!db::bot_exists(&conn, TOKEN_A).unwrap());
    assert!(db::get_subscriber(&conn, TOKEN_A, 5).unwrap().is_none());
    assert!(db::channel_url(&conn, TOKEN_A).unwrap().is_none());
    assert!(env
        .gateway
        .calls()
        .iter()
        .any(|call| matches!(call, GatewayCall::DeleteWebhook { .. })));

    // Webhook traffic for the deleted token is now rejected
    let err = created::process_update(&env.deps, TOKEN_A, &message_update(5, "/start"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownBot));
}

#[tokio::test]
async fn delete_of_unknown_token_reports_not_found() {
    let env = TestEnvironment::new();
    let err = registration::delete_bot(&env.deps, "999:never-registered")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
