//! Broadcast engine tests: recipient selection, sender exclusion, pacing and
//! partial-failure isolation.

mod common;

use std::time::Duration;

use common::{MockGateway, TestEnvironment};
use pretty_assertions::assert_eq;

use botfactory::core::Pacer;
use botfactory::storage::db::{self, RegisteredBot};
use botfactory::storage::get_connection;
use botfactory::telegram::broadcast::{broadcast_content, broadcast_to_subscribers, BroadcastReport};
use botfactory::telegram::types::MessageContent;

const TOKEN: &str = "222:broadcast-bot";
const CREATOR: i64 = 1;

fn seed_bot_with_subscribers(env: &TestEnvironment, joined: &[i64], not_joined: &[i64]) {
    let conn = get_connection(&env.db_pool).unwrap();
    db::insert_bot(
        &conn,
        &RegisteredBot {
            token: TOKEN.to_string(),
            username: "fanout".to_string(),
            creator_id: CREATOR,
            creator_username: None,
            created_at: 1700000000,
        },
    )
    .unwrap();
    for &id in joined {
        db::ensure_subscriber(&conn, TOKEN, id, 0).unwrap();
        db::set_subscriber_joined(&conn, TOKEN, id).unwrap();
    }
    for &id in not_joined {
        db::ensure_subscriber(&conn, TOKEN, id, 0).unwrap();
    }
}

#[tokio::test]
async fn reaches_exactly_the_joined_subscribers() {
    let env = TestEnvironment::new();
    // A and B joined, C never confirmed
    seed_bot_with_subscribers(&env, &[10, 11], &[12]);

    let report = broadcast_to_subscribers(
        &env.deps,
        TOKEN,
        CREATOR,
        &MessageContent::Text("hi all".to_string()),
    )
    .await
    .unwrap();

    let mut recipients = env.gateway.content_recipients();
    recipients.sort_unstable();
    assert_eq!(recipients, vec![10, 11]);
    assert_eq!(report.success_count + report.fail_count, 2);
    assert_eq!(report, BroadcastReport { success_count: 2, fail_count: 0 });
}

#[tokio::test]
async fn sender_is_excluded_from_their_own_broadcast() {
    let env = TestEnvironment::new();
    seed_bot_with_subscribers(&env, &[CREATOR, 20], &[]);

    let report = broadcast_to_subscribers(
        &env.deps,
        TOKEN,
        CREATOR,
        &MessageContent::Text("news".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(env.gateway.content_recipients(), vec![20]);
    assert_eq!(report.success_count, 1);
}

#[tokio::test]
async fn one_failing_recipient_does_not_abort_the_batch() {
    let env = TestEnvironment::new();
    seed_bot_with_subscribers(&env, &[30, 31, 32], &[]);
    env.gateway.fail_sends_to(31);

    let report = broadcast_to_subscribers(
        &env.deps,
        TOKEN,
        CREATOR,
        &MessageContent::Text("partial".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(report, BroadcastReport { success_count: 2, fail_count: 1 });
    // The failing recipient was attempted, the rest still got the payload
    let mut attempted = env.gateway.content_recipients();
    attempted.sort_unstable();
    assert_eq!(attempted, vec![30, 31, 32]);
}

#[tokio::test(start_paused = true)]
async fn paces_between_successful_sends_only() {
    let gateway = MockGateway::new();
    gateway.fail_sends_to(41);
    let pacer = Pacer::new(Duration::from_millis(34));

    let started = tokio::time::Instant::now();
    let report = broadcast_content(
        &gateway,
        TOKEN,
        &[40, 41, 42],
        0,
        &MessageContent::Text("paced".to_string()),
        &pacer,
    )
    .await;

    assert_eq!(report, BroadcastReport { success_count: 2, fail_count: 1 });
    // Two successful sends pause twice; the failure adds no delay
    assert_eq!(started.elapsed(), Duration::from_millis(68));
}

#[tokio::test]
async fn media_payload_is_fanned_out_with_caption() {
    let env = TestEnvironment::new();
    seed_bot_with_subscribers(&env, &[50], &[]);

    let photo = MessageContent::Photo {
        file_id: teloxide::types::FileId("broadcast-photo".to_string()),
        caption: Some("look".to_string()),
    };
    broadcast_to_subscribers(&env.deps, TOKEN, CREATOR, &photo)
        .await
        .unwrap();

    let calls = env.gateway.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        common::GatewayCall::SendContent { chat_id, content, .. } => {
            assert_eq!(*chat_id, 50);
            assert_eq!(content, &photo);
        }
        other => panic!("expected content send, got {:?}", other),
    }
}
