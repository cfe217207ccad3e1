//! Long-poll batches against a mocked Bot API

mod support;

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use site_inspector_core::ChatId;
use site_inspector_server::{BotApiConfig, Dispatcher, Poller, TelegramBot};

use support::harness;

const TOKEN: &str = "42:POLL";

fn bot(server: &MockServer) -> Arc<TelegramBot> {
    Arc::new(
        TelegramBot::new(BotApiConfig {
            api_base: server.base_url(),
            bot_token: TOKEN.to_string(),
            poll_timeout: Duration::from_secs(0),
            request_timeout: Duration::from_secs(2),
            download_timeout: Duration::from_secs(2),
        })
        .unwrap(),
    )
}

async fn wait_for_replies(count: usize, sent: impl Fn() -> usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while sent() < count && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn batch_is_dispatched_and_offset_advances() {
    let server = MockServer::start();
    let updates = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/bot{}/getUpdates", TOKEN))
            .json_body_includes(r#"{"offset": 0}"#);
        then.status(200).json_body(json!({
            "ok": true,
            "result": [
                {"update_id": 500, "message": {"message_id": 1, "from": {"id": 9}, "chat": {"id": 9}, "date": 1700000000,
                    "text": "Отсутствует ограждение строительной площадки"}},
                {"update_id": 501, "channel_post": {"message_id": 2, "chat": {"id": -100}, "date": 0}},
                {"update_id": 502, "callback_query": {"id": "cb-7", "from": {"id": 11},
                    "message": {"message_id": 3, "chat": {"id": 11}, "date": 0}, "data": "new_violation"}}
            ]
        }));
    });
    let answer = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/bot{}/answerCallbackQuery", TOKEN))
            .json_body(json!({"callback_query_id": "cb-7"}));
        then.status(200).json_body(json!({"ok": true, "result": true}));
    });

    let h = harness();
    let mut poller = Poller::new(bot(&server), Dispatcher::new(h.handler.clone()));

    let seen = poller.poll_once().await.unwrap();
    assert_eq!(seen, 3);
    assert_eq!(poller.offset(), 503);
    updates.assert();

    let replies = h.replies.clone();
    wait_for_replies(3, move || replies.sent.lock().len()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    answer.assert();

    // Progress + analysis for the report, instructions for the callback
    let sent = h.replies.sent.lock().clone();
    assert_eq!(sent.iter().filter(|(c, _)| *c == ChatId(9)).count(), 2);
    assert_eq!(sent.iter().filter(|(c, _)| *c == ChatId(11)).count(), 1);
    assert_eq!(h.log.len(), 1);
}

#[tokio::test]
async fn api_error_leaves_offset_untouched() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(format!("/bot{}/getUpdates", TOKEN));
        then.status(409).json_body(json!({
            "ok": false,
            "error_code": 409,
            "description": "Conflict: terminated by other getUpdates request"
        }));
    });

    let h = harness();
    let mut poller = Poller::new(bot(&server), Dispatcher::new(h.handler.clone()));

    assert!(poller.poll_once().await.is_err());
    assert_eq!(poller.offset(), 0);
    assert!(h.replies.sent.lock().is_empty());
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(format!("/bot{}/getUpdates", TOKEN));
        then.status(200)
            .delay(Duration::from_millis(20))
            .json_body(json!({"ok": true, "result": []}));
    });

    let h = harness();
    let poller = Poller::new(bot(&server), Dispatcher::new(h.handler.clone()));
    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(poller.run(rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("poller did not stop")
        .unwrap();
}
