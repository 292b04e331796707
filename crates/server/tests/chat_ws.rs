mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Reads frames until one of `kind` arrives.
async fn next_of_kind<S>(ws: &mut S, kind: &str) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            if value["type"] == kind {
                return value;
            }
        }
    }
}

#[tokio::test]
async fn raw_text_is_attributed_to_registered_user() {
    let app = common::spawn_app().await;

    let (mut alice, _) = connect_async(app.ws_url("/api/ws/chat?room=general&user=alice"))
        .await
        .unwrap();
    let (mut bob, _) = connect_async(app.ws_url("/api/ws/chat?room=general&user=bob"))
        .await
        .unwrap();

    let hub = app.state.chat_hub.clone();
    common::eventually(|| {
        let hub = hub.clone();
        async move { hub.member_count("general").await == 2 }
    })
    .await;

    alice.send(Message::Text("hello bob".into())).await.unwrap();

    let received = next_of_kind(&mut bob, "message").await;
    assert_eq!(received["room"], "general");
    assert_eq!(received["user"], "alice");
    assert_eq!(received["text"], "hello bob");

    bob.send(Message::Text(r#"{"text":"hi alice"}"#.into()))
        .await
        .unwrap();
    let received = next_of_kind(&mut alice, "message").await;
    assert_eq!(received["user"], "bob");
    assert_eq!(received["text"], "hi alice");
}

#[tokio::test]
async fn late_joiner_gets_history_and_leave_is_announced() {
    let app = common::spawn_app().await;

    let (mut alice, _) = connect_async(app.ws_url("/api/ws/chat?room=r1&user=alice"))
        .await
        .unwrap();
    let hub = app.state.chat_hub.clone();
    common::eventually(|| {
        let hub = hub.clone();
        async move { hub.member_count("r1").await == 1 }
    })
    .await;

    alice.send(Message::Text("first".into())).await.unwrap();
    common::eventually(|| {
        let hub = hub.clone();
        async move { hub.history("r1").await.len() == 1 }
    })
    .await;

    let (mut bob, _) = connect_async(app.ws_url("/api/ws/chat?room=r1&user=bob"))
        .await
        .unwrap();
    let replayed = next_of_kind(&mut bob, "message").await;
    assert_eq!(replayed["user"], "alice");
    assert_eq!(replayed["text"], "first");

    let history: Value = app
        .client
        .get(app.url("/api/chat/history?room=r1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["text"], "first");

    bob.close(None).await.unwrap();
    let left = next_of_kind(&mut alice, "user_leave").await;
    assert_eq!(left["user"], "bob");
}

#[tokio::test]
async fn room_is_required() {
    let app = common::spawn_app().await;

    let history = app
        .client
        .get(app.url("/api/chat/history"))
        .send()
        .await
        .unwrap();
    assert_eq!(history.status(), 400);

    assert!(connect_async(app.ws_url("/api/ws/chat?user=alice"))
        .await
        .is_err());
}

#[tokio::test]
async fn history_is_bounded() {
    let app = common::spawn_app().await;
    let (mut alice, _) = connect_async(app.ws_url("/api/ws/chat?room=busy&user=alice"))
        .await
        .unwrap();
    let hub = app.state.chat_hub.clone();
    common::eventually(|| {
        let hub = hub.clone();
        async move { hub.member_count("busy").await == 1 }
    })
    .await;

    for i in 0..8 {
        alice
            .send(Message::Text(format!("m{i}").into()))
            .await
            .unwrap();
    }
    // Our own broadcasts come back in order; wait for the last one.
    loop {
        let msg = next_of_kind(&mut alice, "message").await;
        if msg["text"] == "m7" {
            break;
        }
    }

    let texts: Vec<String> = hub
        .history("busy")
        .await
        .into_iter()
        .filter_map(|m| m.text)
        .collect();
    assert_eq!(texts, ["m3", "m4", "m5", "m6", "m7"]);
}
