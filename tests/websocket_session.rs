//! The `/ws/tokenize` channel over a real socket.
//!
//! Run with: cargo test --test websocket_session

#![cfg(feature = "server")]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use vocab_stream::api::{build_router, AppState};
use vocab_stream::extractor::{ContentExtractor, ExtractError};
use vocab_stream::{BroadcastHub, HubEvent, TrainingWorker, VocabularyStore, UNKNOWN_ID};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct FixedPage;

#[async_trait]
impl ContentExtractor for FixedPage {
    async fn extract(&self, _url: &str) -> Result<String, ExtractError> {
        Ok("room room room".to_string())
    }
}

struct TestServer {
    store: Arc<VocabularyStore>,
    hub: Arc<BroadcastHub>,
    worker: Arc<TrainingWorker>,
    url: String,
}

async fn start_server() -> TestServer {
    let store = Arc::new(VocabularyStore::in_memory());
    let hub = Arc::new(BroadcastHub::new());
    let worker = Arc::new(TrainingWorker::new(
        Arc::clone(&store),
        Arc::new(FixedPage),
        Arc::clone(&hub),
    ));
    let app = build_router(AppState::new(
        Arc::clone(&store),
        Arc::clone(&hub),
        Arc::clone(&worker),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        store,
        hub,
        worker,
        url: format!("ws://{addr}/ws/tokenize"),
    }
}

/// Connect and wait until the server side has registered the session.
async fn connect(server: &TestServer, expected_sessions: usize) -> Client {
    let (client, _) = connect_async(server.url.as_str()).await.unwrap();
    wait_until(|| server.hub.len() == expected_sessions).await;
    client
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}

/// Next JSON frame from the server.
async fn next_frame(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

fn texts(frame: &Value) -> Vec<&str> {
    frame["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["text"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_tokens_frame_for_unknown_words() {
    let server = start_server().await;
    let mut client = connect(&server, 1).await;

    send_text(&mut client, r#"{"text": "Room 101!"}"#).await;
    let frame = next_frame(&mut client).await;

    assert_eq!(
        frame,
        json!({
            "type": "tokens",
            "tokens": [
                { "text": "Room", "id": UNKNOWN_ID, "category": "Word" },
                { "text": "101", "id": UNKNOWN_ID, "category": "Number" },
                { "text": "!", "id": UNKNOWN_ID, "category": "Punctuation" },
            ],
            "vocabSize": 0,
        })
    );
}

#[tokio::test]
async fn test_bad_frames_get_errors_and_connection_survives() {
    let server = start_server().await;
    let mut client = connect(&server, 1).await;

    send_text(&mut client, "not json").await;
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["code"], "malformed_message");

    client.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["code"], "malformed_message");

    send_text(&mut client, r#"{"text": "still here"}"#).await;
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], "tokens");
    assert_eq!(texts(&frame), vec!["still", "here"]);
    assert_eq!(server.hub.len(), 1);
}

#[tokio::test]
async fn test_replies_follow_request_order() {
    let server = start_server().await;
    let mut client = connect(&server, 1).await;

    let inputs = ["one", "two words", "three more words", "4", "five!"];
    for input in inputs {
        send_text(&mut client, &json!({ "text": input }).to_string()).await;
    }

    for input in inputs {
        let frame = next_frame(&mut client).await;
        let expected: Vec<&str> = vocab_stream::tokenizer::surface_forms(input);
        assert_eq!(texts(&frame), expected);
    }
}

#[tokio::test]
async fn test_hub_pushes_reach_every_connection() {
    let server = start_server().await;
    let mut first = connect(&server, 1).await;
    let mut second = connect(&server, 2).await;

    let delivered = server.hub.broadcast(&HubEvent::VocabularyUpdated {
        new_entries: 3,
        vocab_size: 7,
    });
    assert_eq!(delivered, 2);

    let expected = json!({
        "type": "vocabularyUpdated",
        "newEntries": 3,
        "vocabSize": 7,
        "message": "New words learned!",
    });
    assert_eq!(next_frame(&mut first).await, expected);
    assert_eq!(next_frame(&mut second).await, expected);
}

#[tokio::test]
async fn test_training_push_interleaves_with_replies() {
    let server = start_server().await;
    let mut client = connect(&server, 1).await;

    send_text(&mut client, r#"{"text": "room"}"#).await;
    let before = next_frame(&mut client).await;
    assert_eq!(before["tokens"][0]["id"], UNKNOWN_ID);

    server.worker.spawn("http://page.test/".to_string());
    let pushed = next_frame(&mut client).await;
    assert_eq!(pushed["type"], "vocabularyUpdated");
    assert_eq!(pushed["newEntries"], 1);

    let room = server.store.lookup("room").await.unwrap().unwrap();
    send_text(&mut client, r#"{"text": "Room"}"#).await;
    let after = next_frame(&mut client).await;
    assert_eq!(after["tokens"][0]["id"], room);
    assert_eq!(after["vocabSize"], 1);
}

#[tokio::test]
async fn test_closing_deregisters_session() {
    let server = start_server().await;
    let mut client = connect(&server, 1).await;
    let mut other = connect(&server, 2).await;

    client.close(None).await.unwrap();
    wait_until(|| server.hub.len() == 1).await;

    // The remaining connection keeps working
    send_text(&mut other, r#"{"text": "hi"}"#).await;
    assert_eq!(next_frame(&mut other).await["type"], "tokens");

    drop(other);
    wait_until(|| server.hub.is_empty()).await;
}
