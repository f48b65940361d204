//! End-to-end tests against a local WebSocket server.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use botsocket_client::leaves::{AutoReconnectLeaf, LetterEventsLeaf};
use botsocket_client::{Client, ConnectionState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

// ============================================================================
// Helpers
// ============================================================================

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn listen() -> Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}", listener.local_addr()?);
    Ok((listener, url))
}

async fn accept(listener: &TcpListener) -> Result<ServerSocket> {
    let (stream, _) = listener.accept().await?;
    Ok(accept_async(stream).await?)
}

async fn send_envelope(ws: &mut ServerSocket, request: &str, data: Value) -> Result<()> {
    let frame = json!({ "request": request, "data": data }).to_string();
    ws.send(Message::text(frame)).await?;
    Ok(())
}

async fn next_envelope(ws: &mut ServerSocket) -> Result<Value> {
    while let Some(message) = ws.next().await {
        if let Message::Text(text) = message? {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
    bail!("socket ended before an envelope arrived")
}

async fn next_close_code(ws: &mut ServerSocket) -> Result<Option<u16>> {
    while let Some(message) = ws.next().await {
        if let Message::Close(frame) = message? {
            return Ok(frame.map(|f| u16::from(f.code)));
        }
    }
    Ok(None)
}

/// Steps the client until `done` holds.
async fn step_until(client: &mut Client, done: impl Fn(&Client) -> bool) -> Result<()> {
    while !done(client) {
        timeout(STEP_TIMEOUT, client.step())
            .await
            .context("client stalled")??;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_session_round_trip() -> Result<()> {
    init_tracing();
    let (listener, url) = listen().await?;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await?;

        let handshake = next_envelope(&mut ws).await?;
        send_envelope(&mut ws, "handshake", json!({ "userId": "u-42", "retryWaitTime": 0 })).await?;

        let query = next_envelope(&mut ws).await?;
        send_envelope(
            &mut ws,
            "render-letter",
            json!({ "letter": [{ "type": "text", "text": "hi there", "from": "bot:echo" }] }),
        )
        .await?;

        let code = next_close_code(&mut ws).await?;
        anyhow::Ok((handshake, query, code))
    });

    let (letters, mut letter_rx) = LetterEventsLeaf::channel();
    let mut client = Client::builder()
        .url(url)
        .timezone("UTC")
        .supports(["render-letter"])
        .leaf(letters)
        .build()?;

    client.connect()?;
    step_until(&mut client, |c| c.state() == ConnectionState::Ready).await?;
    assert_eq!(client.user_id(), "u-42");

    client.send_query("hello", None, Some(json!({ "lang": "en" })))?;
    let letter = loop {
        if let Ok(letter) = letter_rx.try_recv() {
            break letter;
        }
        timeout(STEP_TIMEOUT, client.step()).await.context("no letter")??;
    };
    assert_eq!(letter[0].text(), Some("hi there"));

    client.disconnect()?;
    step_until(&mut client, |c| c.state() == ConnectionState::Disconnected).await?;
    assert_eq!(client.last_close_code(), Some(3001));

    let (handshake, query, code) = server.await??;

    assert_eq!(handshake["request"], json!("handshake"));
    assert_eq!(handshake["data"]["timezone"], json!("UTC"));
    assert_eq!(handshake["data"]["supports"], json!(["render-letter"]));
    assert!(handshake["data"].get("userId").is_none());

    assert_eq!(query["request"], json!("submit-query"));
    assert_eq!(query["data"]["query"], json!("hello"));
    assert_eq!(query["data"]["text"], json!("hello"));
    assert_eq!(query["data"]["data"], json!({ "senderId": "u-42", "lang": "en" }));

    assert_eq!(code, Some(3001));
    Ok(())
}

#[tokio::test]
async fn test_reconnects_after_server_drop() -> Result<()> {
    init_tracing();
    let (listener, url) = listen().await?;

    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await?;
        next_envelope(&mut first).await?;
        send_envelope(&mut first, "handshake", json!({ "userId": "u-7", "retryWaitTime": 0 }))
            .await?;
        drop(first);

        let mut second = accept(&listener).await?;
        let resumed = next_envelope(&mut second).await?;
        send_envelope(&mut second, "handshake", json!({ "userId": "u-7" })).await?;

        next_close_code(&mut second).await?;
        anyhow::Ok(resumed)
    });

    let mut client = Client::builder()
        .url(url)
        .leaf(AutoReconnectLeaf::new())
        .build()?;

    client.connect()?;
    step_until(&mut client, |c| c.state() == ConnectionState::Ready).await?;
    let first_generation = client.generation();

    step_until(&mut client, |c| {
        c.state() == ConnectionState::Ready && c.generation() != first_generation
    })
    .await?;
    assert_eq!(client.user_id(), "u-7");

    client.disconnect()?;
    step_until(&mut client, |c| c.state() == ConnectionState::Disconnected).await?;

    let resumed = server.await??;
    assert_eq!(resumed["data"]["userId"], json!("u-7"));
    Ok(())
}

#[tokio::test]
async fn test_refused_connection_lands_disconnected() -> Result<()> {
    init_tracing();
    let (listener, url) = listen().await?;
    drop(listener);

    let mut client = Client::builder().url(url).build()?;

    client.connect()?;
    step_until(&mut client, |c| c.state() == ConnectionState::Disconnected).await?;
    assert_eq!(client.last_close_code(), Some(1006));
    Ok(())
}
