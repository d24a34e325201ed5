//! End-to-end flow against a local WebSocket server.
//!
//! connect → authenticate → join → server drop → reconnect → re-join →
//! sign-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use portal_realtime::{
    AuthState, ConnectionState, ConversationId, Realtime, ReconnectConfig, UserIdentity,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Test Server
// ============================================================================

struct TestServer {
    base_url: String,
    received: mpsc::UnboundedReceiver<Value>,
    kick: broadcast::Sender<()>,
    connections: Arc<AtomicUsize>,
}

impl TestServer {
    async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let (received_tx, received) = mpsc::unbounded_channel();
        let (kick, _) = broadcast::channel(4);
        let connections = Arc::new(AtomicUsize::new(0));

        let kick_tx = kick.clone();
        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, received_tx.clone(), kick_tx.subscribe()));
            }
        });

        Ok(Self {
            base_url,
            received,
            kick,
            connections,
        })
    }

    async fn next_received(&mut self) -> anyhow::Result<Value> {
        timeout(WAIT, self.received.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("server stopped"))
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    received: mpsc::UnboundedSender<Value>,
    mut kick: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;

    for frame in [
        json!({ "type": "connection_established", "payload": {} }),
        json!({
            "type": "online_users_list",
            "payload": { "users": [{ "userEmail": "peer@x", "userName": "Peer" }] }
        }),
        json!({ "type": "authentication_success", "payload": { "userEmail": "me@x" } }),
    ] {
        ws.send(WsMessage::Text(frame.to_string().into())).await?;
    }

    loop {
        tokio::select! {
            message = ws.next() => {
                let Some(Ok(WsMessage::Text(text))) = message else {
                    return Ok(());
                };
                let frame: Value = serde_json::from_str(text.as_str())?;

                if frame["type"] == "join_conversation" {
                    let conversation = frame["payload"]["conversationId"].clone();
                    let history = json!({
                        "type": "messages_loaded",
                        "payload": {
                            "conversationId": conversation,
                            "messages": [
                                { "id": "m1", "conversationId": conversation, "content": "hi" },
                                { "id": "m2", "conversationId": conversation, "content": "there" }
                            ]
                        }
                    });
                    ws.send(WsMessage::Text(history.to_string().into())).await?;
                }

                let _ = received.send(frame);
            }

            _ = kick.recv() => {
                let _ = ws.close(None).await;
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn wait_for_state(
    realtime: &Realtime,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> anyhow::Result<()> {
    let mut state = realtime.watch_state();
    timeout(WAIT, state.wait_for(predicate)).await??;
    Ok(())
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> anyhow::Result<()> {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

fn join_frame(conversation: &str) -> Value {
    json!({ "type": "join_conversation", "payload": { "conversationId": conversation } })
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_session_lifecycle() -> anyhow::Result<()> {
    init_tracing();
    let mut server = TestServer::start().await?;

    let realtime = Realtime::builder()
        .base_url(&server.base_url)
        .reconnect(
            ReconnectConfig::default()
                .with_initial_delay(Duration::from_millis(50))
                .with_max_delay(Duration::from_millis(200)),
        )
        .build()?;

    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loaded);
    let _subscription = realtime.subscribe("messages_loaded", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Sign in and reach `connected` through the server's authentication frame.
    realtime.apply_auth(&AuthState::signed_in(UserIdentity::new("me@x")));
    wait_for_state(&realtime, ConnectionState::is_connected).await?;
    assert!(realtime.is_online("peer@x"));

    // Join; the server answers with the history.
    realtime.join_conversation("c1");
    assert_eq!(server.next_received().await?, join_frame("c1"));

    let c1 = ConversationId::new("c1");
    wait_until(|| realtime.messages(&c1).len() == 2).await?;
    assert_eq!(loaded.load(Ordering::SeqCst), 1);

    // Server drops us; the client reconnects and re-joins on its own.
    let _ = server.kick.send(());
    wait_for_state(&realtime, |s| !s.is_connected()).await?;
    wait_for_state(&realtime, ConnectionState::is_connected).await?;

    assert_eq!(server.next_received().await?, join_frame("c1"));
    assert_eq!(server.connections.load(Ordering::SeqCst), 2);
    assert_eq!(realtime.reconnect_attempt(), 0);
    assert_eq!(realtime.focused_conversation(), Some(c1.clone()));

    // History for the same ids does not duplicate.
    wait_until(|| loaded.load(Ordering::SeqCst) == 2).await?;
    assert_eq!(realtime.messages(&c1).len(), 2);

    // Sign out: disconnected, caches gone, no reconnect.
    realtime.apply_auth(&AuthState::signed_out());
    assert_eq!(realtime.state(), ConnectionState::Disconnected);
    assert!(realtime.online_users().is_empty());
    assert!(realtime.conversations().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connections.load(Ordering::SeqCst), 2);
    assert_eq!(realtime.state(), ConnectionState::Disconnected);

    realtime.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() -> anyhow::Result<()> {
    init_tracing();

    // Bind then drop to get a port nobody listens on.
    let port = TcpListener::bind("127.0.0.1:0").await?.local_addr()?.port();

    let realtime = Realtime::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .reconnect(
            ReconnectConfig::default()
                .with_initial_delay(Duration::from_millis(10))
                .with_max_delay(Duration::from_millis(20)),
        )
        .build()?;

    realtime.apply_auth(&AuthState::signed_in(UserIdentity::new("me@x")));
    wait_until(|| realtime.reconnect_attempt() >= 3).await?;
    assert!(!realtime.state().is_connected());

    realtime.disconnect();
    assert_eq!(realtime.state(), ConnectionState::Disconnected);
    assert_eq!(realtime.reconnect_attempt(), 0);

    realtime.shutdown();
    Ok(())
}
