//! Test utilities for pushfeed-client
//!
//! Two levels of fakes:
//! - [`MockConnector`] is an in-memory [`Connector`] whose peers are driven by
//!   the test, for exact state machine and backoff tests under paused time.
//! - [`MockBackend`] + [`TestServer`] run a real axum server with a WebSocket
//!   route and a chunked streaming route, for end-to-end tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use parking_lot::Mutex;
use pushfeed_core::{ClientMessage, Frame};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::debug;

use crate::channel::{ChannelError, ChannelResult, Connector, Transport};
use crate::{ChannelConfig, PushfeedClient, Result};

// =============================================================================
// In-memory connector
// =============================================================================

#[derive(Debug, Default)]
struct ConnectorState {
    refuse_next: usize,
    refuse_all: bool,
    attempts: Vec<Instant>,
    peers: Vec<MockPeer>,
}

/// Scripted [`Connector`] that hands out in-memory connections
///
/// Clones share state, so keep one clone in the test and give the other to
/// the channel.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connect attempts
    pub fn refuse_next(&self, n: usize) {
        self.state.lock().refuse_next = n;
    }

    /// Refuse every connect attempt until switched off again
    pub fn refuse_all(&self, refuse: bool) {
        self.state.lock().refuse_all = refuse;
    }

    /// Number of connect attempts so far, refused ones included
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts.len()
    }

    /// Time of every connect attempt
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.state.lock().attempts.clone()
    }

    /// Server side of every accepted connection, oldest first
    pub fn peers(&self) -> Vec<MockPeer> {
        self.state.lock().peers.clone()
    }

    pub fn peer(&self, index: usize) -> Option<MockPeer> {
        self.state.lock().peers.get(index).cloned()
    }

    /// Server side of the most recent accepted connection
    pub fn last_peer(&self) -> Option<MockPeer> {
        self.state.lock().peers.last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> ChannelResult<Box<dyn Transport>> {
        let mut state = self.state.lock();
        state.attempts.push(Instant::now());

        if state.refuse_all {
            return Err(ChannelError::Connect("connection refused".into()));
        }
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(ChannelError::Connect("connection refused".into()));
        }

        let (peer, transport) = MockPeer::pair();
        state.peers.push(peer);
        Ok(Box::new(transport))
    }
}

#[derive(Debug)]
enum PeerEvent {
    Payload(Vec<u8>),
    Disconnect,
    Fail(String),
}

/// Server side of one in-memory connection
#[derive(Debug, Clone)]
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<PeerEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    fn pair() -> (Self, MockTransport) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let peer = Self {
            inbound,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let transport = MockTransport {
            inbound: rx,
            sent,
            closed,
        };
        (peer, transport)
    }

    /// Deliver a raw text message to the client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.inbound.send(PeerEvent::Payload(text.into().into_bytes()));
    }

    /// Deliver a raw binary message to the client
    pub fn push_bytes(&self, payload: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(PeerEvent::Payload(payload.into()));
    }

    pub fn push_frame(&self, frame: &Frame) {
        self.push(frame.encode());
    }

    /// Close the connection from the server side
    pub fn disconnect(&self) {
        let _ = self.inbound.send(PeerEvent::Disconnect);
    }

    /// Break the connection with a transport error
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.inbound.send(PeerEvent::Fail(reason.into()));
    }

    /// Every text message the client sent on this connection
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Subscription messages the client sent on this connection
    pub fn subscriptions(&self) -> Vec<ClientMessage> {
        self.sent()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Whether the client closed or released this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<PeerEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> ChannelResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("connection closed".into()));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> ChannelResult<Option<Vec<u8>>> {
        match self.inbound.recv().await {
            Some(PeerEvent::Payload(payload)) => Ok(Some(payload)),
            Some(PeerEvent::Disconnect) | None => Ok(None),
            Some(PeerEvent::Fail(reason)) => Err(ChannelError::Transport(reason)),
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// In-process backend
// =============================================================================

/// Scripted response of the streaming route
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    /// Body chunks, written in order
    pub chunks: Vec<Bytes>,
    /// Pause between chunks
    pub chunk_delay: Duration,
    /// Abort the body with an error after the last chunk
    pub fail_after: bool,
    /// Reply with this status and message instead of a body
    pub error: Option<(StatusCode, String)>,
}

impl StreamScript {
    /// Body made of the given chunks
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| Bytes::from(c.into())).collect(),
            chunk_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_after = true;
        self
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: Some((status, message.into())),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct BackendState {
    frames: broadcast::Sender<Message>,
    kick: broadcast::Sender<()>,
    connections: AtomicUsize,
    subscriptions: Mutex<Vec<ClientMessage>>,
    script: Mutex<StreamScript>,
    requests: Mutex<Vec<serde_json::Value>>,
}

/// In-process dashboard backend
///
/// Serves `GET /ws` (records subscribe messages, forwards pushed frames to
/// every open socket) and `POST /v1/stream` (replays a [`StreamScript`]).
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<BackendState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let (frames, _) = broadcast::channel(256);
        let (kick, _) = broadcast::channel(16);
        Self {
            state: Arc::new(BackendState {
                frames,
                kick,
                connections: AtomicUsize::new(0),
                subscriptions: Mutex::new(Vec::new()),
                script: Mutex::new(StreamScript::default()),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Router serving the backend routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/v1/stream", post(stream_handler))
            .with_state(self.clone())
    }

    /// Send a frame to every open socket
    pub fn push_frame(&self, frame: &Frame) {
        self.push_raw(frame.encode());
    }

    /// Send raw text to every open socket
    pub fn push_raw(&self, text: impl Into<String>) {
        let text: String = text.into();
        let _ = self.state.frames.send(Message::Text(text.into()));
    }

    /// Send a raw binary message to every open socket
    pub fn push_binary(&self, payload: impl Into<Vec<u8>>) {
        let _ = self.state.frames.send(Message::Binary(Bytes::from(payload.into())));
    }

    /// Close every open socket from the server side
    pub fn disconnect_all(&self) {
        let _ = self.state.kick.send(());
    }

    /// Number of sockets accepted so far
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Subscribe messages received, in arrival order, across all sockets
    pub fn subscriptions(&self) -> Vec<ClientMessage> {
        self.state.subscriptions.lock().clone()
    }

    /// Set the reply of the streaming route
    pub fn set_stream(&self, script: StreamScript) {
        *self.state.script.lock() = script;
    }

    /// JSON bodies posted to the streaming route
    pub fn stream_requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().clone()
    }

    async fn serve_socket(self, mut socket: WebSocket) {
        let mut frames = self.state.frames.subscribe();
        let mut kick = self.state.kick.subscribe();
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        debug!("Mock backend socket opened");

        loop {
            tokio::select! {
                message = socket.recv() => match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(message) => self.state.subscriptions.lock().push(message),
                            Err(e) => debug!(error = %e, "Mock backend ignoring message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                frame = frames.recv() => match frame {
                    Ok(message) => {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = kick.recv() => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        debug!("Mock backend socket closed");
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(backend): State<MockBackend>) -> Response {
    ws.on_upgrade(move |socket| backend.serve_socket(socket))
}

async fn stream_handler(
    State(backend): State<MockBackend>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    backend.state.requests.lock().push(body);
    let StreamScript {
        chunks,
        chunk_delay,
        fail_after,
        error,
    } = backend.state.script.lock().clone();

    if let Some((status, message)) = error {
        return (status, Json(serde_json::json!({ "error": message }))).into_response();
    }

    let stream = async_stream::stream! {
        for chunk in chunks {
            yield Ok::<Bytes, std::io::Error>(chunk);
            tokio::time::sleep(chunk_delay).await;
        }
        if fail_after {
            yield Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "scripted failure"));
        }
    };

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(stream),
    )
        .into_response()
}

// =============================================================================
// Test server
// =============================================================================

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: PushfeedClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use pushfeed_client::testing::{MockBackend, TestServer};
    ///
    /// let backend = MockBackend::new();
    /// let server = TestServer::start(backend.router()).await?;
    ///
    /// // Use server.client to make requests
    /// let config = server.channel_config("/ws")?;
    /// ```
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Create a new test server with custom timeouts
    pub async fn start_with_timeout(
        router: Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let base_url = format!("http://{}", addr);
        let client = PushfeedClient::with_config(&base_url, timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &PushfeedClient {
        &self.client
    }

    /// Channel configuration pointing at `path` on this server
    pub fn channel_config(&self, path: &str) -> Result<ChannelConfig> {
        self.client.channel_config(path)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
