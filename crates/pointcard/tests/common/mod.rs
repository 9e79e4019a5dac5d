//! Mock aggregation endpoint shared by the integration tests
//!
//! Serves `POST /exec` (batch uploads) and `POST /dev` (last-sync notices)
//! on an ephemeral localhost port. Every request body is recorded, and the
//! upload reply and delay can be changed between calls.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use pointcard::{Config, PointCard, Settings};

/// What the mock answers to an upload
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn accepted(message: &str) -> Self {
        Self::json(
            StatusCode::OK,
            serde_json::json!({ "status": 200, "message": message }),
        )
    }
}

#[derive(Debug)]
pub struct MockState {
    uploads: Mutex<Vec<Value>>,
    notices: Mutex<Vec<Value>>,
    reply: Mutex<Reply>,
    delay: Mutex<Duration>,
}

pub struct MockEndpoint {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockEndpoint {
    /// Start a mock that accepts every batch
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            uploads: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            reply: Mutex::new(Reply::accepted("ok")),
            delay: Mutex::new(Duration::ZERO),
        });

        let app = Router::new()
            .route("/exec", post(upload))
            .route("/dev", post(notice))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Upload URL, ending in `/exec`
    pub fn url(&self) -> String {
        format!("http://{}/exec", self.addr)
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.state.reply.lock() = reply;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    pub fn uploads(&self) -> Vec<Value> {
        self.state.uploads.lock().clone()
    }

    pub fn notices(&self) -> Vec<Value> {
        self.state.notices.lock().clone()
    }

    /// Wait until `n` notices arrived, or give up after two seconds
    pub async fn wait_for_notices(&self, n: usize) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let notices = self.notices();
            if notices.len() >= n || tokio::time::Instant::now() >= deadline {
                return notices;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Stop serving; later connections are refused
    pub fn stop(self) {
        self.handle.abort();
    }
}

async fn upload(State(state): State<Arc<MockState>>, body: String) -> (StatusCode, String) {
    state
        .uploads
        .lock()
        .push(serde_json::from_str(&body).unwrap_or(Value::Null));

    let delay = *state.delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let reply = state.reply.lock().clone();
    (reply.status, reply.body)
}

async fn notice(State(state): State<Arc<MockState>>, body: String) -> (StatusCode, String) {
    state
        .notices
        .lock()
        .push(serde_json::from_str(&body).unwrap_or(Value::Null));
    (StatusCode::OK, "ok".to_string())
}

/// A terminal in a fresh temp dir, configured against `endpoint_url`
pub async fn terminal(dir: &TempDir, endpoint_url: &str) -> PointCard {
    let terminal = PointCard::init(Config::new(dir.path())).await.unwrap();
    terminal
        .save_settings(Settings::new(endpoint_url, "store-7", 10).unwrap())
        .await
        .unwrap();
    terminal
}

/// Install a test subscriber once; ignored when one is already set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
