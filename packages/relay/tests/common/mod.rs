//! Local webhook endpoint for integration tests

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webhook_relay::{
    BatchProcessor, DeliveryClient, DeliveryConfig, DirectoryCache, Dispatcher, InMemoryLedger,
    StalePolicy, StaticSecretSource, TerminalFailurePolicy,
};

/// One scripted answer: status plus an optional `Retry-After` value
type Reply = (u16, Option<&'static str>);

struct MockState {
    scripted: Mutex<VecDeque<Reply>>,
    default_status: u16,
    delay: Duration,
    bodies: Mutex<Vec<Value>>,
}

/// Axum server answering `POST /hook` with scripted statuses
pub struct MockWebhook {
    pub url: String,
    state: Arc<MockState>,
}

impl MockWebhook {
    pub async fn start(default_status: u16) -> Self {
        Self::spawn(Vec::new(), default_status, Duration::ZERO).await
    }

    /// Answer with `statuses` in order, then `default_status` forever
    pub async fn scripted(statuses: &[u16], default_status: u16) -> Self {
        let replies = statuses.iter().map(|status| (*status, None)).collect();
        Self::spawn(replies, default_status, Duration::ZERO).await
    }

    /// Like [`MockWebhook::scripted`], with a `Retry-After` header per reply
    pub async fn scripted_replies(replies: &[Reply], default_status: u16) -> Self {
        Self::spawn(replies.to_vec(), default_status, Duration::ZERO).await
    }

    pub async fn slow(delay: Duration) -> Self {
        Self::spawn(Vec::new(), 200, delay).await
    }

    async fn spawn(scripted: Vec<Reply>, default_status: u16, delay: Duration) -> Self {
        let state = Arc::new(MockState {
            scripted: Mutex::new(scripted.into()),
            default_status,
            delay,
            bodies: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/hook", post(hook))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/hook"),
            state,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.bodies.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.state.bodies.lock().unwrap().clone()
    }
}

async fn hook(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.bodies.lock().unwrap().push(body);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let (status, retry_after) = state
        .scripted
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((state.default_status, None));

    let mut headers = HeaderMap::new();
    if let Some(value) = retry_after {
        headers.insert(RETRY_AFTER, value.parse().unwrap());
    }
    (StatusCode::from_u16(status).unwrap(), headers).into_response()
}

/// Delivery settings that never sleep between attempts
pub fn fast_delivery() -> DeliveryConfig {
    DeliveryConfig {
        timeout_secs: 2.0,
        retries: 2,
        backoff_factor: 0.0,
    }
}

pub fn processor_for(
    webhook: &MockWebhook,
    ledger: Arc<InMemoryLedger>,
    policy: TerminalFailurePolicy,
) -> BatchProcessor {
    let secret = serde_json::json!({ "ops": webhook.url }).to_string();
    let directory = DirectoryCache::new(
        Arc::new(StaticSecretSource::new(secret)),
        Duration::from_secs(60),
        StalePolicy::ServeStale,
    );
    let dispatcher = Dispatcher::new(
        ledger,
        Arc::new(directory),
        Arc::new(DeliveryClient::new(fast_delivery())),
    );
    BatchProcessor::new(dispatcher, policy)
}
