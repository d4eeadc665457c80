#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use shimdb::ShimClient;
use shimdb::config::ShimConfig;
use shimdb::envelope::Row;
use shimdb::error::ShimError;
use shimdb::transport::{QueryRequest, QueryResponse, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Installs a test subscriber once per binary. `RUST_LOG` overrides the
/// default `warn` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .try_init();
    });
}

/// Records every request and replays queued responses in order. An empty
/// queue answers with zero rows.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<QueryRequest>>,
    responses: Mutex<VecDeque<Result<QueryResponse, ShimError>>>,
    health_checks: Mutex<usize>,
}

impl MockTransport {
    pub fn respond_rows(&self, rows: JsonValue) {
        self.responses
            .lock()
            .push_back(Ok(QueryResponse::from_rows(rows_of(rows))));
    }

    pub fn respond_error(&self, status: u16, message: &str) {
        self.responses.lock().push_back(Err(ShimError::Backend {
            status,
            message: message.to_string(),
        }));
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> QueryRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("at least one request")
    }

    pub fn health_checks(&self) -> usize {
        *self.health_checks.lock()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse, ShimError> {
        self.requests.lock().push(request.clone());
        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| Ok(QueryResponse::default()))
    }

    async fn health(&self) -> Result<(), ShimError> {
        *self.health_checks.lock() += 1;
        Ok(())
    }
}

pub fn mock_client() -> (ShimClient, Arc<MockTransport>) {
    init_tracing();
    let transport = Arc::new(MockTransport::default());
    let client = ShimClient::with_transport(ShimConfig::default(), transport.clone())
        .expect("client over mock transport");
    (client, transport)
}

pub fn rows_of(rows: JsonValue) -> Vec<Row> {
    match rows {
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(map) => map,
                other => panic!("row must be an object, got {other}"),
            })
            .collect(),
        other => panic!("rows must be an array, got {other}"),
    }
}
