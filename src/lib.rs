pub mod compat;
pub mod config;
pub mod envelope;
pub mod error;
pub mod query;
pub mod rpc;
pub mod sync_bridge;
pub mod table;
pub mod transport;
pub mod value;

use crate::compat::{AuthApi, StorageApi};
use crate::config::ShimConfig;
use crate::envelope::{Envelope, Row};
use crate::error::ShimError;
use crate::query::executor::{Executor, HealthReport, QueryTelemetryHook};
use crate::rpc::RpcRegistry;
use crate::table::TableQuery;
use crate::transport::{HttpTransport, Transport};
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

pub use crate::envelope::{EnvelopeError, QueryData};
pub use crate::query::plan::{Order, OrderOptions, Record};
pub use crate::value::{IntoValue, lit};

/// Managed-backend style entry point: `from(table)`, `auth()`, `storage()`,
/// `rpc(..)`, plus raw `query(..)`.
///
/// Cloning is cheap and clones share one transport and its connection pool.
/// The pool is released when the last clone is dropped.
#[derive(Clone)]
pub struct ShimClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ShimConfig,
    executor: Arc<Executor>,
    registry: RpcRegistry,
    auth: AuthApi,
    storage: StorageApi,
}

impl ShimClient {
    /// Builds a client over the HTTP transport described by `config`.
    pub fn connect(config: ShimConfig) -> Result<Self, ShimError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: ShimConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ShimError> {
        config.validate()?;
        info!(
            endpoint = %config.endpoint,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            pool_max_idle_per_host = config.pool_max_idle_per_host,
            authenticated = config.bearer_token.is_some(),
            "shim client ready"
        );
        let executor = Arc::new(Executor::new(transport, config.request_timeout));
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                executor,
                registry: RpcRegistry,
                auth: AuthApi::default(),
                storage: StorageApi,
            }),
        })
    }

    pub fn config(&self) -> &ShimConfig {
        &self.inner.config
    }

    /// Starts a chain against `table`. Each call gets its own query state.
    pub fn from(&self, table: &str) -> TableQuery {
        TableQuery::new(Arc::clone(&self.inner.executor), table)
    }

    pub fn auth(&self) -> &AuthApi {
        &self.inner.auth
    }

    pub fn storage(&self) -> &StorageApi {
        &self.inner.storage
    }

    pub fn rpc_registry(&self) -> &RpcRegistry {
        &self.inner.registry
    }

    /// Resolves a named procedure. Unknown names give `{ data: null, error: null }`.
    pub async fn rpc(&self, name: &str, params: JsonValue) -> Envelope<Row> {
        self.inner.registry.dispatch(name, &params)
    }

    /// Runs arbitrary SQL with positional `$n` parameters and returns the raw
    /// row array.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Envelope<Vec<Row>> {
        match self.inner.executor.execute(sql, params).await {
            Ok(outcome) => Envelope::ok(outcome.rows),
            Err(err) => Envelope::err(err),
        }
    }

    /// Liveness of the query endpoint. Never fails; failures come back as
    /// an unhealthy report.
    pub async fn health(&self) -> HealthReport {
        self.inner.executor.health().await
    }

    pub fn add_telemetry_hook(&self, hook: Arc<dyn QueryTelemetryHook>) {
        self.inner.executor.add_telemetry_hook(hook);
    }
}

impl std::fmt::Debug for ShimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShimClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Client configured from `SHIMDB_*` environment variables.
pub fn create_client() -> Result<ShimClient, ShimError> {
    ShimClient::connect(ShimConfig::from_env()?)
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
