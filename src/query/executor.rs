use crate::envelope::{QueryData, Row};
use crate::error::ShimError;
use crate::query::compiler::{CommandKind, CompiledStatement, MAX_BIND_PARAMS};
use crate::query::error::QueryError;
use crate::transport::{QueryRequest, Transport};
use crate::value::Value;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub row_count: u64,
    pub command: Option<String>,
}

pub trait QueryTelemetryHook: Send + Sync {
    fn on_query(&self, event: &QueryTelemetryEvent);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTelemetryEvent {
    /// `None` for ad-hoc statements.
    pub table: Option<String>,
    pub command: String,
    pub param_count: usize,
    pub row_count: u64,
    pub latency_micros: u64,
    pub ok: bool,
    pub error_code: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sends statements through one injected transport, one call per statement.
pub struct Executor {
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
    telemetry_hooks: Mutex<Vec<Arc<dyn QueryTelemetryHook>>>,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
            telemetry_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn add_telemetry_hook(&self, hook: Arc<dyn QueryTelemetryHook>) {
        self.telemetry_hooks.lock().push(hook);
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Ad-hoc entry point: arbitrary SQL with positional parameters. Bound by
    /// the same parameter ceiling as compiled chains.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryOutcome, ShimError> {
        if params.len() > MAX_BIND_PARAMS {
            return Err(QueryError::InvalidQuery {
                reason: format!(
                    "statement binds {} parameters, maximum is {MAX_BIND_PARAMS}",
                    params.len()
                ),
            }
            .into());
        }
        let command = sql
            .split_whitespace()
            .next()
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();
        self.dispatch(None, command, sql, params).await
    }

    /// Chain entry point.
    pub async fn run(
        &self,
        table: &str,
        statement: &CompiledStatement,
    ) -> Result<QueryOutcome, ShimError> {
        self.dispatch(
            Some(table),
            statement.command().as_str().to_string(),
            statement.sql(),
            statement.params(),
        )
        .await
    }

    pub async fn health(&self) -> HealthReport {
        let result = match tokio::time::timeout(self.request_timeout, self.transport.health()).await
        {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        };
        match result {
            Ok(()) => HealthReport {
                status: HealthStatus::Healthy,
                timestamp: crate::now_rfc3339(),
                error: None,
            },
            Err(err) => {
                warn!(code = err.code_str(), "health check failed");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    timestamp: crate::now_rfc3339(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn dispatch(
        &self,
        table: Option<&str>,
        command: String,
        sql: &str,
        params: &[Value],
    ) -> Result<QueryOutcome, ShimError> {
        let request = QueryRequest {
            sql: sql.to_string(),
            params: params.iter().map(Value::to_json).collect(),
        };
        debug!(
            table = table.unwrap_or("<ad-hoc>"),
            command = %command,
            params = params.len(),
            "dispatching statement"
        );
        let started = Instant::now();
        let result = match tokio::time::timeout(self.request_timeout, self.transport.send(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        };
        let result = result.map(|response| QueryOutcome {
            row_count: response.row_count.unwrap_or(response.rows.len() as u64),
            rows: response.rows,
            command: response.command,
        });
        if let Err(err) = &result {
            warn!(
                table = table.unwrap_or("<ad-hoc>"),
                command = %command,
                code = err.code_str(),
                error = %err,
                "statement failed"
            );
        }
        self.emit_telemetry(QueryTelemetryEvent {
            table: table.map(str::to_string),
            command,
            param_count: params.len(),
            row_count: result.as_ref().map(|o| o.row_count).unwrap_or(0),
            latency_micros: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            ok: result.is_ok(),
            error_code: result.as_ref().err().map(ShimError::code_str),
        });
        result
    }

    fn timeout_error(&self) -> ShimError {
        ShimError::Timeout {
            timeout_ms: u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn emit_telemetry(&self, event: QueryTelemetryEvent) {
        let hooks = self.telemetry_hooks.lock().clone();
        for hook in hooks {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook.on_query(&event)))
                .is_err()
            {
                warn!("query telemetry hook panicked while handling event");
            }
        }
    }
}

/// Applies the return-shape rules of a chain: single-row mode and inserts
/// yield one object (or nothing), everything else the row array.
pub fn shape_rows(command: CommandKind, single_row: bool, rows: Vec<Row>) -> Option<QueryData> {
    if single_row || command == CommandKind::Insert {
        if rows.len() > 1 {
            debug!(
                rows = rows.len(),
                command = command.as_str(),
                "single-row result had extra rows, keeping the first"
            );
        }
        return rows.into_iter().next().map(QueryData::Row);
    }
    Some(QueryData::Rows(rows))
}
