use crate::ShimClient;
use crate::envelope::{Envelope, QueryData, Row};
use crate::query::executor::HealthReport;
use crate::table::TableQuery;
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::future::Future;
use tokio::runtime::Handle;

pub fn block_on_shim<F, T>(rt: &Handle, f: F) -> T
where
    F: Future<Output = T>,
{
    match Handle::try_current() {
        Ok(_) => tokio::task::block_in_place(|| rt.block_on(f)),
        Err(_) => rt.block_on(f),
    }
}

/// Blocking facade over [`ShimClient`] for callers without an async context.
///
/// Calling from inside a runtime requires the multi-threaded scheduler.
#[derive(Debug, Clone)]
pub struct ShimSync {
    inner: ShimClient,
    rt: Handle,
}

impl ShimSync {
    pub fn new(inner: ShimClient, rt: Handle) -> Self {
        Self { inner, rt }
    }

    pub fn client(&self) -> &ShimClient {
        &self.inner
    }

    pub fn from(&self, table: &str) -> TableQuery {
        self.inner.from(table)
    }

    pub fn run(&self, chain: TableQuery) -> Envelope<QueryData> {
        block_on_shim(&self.rt, chain.execute())
    }

    pub fn rpc(&self, name: &str, params: JsonValue) -> Envelope<Row> {
        block_on_shim(&self.rt, self.inner.rpc(name, params))
    }

    pub fn query(&self, sql: &str, params: &[Value]) -> Envelope<Vec<Row>> {
        block_on_shim(&self.rt, self.inner.query(sql, params))
    }

    pub fn health(&self) -> HealthReport {
        block_on_shim(&self.rt, self.inner.health())
    }
}
